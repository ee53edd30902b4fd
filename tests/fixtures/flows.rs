//! Synthetic Flows
//!
//! シード固定の合成フローログ生成器

use flowguard::record::{Action, FlowLogRecord, Protocol};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::Path;

const DEST_PORTS: [u16; 4] = [80, 443, 53, 8080];

/// 通常トラフィック生成器
pub struct FlowGenerator {
    rng: StdRng,
    /// DENY を出す確率
    deny_rate: f64,
}

impl FlowGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            deny_rate: 0.0,
        }
    }

    pub fn with_deny_rate(mut self, rate: f64) -> Self {
        self.deny_rate = rate;
        self
    }

    /// 内部ネットワークからの通常フロー
    pub fn benign(&mut self) -> FlowLogRecord {
        let hour = self.rng.gen_range(8..=18);
        let minute = self.rng.gen_range(0..60);
        let second = self.rng.gen_range(0..60);
        let action = if self.rng.gen_bool(self.deny_rate) {
            Action::Deny
        } else {
            Action::Allow
        };

        FlowLogRecord {
            timestamp: format!("2024-03-15 {:02}:{:02}:{:02}", hour, minute, second),
            src_ip: format!("10.0.0.{}", self.rng.gen_range(1..=254)),
            dest_ip: format!("93.184.216.{}", self.rng.gen_range(1..=64)),
            src_port: self.rng.gen_range(1024..=65535),
            dest_port: DEST_PORTS[self.rng.gen_range(0..DEST_PORTS.len())],
            protocol: if self.rng.gen_bool(0.3) {
                Protocol::Udp
            } else {
                Protocol::Tcp
            },
            action,
            bytes_transferred: self.rng.gen_range(200..=5000),
        }
    }

    pub fn benign_batch(&mut self, n: usize) -> Vec<FlowLogRecord> {
        (0..n).map(|_| self.benign()).collect()
    }

    /// 転送量だけが極端なフロー
    pub fn extreme_bytes(&mut self, i: u64) -> FlowLogRecord {
        let mut record = self.benign();
        record.action = Action::Allow;
        record.bytes_transferred = 50_001 + i * 5_000;
        record
    }
}

/// 外部からの SSH への拒否された小さなフロー
pub fn denied_ssh_attempt() -> FlowLogRecord {
    FlowLogRecord {
        timestamp: "2024-03-15 03:12:44".to_string(),
        src_ip: "203.0.113.9".to_string(),
        dest_ip: "93.184.216.10".to_string(),
        src_port: 51515,
        dest_port: 22,
        protocol: Protocol::Tcp,
        action: Action::Deny,
        bytes_transferred: 60,
    }
}

pub fn to_line(record: &FlowLogRecord) -> String {
    serde_json::to_string(record).unwrap()
}

/// JSONL として書き出す
pub fn write_jsonl(path: &Path, records: &[FlowLogRecord]) {
    let mut file = std::fs::File::create(path).unwrap();
    for record in records {
        writeln!(file, "{}", to_line(record)).unwrap();
    }
}

/// 既存ファイルに追記
pub fn append_raw(path: &Path, data: &str) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
}
