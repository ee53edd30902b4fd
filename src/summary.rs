//! Anomaly Summary
//!
//! CSV 出力から異常の集計を作る（ダッシュボード表示用）。

use crate::error::Result;
use crate::record::TIMESTAMP_FORMAT;
use crate::sink::AnomalyRow;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// 宛先ポートごとの件数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCount {
    pub port: u16,
    pub count: u64,
}

/// 異常の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnomalySummary {
    pub total: u64,
    /// `(now - window, now]` に含まれる件数
    pub recent: u64,
    pub distinct_src_ips: u64,
    /// 件数の降順、同数ならポート番号の昇順
    pub by_dest_port: Vec<PortCount>,
}

impl AnomalySummary {
    /// CSV ファイルを集計。ファイルが無い場合は空の集計
    pub fn from_csv(path: impl AsRef<Path>, window: Duration, now: NaiveDateTime) -> Result<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No anomaly CSV at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(file);
        let rows = reader
            .deserialize::<AnomalyRow>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::from_rows(&rows, window, now))
    }

    /// 読み込み済みの行を集計
    pub fn from_rows(rows: &[AnomalyRow], window: Duration, now: NaiveDateTime) -> Self {
        let since = now - window;
        let mut src_ips = HashSet::new();
        let mut ports: HashMap<u16, u64> = HashMap::new();
        let mut recent = 0;

        for row in rows {
            src_ips.insert(row.src_ip.as_str());
            *ports.entry(row.dest_port).or_default() += 1;

            let in_window = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT)
                .map(|ts| ts > since && ts <= now)
                .unwrap_or(false);
            if in_window {
                recent += 1;
            }
        }

        let mut by_dest_port: Vec<PortCount> = ports
            .into_iter()
            .map(|(port, count)| PortCount { port, count })
            .collect();
        by_dest_port.sort_by(|a, b| b.count.cmp(&a.count).then(a.port.cmp(&b.port)));

        Self {
            total: rows.len() as u64,
            recent,
            distinct_src_ips: src_ips.len() as u64,
            by_dest_port,
        }
    }

    /// 上位 `n` 件のポート
    pub fn top_ports(&self, n: usize) -> &[PortCount] {
        &self.by_dest_port[..n.min(self.by_dest_port.len())]
    }
}
