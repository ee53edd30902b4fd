//! Anomaly Sink
//!
//! 異常レコードを JSONL（完全な構造）と CSV（集計用の固定列）の2形式で
//! 追記保存する。2形式への書き込みは1つの操作として扱い、どちらかが
//! 失敗した場合は両ファイルを書き込み前の長さに戻してエラーを返す。
//!
//! 書き込み順は JSONL → CSV。ダッシュボードが並行して読む CSV は最後に
//! 書くため、ロールバックで CSV から消えるのは書きかけの行だけになる。
//! JSONL 側は同期済みの行が切り詰められることがあり、その間に読んだ
//! リーダーは後で消える行を一度だけ観測しうる。

use crate::error::{Error, Result};
use crate::record::{Action, AnomalyRecord, Protocol};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// CSV の列（順序固定）
pub const CSV_HEADER: [&str; 10] = [
    "timestamp",
    "src_ip",
    "dest_ip",
    "src_port",
    "dest_port",
    "protocol",
    "action",
    "bytes_transferred",
    "score",
    "pred",
];

/// CSV 1行分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRow {
    pub timestamp: String,
    pub src_ip: String,
    pub dest_ip: String,
    pub src_port: u16,
    pub dest_port: u16,
    pub protocol: Protocol,
    pub action: Action,
    pub bytes_transferred: u64,
    pub score: f64,
    pub pred: i8,
}

impl From<&AnomalyRecord> for AnomalyRow {
    fn from(anomaly: &AnomalyRecord) -> Self {
        let r = &anomaly.record;
        Self {
            timestamp: r.timestamp.clone(),
            src_ip: r.src_ip.clone(),
            dest_ip: r.dest_ip.clone(),
            src_port: r.src_port,
            dest_port: r.dest_port,
            protocol: r.protocol,
            action: r.action,
            bytes_transferred: r.bytes_transferred,
            score: anomaly.score,
            pred: anomaly.pred,
        }
    }
}

/// 追記専用の異常レコード出力先
pub struct AnomalySink {
    jsonl_path: PathBuf,
    csv_path: PathBuf,
    jsonl: File,
    csv: File,
    appended: u64,
}

impl AnomalySink {
    /// 出力ファイルを開く（CSV ヘッダーは新規作成時のみ書き込む）
    pub fn open(jsonl_path: impl AsRef<Path>, csv_path: impl AsRef<Path>) -> Result<Self> {
        let jsonl_path = jsonl_path.as_ref().to_path_buf();
        let csv_path = csv_path.as_ref().to_path_buf();

        for path in [&jsonl_path, &csv_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let jsonl = open_append(&jsonl_path)?;
        let mut csv = open_append(&csv_path)?;

        if csv.metadata()?.len() == 0 {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(CSV_HEADER)?;
            csv.write_all(&into_bytes(writer)?)?;
            csv.sync_data()?;
            debug!("Wrote CSV header to {}", csv_path.display());
        }

        info!(
            "📝 Anomaly sink ready: {} / {}",
            jsonl_path.display(),
            csv_path.display()
        );

        Ok(Self {
            jsonl_path,
            csv_path,
            jsonl,
            csv,
            appended: 0,
        })
    }

    /// 1件追記。両ファイルのフラッシュ完了後にのみ `Ok` を返す
    pub fn append(&mut self, record: &AnomalyRecord) -> Result<()> {
        // 書き込み前に両形式をシリアライズしておく
        let mut json_line = serde_json::to_vec(record)?;
        json_line.push(b'\n');

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.serialize(AnomalyRow::from(record))?;
        let csv_row = into_bytes(writer)?;

        let jsonl_len = self.jsonl.metadata()?.len();
        let csv_len = self.csv.metadata()?.len();

        // CSV は最後
        let result = write_durably(&mut self.jsonl, &json_line)
            .and_then(|_| write_durably(&mut self.csv, &csv_row));

        if let Err(e) = result {
            self.rollback(jsonl_len, csv_len);
            error!("Failed to persist anomaly: {}", e);
            return Err(Error::Sink(format!(
                "failed to append anomaly to {} / {}: {}",
                self.jsonl_path.display(),
                self.csv_path.display(),
                e
            )));
        }

        self.appended += 1;
        Ok(())
    }

    /// このインスタンスで追記した件数
    pub fn appended(&self) -> u64 {
        self.appended
    }

    fn rollback(&mut self, jsonl_len: u64, csv_len: u64) {
        if let Err(e) = self.jsonl.set_len(jsonl_len) {
            error!("Rollback of {} failed: {}", self.jsonl_path.display(), e);
        }
        if let Err(e) = self.csv.set_len(csv_len) {
            error!("Rollback of {} failed: {}", self.csv_path.display(), e);
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn write_durably(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.sync_data()
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| Error::Sink(format!("CSV writer error: {}", e)))
}
