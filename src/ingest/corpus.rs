//! Corpus Loader
//!
//! 学習用の JSONL フローログを読み込む。不正な行はスキップする。

use crate::error::{Error, Result};
use crate::record::FlowLogRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use tracing::{debug, info};

/// 読み込み結果
#[derive(Debug, Clone, Default)]
pub struct CorpusLoad {
    pub records: Vec<FlowLogRecord>,
    /// 解析できずにスキップした行数
    pub skipped: usize,
}

/// ファイルからコーパスを読み込む
///
/// `limit` は読み込む行数の上限（不正な行も数える）。`None` なら全行。
pub fn load_corpus(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Vec<FlowLogRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            Error::EmptyCorpus(format!("corpus file not found: {}", path.display()))
        }
        _ => Error::Io(e),
    })?;

    let load = read_corpus(BufReader::new(file), limit)?;
    info!(
        "📂 Loaded {} records from {} ({} malformed lines skipped)",
        load.records.len(),
        path.display(),
        load.skipped
    );
    Ok(load.records)
}

/// 任意のリーダーからコーパスを読み込む
pub fn read_corpus<R: BufRead>(mut reader: R, limit: Option<usize>) -> Result<CorpusLoad> {
    let mut load = CorpusLoad::default();
    let mut buf = Vec::new();
    let mut lines_read = 0usize;

    loop {
        if limit.is_some_and(|max| lines_read >= max) {
            break;
        }

        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        lines_read += 1;

        let parsed = std::str::from_utf8(&buf)
            .ok()
            .filter(|line| !line.trim().is_empty())
            .and_then(|line| FlowLogRecord::from_json_line(line).ok());

        match parsed {
            Some(record) => load.records.push(record),
            None => {
                load.skipped += 1;
                debug!("Skipping malformed corpus line {}", lines_read);
            }
        }
    }

    Ok(load)
}
