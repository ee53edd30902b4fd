//! Log Tailer
//!
//! 追記専用のログファイルを末尾から追跡し、改行で終端された完全な行だけを
//! 到着順に返す。
//!
//! - 開始位置はオープン時点のファイル末尾（既存の行は再生しない）
//! - 書き込み途中の行（改行なし）は返さず、同じオフセットから読み直す
//! - EOF では `poll_interval` だけ待機する（唯一の待機ポイント）
//! - キャンセルは待機ごとに確認し、停止後は `Ok(None)` を返す
//!
//! ファイルの切り詰め・ローテーション・削除には対応しない。

use crate::error::Result;
use futures::stream::{self, Stream};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 行ストリーム（テストでは有限のストリームに差し替え可能）
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// 追跡オプション
#[derive(Debug, Clone)]
pub struct TailOptions {
    /// EOF 到達時の待機間隔
    pub poll_interval: Duration,
    /// 協調的な停止シグナル
    pub cancel: CancellationToken,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            cancel: CancellationToken::new(),
        }
    }
}

/// ファイル追跡器
pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    /// 最後に返した完全な行の直後のオフセット
    offset: u64,
    buf: Vec<u8>,
    options: TailOptions,
}

impl LogTailer {
    /// ファイルを開き、現在の末尾から追跡を開始
    pub async fn open(path: impl AsRef<Path>, options: TailOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;
        let offset = file.seek(SeekFrom::End(0)).await?;

        info!(
            "👀 Tailing {} from offset {} (poll every {:?})",
            path.display(),
            offset,
            options.poll_interval
        );

        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset,
            buf: Vec::new(),
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 次に読み込むオフセット
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 次の完全な行を待つ。キャンセルされた場合は `None`
    ///
    /// 各試行は確定済みオフセットからの読み直しで始まるため、
    /// 途中で future を破棄しても行が欠けたり重複したりしない。
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if self.options.cancel.is_cancelled() {
                return Ok(None);
            }

            if let Some(line) = self.try_read_line().await? {
                return Ok(Some(line));
            }

            tokio::select! {
                _ = self.options.cancel.cancelled() => {
                    debug!("Tailer cancelled at offset {}", self.offset);
                    return Ok(None);
                }
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    /// 確定済みオフセットから1行の読み込みを試みる
    async fn try_read_line(&mut self) -> Result<Option<String>> {
        self.reader.seek(SeekFrom::Start(self.offset)).await?;
        self.buf.clear();

        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 || self.buf.last() != Some(&b'\n') {
            if n > 0 {
                debug!("Partial line of {} bytes at offset {}, waiting", n, self.offset);
            }
            return Ok(None);
        }

        let line_offset = self.offset;
        self.offset += n as u64;

        let mut line = match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(line) => line,
            Err(e) => {
                // 不正な UTF-8 は置換せず、空行として渡す（評価側で不正行として数える）
                debug!(
                    "Invalid UTF-8 in line at offset {}: {}",
                    line_offset,
                    e.utf8_error()
                );
                return Ok(Some(String::new()));
            }
        };
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// 非同期ストリームに変換
    pub fn into_stream(self) -> LineStream {
        Box::pin(stream::unfold(self, |mut tailer| async move {
            match tailer.next_line().await {
                Ok(Some(line)) => Some((Ok(line), tailer)),
                Ok(None) => None,
                Err(e) => Some((Err(e), tailer)),
            }
        }))
    }
}

/// 事前に用意した行からストリームを作る（テスト・再処理用）
pub fn lines_stream<I>(lines: I) -> LineStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(lines.into_iter().map(Ok)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn fast_options() -> TailOptions {
        TailOptions {
            poll_interval: Duration::from_millis(10),
            cancel: CancellationToken::new(),
        }
    }

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[tokio::test]
    async fn test_starts_at_end_of_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.jsonl");
        std::fs::write(&path, "old-1\nold-2\n").unwrap();

        let mut tailer = LogTailer::open(&path, fast_options()).await.unwrap();
        assert_eq!(tailer.offset(), 12);

        append(&path, "new-1\n");
        let line = timeout(Duration::from_secs(2), tailer.next_line()).await.unwrap().unwrap();
        assert_eq!(line.as_deref(), Some("new-1"));
    }

    #[tokio::test]
    async fn test_partial_line_is_withheld_until_completed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.jsonl");
        std::fs::write(&path, "").unwrap();
        let mut tailer = LogTailer::open(&path, fast_options()).await.unwrap();

        append(&path, "first\nsec");
        let first = timeout(Duration::from_secs(2), tailer.next_line()).await.unwrap().unwrap();
        assert_eq!(first.as_deref(), Some("first"));

        // 改行がないため返らない
        let pending = timeout(Duration::from_millis(100), tailer.next_line()).await;
        assert!(pending.is_err());

        append(&path, "ond\r\n");
        let second = timeout(Duration::from_secs(2), tailer.next_line()).await.unwrap().unwrap();
        assert_eq!(second.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_not_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.jsonl");
        std::fs::write(&path, "").unwrap();
        let mut tailer = LogTailer::open(&path, fast_options()).await.unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"src_ip\":\"10.0.0.\xff\"}\nnext\n").unwrap();
        file.flush().unwrap();

        // 置換文字を含む行は作られず、空行になる
        let bad = timeout(Duration::from_secs(2), tailer.next_line()).await.unwrap().unwrap();
        assert_eq!(bad.as_deref(), Some(""));

        let next = timeout(Duration::from_secs(2), tailer.next_line()).await.unwrap().unwrap();
        assert_eq!(next.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_cancellation_ends_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.jsonl");
        std::fs::write(&path, "").unwrap();

        let options = fast_options();
        let cancel = options.cancel.clone();
        let mut stream = LogTailer::open(&path, options).await.unwrap().into_stream();

        append(&path, "a\nb\n");
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap().unwrap(), "b");

        cancel.cancel();
        let end = timeout(Duration::from_secs(2), stream.next()).await.unwrap();
        assert!(end.is_none());
    }

    #[test]
    fn test_lines_stream_is_finite() {
        let stream = lines_stream(vec!["x".to_string(), "y".to_string()]);
        let lines = tokio_test::block_on(stream_collect(stream));
        assert_eq!(lines, vec!["x", "y"]);
    }

    async fn stream_collect(stream: LineStream) -> Vec<String> {
        stream.map(|r| r.unwrap()).collect().await
    }
}
