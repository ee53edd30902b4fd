//! Stream Processor
//!
//! 行ストリームを1行ずつ評価し、異常レコードをシンクへ書き込む。
//! 1行の処理（シンクへの同期書き込みを含む）が完了してから次の行を待つため、
//! 異常はログの到着順にシンクへ届く。

use crate::detection::{Outcome, Scorer};
use crate::error::Result;
use crate::ingest::LineStream;
use crate::sink::AnomalySink;
use futures::StreamExt;
use serde::Serialize;
use tracing::{error, info};

/// 処理統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub lines_seen: u64,
    pub malformed: u64,
    pub normal: u64,
    pub anomalies: u64,
}

/// スコアラーとシンクを結ぶ処理ループ
pub struct StreamProcessor {
    scorer: Scorer,
    sink: AnomalySink,
    stats: PipelineStats,
}

impl StreamProcessor {
    pub fn new(scorer: Scorer, sink: AnomalySink) -> Self {
        Self {
            scorer,
            sink,
            stats: PipelineStats::default(),
        }
    }

    /// これまでの統計
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// ストリームが終わるまで処理する
    ///
    /// 読み込みエラーまたはシンクへの書き込み失敗で停止し、そのエラーを返す。
    pub async fn run(&mut self, mut lines: LineStream) -> Result<PipelineStats> {
        info!("🚀 Stream processor started");

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Line source failed: {}", e);
                    self.log_stats();
                    return Err(e);
                }
            };

            if let Err(e) = self.handle_line(&line) {
                error!("Halting stream processor: {}", e);
                self.log_stats();
                return Err(e);
            }
        }

        self.log_stats();
        Ok(self.stats)
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        self.stats.lines_seen += 1;
        match self.scorer.evaluate(line) {
            Outcome::Malformed => self.stats.malformed += 1,
            Outcome::Normal(_) => self.stats.normal += 1,
            Outcome::Anomaly(anomaly) => {
                self.sink.append(&anomaly)?;
                self.stats.anomalies += 1;
            }
        }
        Ok(())
    }

    fn log_stats(&self) {
        info!(
            "📊 Processed {} lines: {} normal, {} anomalies, {} malformed",
            self.stats.lines_seen, self.stats.normal, self.stats.anomalies, self.stats.malformed
        );
    }
}
