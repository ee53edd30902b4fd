//! Streaming Scorer
//!
//! 1行ずつフローログを評価し、異常と判定されたものだけを返す。

use super::bundle::ModelBundle;
use super::features::encode;
use crate::record::{AnomalyRecord, Classification, FlowLogRecord};
use std::sync::Arc;
use tracing::{debug, warn};

/// 1行分の評価結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 空行・JSON 不正・フィールド欠落など
    Malformed,
    Normal(AnomalyRecord),
    Anomaly(AnomalyRecord),
}

/// 学習済みバンドルを保持するスコアラー
///
/// バンドルは構築時に注入され、プロセスの生存期間中は不変。
#[derive(Debug, Clone)]
pub struct Scorer {
    bundle: Arc<ModelBundle>,
}

impl Scorer {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &Arc<ModelBundle> {
        &self.bundle
    }

    /// 解析済みレコードを評価（正常判定も返す）
    pub fn score(&self, record: FlowLogRecord) -> AnomalyRecord {
        let prediction = self.bundle.predict(&encode(&record));
        let classification = if prediction.is_outlier {
            Classification::Anomaly
        } else {
            Classification::Normal
        };
        AnomalyRecord::new(record, prediction.score, classification)
    }

    /// ログ1行を評価し、判定結果を返す
    pub fn evaluate(&self, line: &str) -> Outcome {
        if line.trim().is_empty() {
            return Outcome::Malformed;
        }

        let record = match FlowLogRecord::from_json_line(line) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping malformed flow record: {}", e);
                return Outcome::Malformed;
            }
        };

        let scored = self.score(record);
        if scored.classification.is_anomaly() {
            warn!(
                "🚨 Anomaly: {}:{} -> {}:{} {} {} bytes={} score={:.4}",
                scored.record.src_ip,
                scored.record.src_port,
                scored.record.dest_ip,
                scored.record.dest_port,
                scored.record.protocol,
                scored.record.action,
                scored.record.bytes_transferred,
                scored.score
            );
            Outcome::Anomaly(scored)
        } else {
            debug!("Normal flow (score={:.4})", scored.score);
            Outcome::Normal(scored)
        }
    }

    /// ログ1行を処理。解析できない行と正常判定は `None`
    pub fn process(&self, line: &str) -> Option<AnomalyRecord> {
        match self.evaluate(line) {
            Outcome::Anomaly(anomaly) => Some(anomaly),
            Outcome::Normal(_) | Outcome::Malformed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::models::IsolationForestParams;
    use crate::detection::training::fit;
    use crate::record::{Action, Protocol};

    fn benign(i: u64) -> FlowLogRecord {
        FlowLogRecord {
            timestamp: "2024-01-01 12:00:00".to_string(),
            src_ip: format!("10.0.0.{}", i % 250 + 1),
            dest_ip: format!("93.184.{}.{}", i % 3, i % 200 + 1),
            src_port: 1024 + ((i * 7919) % 60000) as u16,
            dest_port: [80, 443, 8080][(i % 3) as usize],
            protocol: if i % 2 == 0 { Protocol::Tcp } else { Protocol::Udp },
            action: Action::Allow,
            bytes_transferred: 500 + (i * 131) % 2500,
        }
    }

    fn scorer() -> Scorer {
        // 通常トラフィック + 少数の大容量転送
        let mut corpus: Vec<_> = (0..400).map(benign).collect();
        corpus.extend((0..8).map(|k| {
            let mut spike = benign(k * 17);
            spike.bytes_transferred = 50_000 + k * 10_000;
            spike
        }));
        let params = IsolationForestParams {
            n_estimators: 100,
            contamination: 0.1,
            ..Default::default()
        };
        Scorer::new(Arc::new(fit(&corpus, &params).unwrap()))
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let scorer = scorer();
        assert!(scorer.process("").is_none());
        assert!(scorer.process("not json").is_none());
        assert!(scorer.process(r#"{"timestamp":"2024-01-01 12:00:00"}"#).is_none());
    }

    #[test]
    fn test_evaluate_distinguishes_outcomes() {
        let scorer = scorer();
        assert_eq!(scorer.evaluate("{broken"), Outcome::Malformed);

        // 学習データの大半は正常と判定される
        let normal = (0..400)
            .map(|i| scorer.evaluate(&serde_json::to_string(&benign(i)).unwrap()))
            .filter_map(|outcome| match outcome {
                Outcome::Normal(scored) => Some(scored),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(normal.len() > 300);
        assert!(normal.iter().all(|scored| scored.pred == 1));
    }

    #[test]
    fn test_extreme_flow_is_flagged() {
        let scorer = scorer();
        let mut record = benign(1);
        record.bytes_transferred = 5_000_000;
        let line = serde_json::to_string(&record).unwrap();

        let anomaly = scorer.process(&line).expect("extreme byte count should be flagged");
        assert_eq!(anomaly.classification, Classification::Anomaly);
        assert_eq!(anomaly.pred, -1);
        assert_eq!(anomaly.record, record);
    }

    #[test]
    fn test_score_is_lower_for_anomalies() {
        let scorer = scorer();
        let normal = scorer.score(benign(10));
        let mut extreme = benign(10);
        extreme.bytes_transferred = 5_000_000;
        let extreme = scorer.score(extreme);
        assert!(extreme.score < normal.score);
    }

    #[test]
    fn test_independent_scorers_hold_their_own_bundle() {
        let a = scorer();
        let b = Scorer::new(Arc::new((**a.bundle()).clone()));
        assert!(!Arc::ptr_eq(a.bundle(), b.bundle()));
        let record = benign(3);
        assert_eq!(a.score(record.clone()), b.score(record));
    }
}
