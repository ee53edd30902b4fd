//! Error types for the flow anomaly detection pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for flowguard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for training, scoring and persistence
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// 学習コーパスが空
    #[error("Empty training corpus: {0}")]
    EmptyCorpus(String),

    /// Invalid model or pipeline parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// モデルバンドルの読み込み失敗
    #[error("Failed to load model bundle {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Bundle was written with a different feature layout or format version
    #[error("Incompatible model bundle: {0}")]
    IncompatibleBundle(String),

    /// 異常レコードの永続化失敗
    #[error("Anomaly sink error: {0}")]
    Sink(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EmptyCorpus("data/logs.jsonl".to_string());
        assert!(err.to_string().contains("data/logs.jsonl"));

        let err = Error::ModelLoad {
            path: PathBuf::from("models/bundle.json"),
            reason: "not found".to_string(),
        };
        assert!(err.to_string().contains("models/bundle.json"));
        assert!(err.to_string().contains("not found"));
    }
}
