//! # flowguard
//!
//! Streaming anomaly detection for network flow logs.
//!
//! An Isolation Forest is fitted offline on a corpus of JSONL flow records and
//! persisted as a versioned bundle together with its feature scaler. A streaming
//! scorer tails a continuously growing log, applies the same feature encoding
//! and writes every flow classified as anomalous to an append-only JSONL + CSV
//! sink.

pub mod config;
pub mod detection;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod summary;

pub use error::{Error, Result};
pub use pipeline::{PipelineStats, StreamProcessor};
pub use record::{AnomalyRecord, Classification, FlowLogRecord};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::EmptyCorpus("no records".to_string());
        assert!(err.to_string().contains("no records"));
    }
}
