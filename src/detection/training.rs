//! Model Fitting
//!
//! コーパスのエンコード → 標準化 → Isolation Forest 学習 → バンドル化。

use super::bundle::ModelBundle;
use super::features::{encode, FEATURE_DIM};
use super::models::{IsolationForest, IsolationForestParams, StandardScaler};
use crate::error::{Error, Result};
use crate::record::FlowLogRecord;
use ndarray::Array2;
use tracing::info;

/// コーパスを特徴量行列に変換（非有限値は 0 で埋める）
pub fn feature_matrix(corpus: &[FlowLogRecord]) -> Array2<f64> {
    let mut matrix = Array2::<f64>::zeros((corpus.len(), FEATURE_DIM));
    for (mut row, record) in matrix.rows_mut().into_iter().zip(corpus) {
        for (cell, value) in row.iter_mut().zip(encode(record)) {
            *cell = if value.is_finite() { value } else { 0.0 };
        }
    }
    matrix
}

/// コーパスからモデルバンドルを学習
pub fn fit(corpus: &[FlowLogRecord], params: &IsolationForestParams) -> Result<ModelBundle> {
    if corpus.is_empty() {
        return Err(Error::EmptyCorpus(
            "no training records available; generate or bootstrap flow logs first".to_string(),
        ));
    }
    params.validate()?;

    info!(
        "Training on {} records (contamination={}, seed={})",
        corpus.len(),
        params.contamination,
        params.seed
    );

    let features = feature_matrix(corpus);
    let scaler = StandardScaler::fit(features.view())?;
    let scaled = scaler.transform(features.view());
    let model = IsolationForest::fit(scaled.view(), params)?;

    Ok(ModelBundle::new(scaler, model, corpus.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Action, Protocol};

    fn record(i: u64) -> FlowLogRecord {
        FlowLogRecord {
            timestamp: format!("2024-01-01 {:02}:00:00", i % 24),
            src_ip: format!("10.0.{}.{}", i % 7, i % 200),
            dest_ip: "93.184.216.34".to_string(),
            src_port: 1024 + (i * 37 % 60000) as u16,
            dest_port: [80, 443, 53][(i % 3) as usize],
            protocol: if i % 2 == 0 { Protocol::Tcp } else { Protocol::Udp },
            action: Action::Allow,
            bytes_transferred: 40 + (i * 97) % 3000,
        }
    }

    #[test]
    fn test_fit_rejects_empty_corpus() {
        let result = fit(&[], &IsolationForestParams::default());
        assert!(matches!(result, Err(Error::EmptyCorpus(_))));
    }

    #[test]
    fn test_feature_matrix_shape() {
        let corpus: Vec<_> = (0..10).map(record).collect();
        let matrix = feature_matrix(&corpus);
        assert_eq!(matrix.dim(), (10, FEATURE_DIM));
        assert_eq!(matrix[[3, 3]], 3.0);
    }

    #[test]
    fn test_fit_produces_bundle() {
        let corpus: Vec<_> = (0..300).map(record).collect();
        let params = IsolationForestParams {
            n_estimators: 20,
            ..Default::default()
        };
        let bundle = fit(&corpus, &params).unwrap();
        assert_eq!(bundle.training_samples, 300);
        assert_eq!(bundle.model.n_trees(), 20);
        assert_eq!(bundle.model.subsample_size, 256);
        assert_eq!(bundle.contamination(), 0.02);
    }
}
