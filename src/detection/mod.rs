//! Flow Anomaly Detection
//!
//! Isolation Forest を用いたフローログの異常検知。
//!
//! ## 主要機能
//!
//! - **特徴量エンコード**: フローレコードを固定長8次元のベクトルに変換
//! - **モデル学習**: 標準化 + Isolation Forest をコーパスから学習
//! - **バンドル管理**: スケーラーとモデルを1つの成果物としてアトミックに保存
//! - **ストリーミング評価**: ログ1行ごとの異常判定
//!
//! ## 使用例
//!
//! ```rust,no_run
//! use flowguard::detection::{fit, IsolationForestParams, ModelBundle, Scorer};
//! use flowguard::ingest::load_corpus;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // 学習
//! let corpus = load_corpus("data/logs.jsonl", None)?;
//! let bundle = fit(&corpus, &IsolationForestParams::default())?;
//! bundle.save("models/isolation_forest.json")?;
//!
//! // 異常検知
//! let scorer = Scorer::new(Arc::new(ModelBundle::load("models/isolation_forest.json")?));
//! if let Some(anomaly) = scorer.process(r#"{"timestamp":"2024-01-01 12:00:00","src_ip":"10.0.0.5","dest_ip":"93.184.1.2","src_port":50000,"dest_port":22,"protocol":"TCP","action":"DENY","bytes_transferred":60}"#) {
//!     println!("異常検知: スコア={}", anomaly.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod features;
pub mod models;
pub mod scorer;
pub mod training;

pub use bundle::{ModelBundle, Prediction, BUNDLE_FORMAT_VERSION};
pub use features::{encode, ipv4_to_u32, u32_to_ipv4, FeatureVector, FEATURE_DIM, FEATURE_NAMES};
pub use models::{IsolationForest, IsolationForestParams, StandardScaler};
pub use scorer::{Outcome, Scorer};
pub use training::{feature_matrix, fit};
