//! 設定管理
//!
//! 優先順位: デフォルト値 → TOML ファイル → 環境変数（`FLOWGUARD__TRAINING__CONTAMINATION` 形式）

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{FlowGuardConfig, LogRotation, LoggingConfig, StreamConfig, TrainingConfig};
