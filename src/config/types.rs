use crate::detection::IsolationForestParams;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowGuardConfig {
    /// Offline model fitting
    pub training: TrainingConfig,

    /// Streaming scorer
    pub stream: StreamConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// 学習設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// 学習用 JSONL コーパス
    pub input: PathBuf,

    /// バンドルの保存先
    pub model_path: PathBuf,

    /// 想定される異常の割合 (0, 1)
    pub contamination: f64,

    pub n_estimators: usize,

    pub max_samples: usize,

    pub seed: u64,

    /// 読み込む行数の上限
    pub limit: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let params = IsolationForestParams::default();
        Self {
            input: PathBuf::from("data/logs.jsonl"),
            model_path: PathBuf::from("models/isolation_forest.json"),
            contamination: params.contamination,
            n_estimators: params.n_estimators,
            max_samples: params.max_samples,
            seed: params.seed,
            limit: None,
        }
    }
}

impl TrainingConfig {
    pub fn params(&self) -> IsolationForestParams {
        IsolationForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            contamination: self.contamination,
            seed: self.seed,
        }
    }
}

/// ストリーミング設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 追跡するログファイル
    pub log_file: PathBuf,

    pub model_path: PathBuf,

    pub anomalies_jsonl: PathBuf,

    pub anomalies_csv: PathBuf,

    /// EOF での待機間隔（ミリ秒）
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("data/logs.jsonl"),
            model_path: PathBuf::from("models/isolation_forest.json"),
            anomalies_jsonl: PathBuf::from("data/anomalies.jsonl"),
            anomalies_csv: PathBuf::from("data/anomalies.csv"),
            poll_interval_ms: 200,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,

    /// Directory for rolling log files (disabled when unset)
    pub log_dir: Option<PathBuf>,

    /// File rotation: `daily`, `hourly` or `never`
    pub rotation: LogRotation,

    /// Console output
    pub console: bool,

    /// JSON formatted console output
    pub json: bool,
}

/// ログファイルのローテーション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// 日次ローテーション
    #[default]
    Daily,
    /// 時間毎ローテーション
    Hourly,
    /// ローテーションなし
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            rotation: LogRotation::default(),
            console: true,
            json: false,
        }
    }
}

impl FlowGuardConfig {
    /// 値の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        self.training
            .params()
            .validate()
            .map_err(|e| Error::Config(format!("training: {}", e)))?;

        if self.stream.poll_interval_ms == 0 {
            return Err(Error::Config(
                "stream.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level must not be empty".to_string()));
        }

        Ok(())
    }

    /// サンプル設定ファイル（TOML）を生成
    pub fn sample_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .map_err(|e| Error::Config(format!("failed to render sample config: {}", e)))
    }
}
