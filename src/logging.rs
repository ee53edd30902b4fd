pub use crate::config::LogRotation;
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// ログファイル名（ローテーション時は日付が付与される）
pub const LOG_FILE_NAME: &str = "flowguard.log";

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル (trace, debug, info, warn, error) または EnvFilter 書式
    pub level: String,
    /// ファイル出力先（`None` ならファイル出力なし）
    pub log_dir: Option<PathBuf>,
    /// ファイルローテーション設定
    pub rotation: LogRotation,
    /// コンソール出力有効
    pub console_enabled: bool,
    /// コンソールを JSON で出力
    pub json: bool,
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            log_dir: config.log_dir.clone(),
            rotation: config.rotation,
            console_enabled: config.console,
            json: config.json,
        }
    }
}

impl LogConfig {
    /// 有効な EnvFilter。`RUST_LOG` が設定されていればそちらを優先
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// ログディレクトリを確保
fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    Ok(())
}

/// ログシステムを初期化
///
/// ファイル出力を有効にした場合、返されたガードはプロセス終了まで保持すること
/// （破棄するとバッファ済みのログが書き出されなくなる）。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let console_layer = if config.console_enabled {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
        Some(if config.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        })
    } else {
        None
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            ensure_log_dir(dir)?;
            let file_appender = match config.rotation {
                LogRotation::Daily => rolling::daily(dir, LOG_FILE_NAME),
                LogRotation::Hourly => rolling::hourly(dir, LOG_FILE_NAME),
                LogRotation::Never => rolling::never(dir, LOG_FILE_NAME),
            };
            let (writer, guard) = non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("📝 ログシステム初期化完了");
    tracing::info!("📊 ログレベル: {}", config.level);
    match &config.log_dir {
        Some(dir) => tracing::info!("📂 ログディレクトリ: {}", dir.display()),
        None => tracing::debug!("ファイル出力なし"),
    }

    Ok(guard)
}
