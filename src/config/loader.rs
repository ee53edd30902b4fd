use super::types::FlowGuardConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_file: None,
            load_env: false,
        }
    }

    /// Load configuration from file
    pub fn load_from_file(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.config_file = path.map(Into::into);
        self
    }

    /// Load configuration from `FLOWGUARD__*` environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Build the final configuration
    ///
    /// 値の検証は行わない。CLI による上書きを反映した後に
    /// `FlowGuardConfig::validate` を呼ぶこと。
    pub fn build(self) -> Result<FlowGuardConfig> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&FlowGuardConfig::default())?);

        if let Some(config_path) = &self.config_file {
            // 明示されたファイルは必須
            builder = builder.add_source(File::from(config_path.as_path()).required(true));
        } else {
            builder = builder
                .add_source(File::with_name("flowguard").required(false))
                .add_source(File::with_name("config/flowguard").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix("FLOWGUARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: FlowGuardConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
