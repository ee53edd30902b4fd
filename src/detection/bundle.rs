//! Model Bundle
//!
//! スケーラーと Isolation Forest を1つの成果物として保存・読み込みする。
//! 保存は一時ファイルへの書き込み + rename で行い、読み手が
//! 片方だけのバンドルを観測することはない。

use super::features::{FeatureVector, FEATURE_DIM, FEATURE_NAMES};
use super::models::{IsolationForest, StandardScaler};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// バンドル形式のバージョン。特徴量の次元・順序を変えたら上げること
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// 学習済みモデル一式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    /// 形式バージョン
    pub format_version: u32,
    /// 学習時の特徴量名（順序込みで検証する）
    pub feature_names: Vec<String>,
    /// 学習サンプル数
    pub training_samples: usize,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 標準化変換
    pub scaler: StandardScaler,
    /// 外れ値モデル
    pub model: IsolationForest,
}

/// 1件分の推論結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// 低いほど異常
    pub score: f64,
    pub is_outlier: bool,
}

impl ModelBundle {
    pub fn new(scaler: StandardScaler, model: IsolationForest, training_samples: usize) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            training_samples,
            created_at: Utc::now(),
            scaler,
            model,
        }
    }

    /// 未スケールの特徴量ベクトルを評価
    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let scaled = self.scaler.transform_row(features);
        let score = self.model.score_sample(&scaled);
        Prediction {
            score,
            is_outlier: score - self.model.offset < 0.0,
        }
    }

    pub fn contamination(&self) -> f64 {
        self.model.params.contamination
    }

    /// アトミックに保存（親ディレクトリは必要なら作成）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_path_for(path);
        let content = serde_json::to_vec(self)?;

        let write_result = (|| -> Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)?;
            Ok(())
        })();

        if write_result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        write_result?;

        info!(
            "💾 Model bundle saved: {} (samples={}, trees={})",
            path.display(),
            self.training_samples,
            self.model.n_trees()
        );
        Ok(())
    }

    /// バンドルを読み込み、特徴量レイアウトとモデル構造を検証
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let bundle: ModelBundle = serde_json::from_slice(&content).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        bundle.validate()?;

        info!(
            "📦 Model bundle loaded: {} (version={}, samples={}, contamination={})",
            path.display(),
            bundle.format_version,
            bundle.training_samples,
            bundle.contamination()
        );
        Ok(bundle)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(Error::IncompatibleBundle(format!(
                "format version {} (expected {})",
                self.format_version, BUNDLE_FORMAT_VERSION
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(Error::IncompatibleBundle(format!(
                "feature layout {:?} does not match {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.scaler.n_features() != FEATURE_DIM || self.scaler.scale.len() != FEATURE_DIM {
            return Err(Error::IncompatibleBundle(format!(
                "scaler has {} features (expected {})",
                self.scaler.n_features(),
                FEATURE_DIM
            )));
        }
        self.model.validate_structure(FEATURE_DIM)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}
