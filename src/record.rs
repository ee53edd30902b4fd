//! Flow Log Records
//!
//! フローログの入力レコードと、異常判定結果のレコード定義。

use serde::{Deserialize, Serialize};
use std::fmt;

/// タイムスタンプの固定フォーマット（UTC, 秒精度）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 通信プロトコル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// ファイアウォールのアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Deny,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => write!(f, "ALLOW"),
            Action::Deny => write!(f, "DENY"),
        }
    }
}

/// 1件のネットワークフローイベント
///
/// 全フィールド必須。ポート範囲外・未知の列挙値・負のバイト数を含む行は
/// デシリアライズの段階で丸ごと拒否される。未知のフィールドは無視する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLogRecord {
    /// `YYYY-MM-DD HH:MM:SS`（解析はエンコーダー側で行う）
    pub timestamp: String,
    pub src_ip: String,
    pub dest_ip: String,
    pub src_port: u16,
    pub dest_port: u16,
    pub protocol: Protocol,
    pub action: Action,
    pub bytes_transferred: u64,
}

impl FlowLogRecord {
    /// JSON 1行からレコードを解析
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// 判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Anomaly,
    Normal,
}

impl Classification {
    /// Outlier-detector style label: -1 for anomalies, 1 for inliers
    pub fn pred(&self) -> i8 {
        match self {
            Classification::Anomaly => -1,
            Classification::Normal => 1,
        }
    }

    pub fn is_anomaly(&self) -> bool {
        matches!(self, Classification::Anomaly)
    }
}

/// スコア付きのフローレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(flatten)]
    pub record: FlowLogRecord,
    /// 低いほど異常（モデル固有のスケール）
    pub score: f64,
    pub classification: Classification,
    pub pred: i8,
}

impl AnomalyRecord {
    pub fn new(record: FlowLogRecord, score: f64, classification: Classification) -> Self {
        Self {
            record,
            score,
            pred: classification.pred(),
            classification,
        }
    }
}
