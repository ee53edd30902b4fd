//! Feature Encoding
//!
//! フローレコードを固定長の数値特徴量ベクトルに変換します。
//! 学習時と推論時で同一の関数を使用するため、出力は入力のみから決定される。
//!
//! ## デフォルト値の置換ポリシー
//!
//! - タイムスタンプが解析できない場合、`hour_of_day` は `0`
//! - IPv4 アドレスが解析できない場合、エンコード値は `0`
//!
//! どちらもイベント全体を失う代わりに1つの特徴量を劣化させる。

use crate::record::{Action, FlowLogRecord, Protocol, TIMESTAMP_FORMAT};
use chrono::{NaiveDateTime, Timelike};
use std::net::Ipv4Addr;

/// 特徴量の次元数
pub const FEATURE_DIM: usize = 8;

/// 特徴量名（順序固定）
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "src_port",
    "dest_port",
    "bytes_transferred",
    "hour",
    "protocol_num",
    "action_num",
    "src_ip_int",
    "dest_ip_int",
];

/// 1レコード分の特徴量
pub type FeatureVector = [f64; FEATURE_DIM];

/// レコードを特徴量ベクトルにエンコード
pub fn encode(record: &FlowLogRecord) -> FeatureVector {
    let protocol_num = match record.protocol {
        Protocol::Udp => 1.0,
        Protocol::Tcp => 0.0,
    };
    let action_num = match record.action {
        Action::Allow => 1.0,
        Action::Deny => 0.0,
    };

    [
        f64::from(record.src_port),
        f64::from(record.dest_port),
        record.bytes_transferred as f64,
        f64::from(hour_of_day(&record.timestamp)),
        protocol_num,
        action_num,
        f64::from(ipv4_to_u32(&record.src_ip)),
        f64::from(ipv4_to_u32(&record.dest_ip)),
    ]
}

/// タイムスタンプから時（0-23）を取り出す。解析失敗時は 0
pub fn hour_of_day(timestamp: &str) -> u32 {
    NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT)
        .map(|dt| dt.hour())
        .unwrap_or(0)
}

/// ドット区切りIPv4をビッグエンディアンの u32 に変換。解析失敗時は 0
pub fn ipv4_to_u32(ip: &str) -> u32 {
    ip.trim().parse::<Ipv4Addr>().map(u32::from).unwrap_or(0)
}

/// u32 をドット区切りIPv4に戻す
pub fn u32_to_ipv4(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}
