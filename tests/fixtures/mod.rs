//! Test Fixtures
//!
//! 統合テスト用の共通ヘルパー

#![allow(dead_code)]

pub mod flows;
