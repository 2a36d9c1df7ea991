//! Parser Module
//!
//! パッケージ内の各XMLパート（共有文字列、スタイル、ワークブック、ワークシート）を
//! quick-xmlで解析するモジュール群。

pub(crate) mod shared_strings;
pub(crate) mod styles;
pub(crate) mod workbook;
pub(crate) mod worksheet;
