//! Public API Types
//!
//! 表形式データの読み書きを行うバックエンドの共通インターフェースを定義するモジュール。
//!
//! CSVや他のライブラリに委譲するバックエンドはこのクレートの外側で同じトレイトを実装し、
//! どのバックエンドを使うかは呼び出し側（ファサード）が選択します。
//! このクレートが提供する実装は、ZIPとXMLを直接扱う`NativeXlsx`のみです。

use std::path::Path;

use crate::builder::{ReadOptions, WriteOptions, WriterBuilder};
use crate::error::XlsxNativeError;
use crate::reader::{Rows, XlsxReader};
use crate::types::{Cell, Row};

/// 表形式データのバックエンド
pub trait SpreadBackend {
    /// 行イテレータの型
    type Rows: Iterator<Item = Result<Row, XlsxNativeError>>;

    /// バックエンドの識別名
    fn name(&self) -> &'static str;

    /// ファイルパスから読み込む（エラーは最初の取り出しで返る）
    fn read_file(&self, path: &Path, options: &ReadOptions) -> Self::Rows;

    /// メモリ上のバイト列から読み込む
    fn read_bytes(&self, bytes: Vec<u8>, options: &ReadOptions) -> Self::Rows;

    /// ファイルパスへ書き込む
    fn write_file(
        &self,
        rows: &mut dyn Iterator<Item = Vec<Cell>>,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<bool, XlsxNativeError>;

    /// 標準出力へ書き出す
    fn output(
        &self,
        rows: &mut dyn Iterator<Item = Vec<Cell>>,
        filename: &str,
        options: &WriteOptions,
    ) -> Result<(), XlsxNativeError>;
}

/// ZIPコンテナとXMLパートを直接扱うXLSXバックエンド
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeXlsx;

impl SpreadBackend for NativeXlsx {
    type Rows = Rows;

    fn name(&self) -> &'static str {
        "native"
    }

    fn read_file(&self, path: &Path, options: &ReadOptions) -> Rows {
        XlsxReader::new(options.clone()).read_file(path)
    }

    fn read_bytes(&self, bytes: Vec<u8>, options: &ReadOptions) -> Rows {
        XlsxReader::new(options.clone()).read_bytes(bytes)
    }

    fn write_file(
        &self,
        rows: &mut dyn Iterator<Item = Vec<Cell>>,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<bool, XlsxNativeError> {
        let writer = WriterBuilder::new().with_options(options.clone()).build()?;
        writer.write_file(rows, path)
    }

    fn output(
        &self,
        rows: &mut dyn Iterator<Item = Vec<Cell>>,
        filename: &str,
        options: &WriteOptions,
    ) -> Result<(), XlsxNativeError> {
        let writer = WriterBuilder::new().with_options(options.clone()).build()?;
        writer.output(rows, filename)
    }
}
