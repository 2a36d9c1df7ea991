//! Builder Module
//!
//! Fluent Builder APIを提供し、`XlsxReader`/`XlsxWriter`インスタンスを段階的に構築する。
//!
//! 設定は列挙済みの構造体（`ReadOptions`/`WriteOptions`）として保持され、
//! `build()`時に検証されます。文字列キーやJSONで渡される設定は、
//! 未知のキーを`Validation`エラーとして拒否します。

use serde::Deserialize;

use crate::error::XlsxNativeError;
use crate::reader::XlsxReader;
use crate::types::{CellCoord, CellRange};
use crate::writer::{SheetLayout, XlsxWriter};

/// 読み込み設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadOptions {
    /// 1行目をヘッダーとして扱い、以降の行をヘッダー名をキーとするレコードで返す
    pub assoc: bool,
}

/// 書き込み設定
///
/// 文書プロパティはすべて省略可能で、省略時は空文字列（言語は`en-US`）になります。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteOptions {
    pub creator: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub company: Option<String>,
    /// 文書の言語（例: `en-US`、`ja-JP`）
    pub language: Option<String>,
    /// オートフィルターの範囲（例: `A1:C1`）
    pub autofilter: Option<String>,
    /// ウィンドウ枠の固定位置（例: `B2`）
    #[serde(alias = "freezePane")]
    pub freeze_pane: Option<String>,
    /// ストリーミング方式で書き込む
    pub stream: bool,
}

/// `XlsxReader`のビルダー
///
/// # 使用例
///
/// ```rust
/// use xlsxnative::ReaderBuilder;
///
/// # fn main() -> Result<(), xlsxnative::XlsxNativeError> {
/// let reader = ReaderBuilder::new().with_assoc(true).build()?;
/// assert!(reader.options().assoc);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReaderBuilder {
    options: ReadOptions,
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 連想モードを指定する
    pub fn with_assoc(mut self, assoc: bool) -> Self {
        self.options.assoc = assoc;
        self
    }

    /// 設定をまとめて指定する
    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// 文字列キーで設定を指定する
    ///
    /// 未知のキー、または解釈できない値の場合は`Validation`エラー。
    pub fn set_option(mut self, key: &str, value: &str) -> Result<Self, XlsxNativeError> {
        match key {
            "assoc" => self.options.assoc = parse_bool(key, value)?,
            _ => return Err(unknown_option(key)),
        }
        Ok(self)
    }

    /// JSONオブジェクト（例: `{"assoc": true}`）から設定を読み込む
    pub fn from_json(json: &str) -> Result<Self, XlsxNativeError> {
        let options: ReadOptions = serde_json::from_str(json)?;
        Ok(Self::new().with_options(options))
    }

    pub fn build(self) -> Result<XlsxReader, XlsxNativeError> {
        Ok(XlsxReader::new(self.options))
    }
}

/// `XlsxWriter`のビルダー
///
/// # 使用例
///
/// ```rust
/// use xlsxnative::WriterBuilder;
///
/// # fn main() -> Result<(), xlsxnative::XlsxNativeError> {
/// let writer = WriterBuilder::new()
///     .with_title("Monthly report")
///     .with_freeze_pane("A2")
///     .with_autofilter("A1:C1")
///     .build()?;
/// assert_eq!(writer.options().title.as_deref(), Some("Monthly report"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriterBuilder {
    options: WriteOptions,
}

impl WriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.options.creator = Some(creator.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.options.title = Some(title.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.options.subject = Some(subject.into());
        self
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.options.keywords = Some(keywords.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.options.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.options.category = Some(category.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.options.company = Some(company.into());
        self
    }

    /// 文書の言語を指定する（デフォルト: `en-US`）
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.options.language = Some(language.into());
        self
    }

    /// オートフィルターの範囲を指定する（例: `A1:C1`）
    pub fn with_autofilter(mut self, range: impl Into<String>) -> Self {
        self.options.autofilter = Some(range.into());
        self
    }

    /// ウィンドウ枠を固定する（例: `B2`で1行目とA列を固定）
    pub fn with_freeze_pane(mut self, cell: impl Into<String>) -> Self {
        self.options.freeze_pane = Some(cell.into());
        self
    }

    /// ストリーミング方式を使用するか指定する
    ///
    /// ストリーミング方式では出力先をシークせず、各パートを順に追記します。
    /// パイプや標準出力など、シークできない出力先に直接書き込めます。
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.options.stream = stream;
        self
    }

    /// 設定をまとめて指定する
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// 文字列キーで設定を指定する
    ///
    /// キーは`freeze_pane`と`freezePane`のどちらでも受け付けます。
    /// 未知のキー、または解釈できない値の場合は`Validation`エラー。
    pub fn set_option(mut self, key: &str, value: &str) -> Result<Self, XlsxNativeError> {
        let value_string = Some(value.to_string());
        match key {
            "creator" => self.options.creator = value_string,
            "title" => self.options.title = value_string,
            "subject" => self.options.subject = value_string,
            "keywords" => self.options.keywords = value_string,
            "description" => self.options.description = value_string,
            "category" => self.options.category = value_string,
            "company" => self.options.company = value_string,
            "language" => self.options.language = value_string,
            "autofilter" => self.options.autofilter = value_string,
            "freeze_pane" | "freezePane" => self.options.freeze_pane = value_string,
            "stream" => self.options.stream = parse_bool(key, value)?,
            _ => return Err(unknown_option(key)),
        }
        Ok(self)
    }

    /// JSONオブジェクト（例: `{"title": "Report", "stream": true}`）から設定を読み込む
    pub fn from_json(json: &str) -> Result<Self, XlsxNativeError> {
        let options: WriteOptions = serde_json::from_str(json)?;
        Ok(Self::new().with_options(options))
    }

    /// 設定を検証し、`XlsxWriter`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxNativeError::Validation`
    ///   * `autofilter`がA1形式の範囲でない
    ///   * `freeze_pane`がA1形式のセル参照でない
    ///   * `language`が空文字列
    pub fn build(self) -> Result<XlsxWriter, XlsxNativeError> {
        let autofilter = match self.options.autofilter.as_deref() {
            Some(range) => Some(CellRange::parse(range).ok_or_else(|| {
                XlsxNativeError::Validation(format!("Invalid autofilter range: '{}'", range))
            })?),
            None => None,
        };

        let freeze_pane = match self.options.freeze_pane.as_deref() {
            Some(cell) => Some(CellCoord::parse(cell).ok_or_else(|| {
                XlsxNativeError::Validation(format!("Invalid freeze pane cell: '{}'", cell))
            })?),
            None => None,
        };

        if let Some(language) = &self.options.language {
            if language.trim().is_empty() {
                return Err(XlsxNativeError::Validation(
                    "Language must not be empty".to_string(),
                ));
            }
        }

        let layout = SheetLayout {
            freeze_pane,
            autofilter,
        };
        Ok(XlsxWriter::new(self.options, layout))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, XlsxNativeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(XlsxNativeError::Validation(format!(
            "Invalid boolean for option '{}': '{}'",
            key, value
        ))),
    }
}

fn unknown_option(key: &str) -> XlsxNativeError {
    XlsxNativeError::Validation(format!("Unknown option: '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_builder_default() {
        let reader = ReaderBuilder::new().build().unwrap();
        assert!(!reader.options().assoc);
    }

    #[test]
    fn test_reader_set_option() {
        let reader = ReaderBuilder::new()
            .set_option("assoc", "true")
            .unwrap()
            .build()
            .unwrap();
        assert!(reader.options().assoc);

        assert!(matches!(
            ReaderBuilder::new().set_option("assoc", "maybe"),
            Err(XlsxNativeError::Validation(_))
        ));
        assert!(matches!(
            ReaderBuilder::new().set_option("delimiter", ";"),
            Err(XlsxNativeError::Validation(_))
        ));
    }

    #[test]
    fn test_reader_from_json() {
        let builder = ReaderBuilder::from_json(r#"{"assoc": true}"#).unwrap();
        assert!(builder.build().unwrap().options().assoc);

        match ReaderBuilder::from_json(r#"{"assoc": true, "separator": ","}"#) {
            Err(XlsxNativeError::Validation(msg)) => assert!(msg.contains("separator")),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_writer_builder_setters() {
        let writer = WriterBuilder::new()
            .with_creator("me")
            .with_title("t")
            .with_subject("s")
            .with_keywords("k")
            .with_description("d")
            .with_category("c")
            .with_company("acme")
            .with_language("ja-JP")
            .with_stream(true)
            .build()
            .unwrap();

        let options = writer.options();
        assert_eq!(options.creator.as_deref(), Some("me"));
        assert_eq!(options.company.as_deref(), Some("acme"));
        assert_eq!(options.language.as_deref(), Some("ja-JP"));
        assert!(options.stream);
    }

    #[test]
    fn test_writer_validation() {
        assert!(WriterBuilder::new().with_autofilter("A1:C1").build().is_ok());
        assert!(WriterBuilder::new().with_freeze_pane("B2").build().is_ok());

        for builder in [
            WriterBuilder::new().with_autofilter("C1:A1"),
            WriterBuilder::new().with_autofilter("everything"),
            WriterBuilder::new().with_freeze_pane("not a cell"),
            WriterBuilder::new().with_freeze_pane("A0"),
            WriterBuilder::new().with_language("  "),
        ] {
            assert!(matches!(
                builder.build(),
                Err(XlsxNativeError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_writer_set_option_accepts_camel_case() {
        let writer = WriterBuilder::new()
            .set_option("freezePane", "A2")
            .unwrap()
            .set_option("stream", "1")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(writer.options().freeze_pane.as_deref(), Some("A2"));
        assert!(writer.options().stream);

        assert!(matches!(
            WriterBuilder::new().set_option("password", "x"),
            Err(XlsxNativeError::Validation(_))
        ));
    }

    #[test]
    fn test_writer_from_json() {
        let builder =
            WriterBuilder::from_json(r#"{"title": "Report", "freezePane": "B2", "stream": true}"#)
                .unwrap();
        let writer = builder.build().unwrap();
        assert_eq!(writer.options().title.as_deref(), Some("Report"));
        assert_eq!(writer.options().freeze_pane.as_deref(), Some("B2"));

        assert!(matches!(
            WriterBuilder::from_json(r#"{"sheetName": "Data"}"#),
            Err(XlsxNativeError::Validation(_))
        ));
        assert!(matches!(
            WriterBuilder::from_json("not json"),
            Err(XlsxNativeError::Validation(_))
        ));
    }
}
