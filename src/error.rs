//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// xlsxnativeクレート全体で使用するエラー型
///
/// XLSXパッケージの読み込み・書き込み中に発生するすべてのエラーを
/// 統一的に扱うために使用されます。
///
/// # エラーの種類
///
/// - `Io`: 入出力先へのアクセス失敗（ファイルが開けない、書き込めないなど）
/// - `Format`: パッケージが壊れている、または必須パートが存在しない
/// - `Validation`: 呼び出し側のオプション指定が不正
/// - `SecurityViolation`: アーカイブの上限値（ファイル数、展開サイズなど）に違反
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxnative::XlsxNativeError;
/// use std::fs::File;
///
/// fn open_source(path: &str) -> Result<File, XlsxNativeError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(file)
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxNativeError {
    /// I/O操作中に発生したエラー
    ///
    /// 入力ファイルの読み込み失敗、出力先の作成・書き込み失敗など、
    /// `std::io::Error`が発生した場合に使用されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// パッケージの形式エラー
    ///
    /// ZIPアーカイブとして読めない、ワークシートパートが存在しない、
    /// ワークシートXMLが解析できないなど、読み込み全体を中断すべき場合に使用されます。
    #[error("Invalid XLSX package: {0}")]
    Format(String),

    /// オプションの検証エラー
    ///
    /// `build()`時、または書き込み開始前に検出される呼び出し側の誤りです。
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use xlsxnative::{WriterBuilder, XlsxNativeError};
    ///
    /// let result = WriterBuilder::new().with_freeze_pane("not a cell").build();
    ///
    /// match result {
    ///     Err(XlsxNativeError::Validation(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Validation error: {0}")]
    Validation(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃などの制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl From<zip::result::ZipError> for XlsxNativeError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => XlsxNativeError::Io(e),
            other => XlsxNativeError::Format(format!("ZIP archive error: {}", other)),
        }
    }
}

impl From<quick_xml::Error> for XlsxNativeError {
    fn from(err: quick_xml::Error) -> Self {
        XlsxNativeError::Format(format!("XML parse error: {}", err))
    }
}

impl From<serde_json::Error> for XlsxNativeError {
    fn from(err: serde_json::Error) -> Self {
        XlsxNativeError::Validation(format!("Invalid options: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: XlsxNativeError = io_err.into();

        match error {
            XlsxNativeError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let error: XlsxNativeError = io_err.into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("IO error"));
        assert!(error_msg.contains("Permission denied"));
    }

    // ZIPエラーの変換: I/O由来はIo、それ以外はFormat
    #[test]
    fn test_zip_error_conversion() {
        let error: XlsxNativeError = zip::result::ZipError::FileNotFound.into();
        assert!(matches!(error, XlsxNativeError::Format(_)));

        let error: XlsxNativeError =
            zip::result::ZipError::InvalidArchive("Invalid zip header").into();
        match error {
            XlsxNativeError::Format(msg) => assert!(msg.contains("Invalid zip header")),
            _ => panic!("Expected Format error"),
        }

        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "truncated");
        let error: XlsxNativeError = zip::result::ZipError::Io(io_err).into();
        assert!(matches!(error, XlsxNativeError::Io(_)));
    }

    #[test]
    fn test_json_error_is_validation() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let error: XlsxNativeError = err.into();
        assert!(matches!(error, XlsxNativeError::Validation(_)));
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), XlsxNativeError> {
            let _file = std::fs::File::open("nonexistent_file.xlsx")?;
            Ok(())
        }

        match io_operation() {
            Err(XlsxNativeError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }

    #[test]
    fn test_all_error_formats() {
        let io_err: XlsxNativeError = io::Error::other("test io").into();
        assert!(io_err.to_string().starts_with("IO error"));

        let format_err = XlsxNativeError::Format("no worksheet".to_string());
        assert!(format_err.to_string().starts_with("Invalid XLSX package"));

        let validation_err = XlsxNativeError::Validation("bad option".to_string());
        assert!(validation_err.to_string().starts_with("Validation error"));

        let security_err = XlsxNativeError::SecurityViolation("too many files".to_string());
        assert!(security_err.to_string().starts_with("Security violation"));
    }
}
