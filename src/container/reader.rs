//! ZIPアーカイブからのパート読み出し

use std::io::{self, Read, Seek, SeekFrom, Write};
use tempfile::SpooledTempFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::XlsxNativeError;
use crate::security::{check_archive, SecurityConfig};

/// パートをメモリに保持する上限（これを超えると一時ファイルへ書き出す）
const SPOOL_THRESHOLD: usize = 2 * 1024 * 1024;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// 読み込み用のパッケージハンドル
///
/// 開く時点でアーカイブ全体の上限チェックを行い、以後は名前でパートを取り出します。
pub(crate) struct ZipContainer<R: Read + Seek> {
    archive: ZipArchive<R>,
    security: SecurityConfig,
}

impl<R: Read + Seek> ZipContainer<R> {
    /// アーカイブを開く
    ///
    /// ZIPとして読めない入力は`Format`エラーになります。
    pub fn open(source: R) -> Result<Self, XlsxNativeError> {
        Self::open_with_config(source, SecurityConfig::default())
    }

    pub fn open_with_config(source: R, security: SecurityConfig) -> Result<Self, XlsxNativeError> {
        let mut archive = ZipArchive::new(source)
            .map_err(|e| XlsxNativeError::Format(format!("Cannot open ZIP archive: {}", e)))?;
        check_archive(&mut archive, &security)?;
        log::debug!("opened package with {} entries", archive.len());

        Ok(Self { archive, security })
    }

    /// パートの内容をバイト列として取得
    ///
    /// パートが存在しない場合は`Ok(None)`を返します。
    pub fn part(&mut self, name: &str) -> Result<Option<Vec<u8>>, XlsxNativeError> {
        let mut buffer = Vec::new();
        if self.copy_part(name, &mut buffer)?.is_none() {
            return Ok(None);
        }
        Ok(Some(buffer))
    }

    /// パートの内容を一時領域（小さければメモリ、大きければ一時ファイル）に展開
    ///
    /// 返されるハンドルは先頭にシーク済みです。
    pub fn part_to_spool(&mut self, name: &str) -> Result<Option<SpooledTempFile>, XlsxNativeError> {
        let mut spool = SpooledTempFile::new(SPOOL_THRESHOLD);
        if self.copy_part(name, &mut spool)?.is_none() {
            return Ok(None);
        }
        spool.seek(SeekFrom::Start(0))?;
        Ok(Some(spool))
    }

    /// パートを`dest`へ展開し、展開したバイト数を返す
    fn copy_part<W: io::Write>(
        &mut self,
        name: &str,
        dest: &mut W,
    ) -> Result<Option<u64>, XlsxNativeError> {
        let file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // セントラルディレクトリの申告サイズを信用せず、実際の展開量で上限を確認する
        let limit = self.security.max_file_size;
        let mut entry = file.take(limit.saturating_add(1));
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            // 展開・CRC検証の失敗はパッケージの破損、書き込み側の失敗のみI/Oエラー
            let n = match entry.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(XlsxNativeError::Format(format!(
                        "Part '{}' is corrupt: {}",
                        name, e
                    )))
                }
            };
            dest.write_all(&buf[..n])?;
            copied += n as u64;
        }
        if copied > limit {
            return Err(XlsxNativeError::SecurityViolation(format!(
                "Part '{}' exceeds maximum size: more than {} bytes",
                name, limit
            )));
        }
        Ok(Some(copied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn package(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        Cursor::new(zip.finish().unwrap().into_inner())
    }

    #[test]
    fn test_part_present_and_absent() {
        let mut container =
            ZipContainer::open(package(&[("xl/workbook.xml", &b"<workbook/>"[..])])).unwrap();

        assert_eq!(
            container.part("xl/workbook.xml").unwrap().as_deref(),
            Some(&b"<workbook/>"[..])
        );
        assert!(container.part("xl/sharedStrings.xml").unwrap().is_none());
    }

    #[test]
    fn test_part_to_spool_is_rewound() {
        let mut container =
            ZipContainer::open(package(&[("xl/worksheets/sheet1.xml", &b"<worksheet/>"[..])])).unwrap();

        let mut spool = container
            .part_to_spool("xl/worksheets/sheet1.xml")
            .unwrap()
            .unwrap();
        let mut content = String::new();
        spool.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<worksheet/>");
    }

    #[test]
    fn test_open_invalid_archive_is_format_error() {
        let result = ZipContainer::open(Cursor::new(b"this is not a zip file".to_vec()));
        assert!(matches!(result, Err(XlsxNativeError::Format(_))));
    }

    #[test]
    fn test_corrupt_part_is_format_error() {
        let name = "xl/worksheets/sheet1.xml";
        let mut sheet = String::from("<worksheet><sheetData>");
        for i in 1..=200 {
            sheet.push_str(&format!(r#"<row r="{0}"><c r="A{0}"><v>{0}</v></c></row>"#, i));
        }
        sheet.push_str("</sheetData></worksheet>");

        let mut bytes = package(&[(name, sheet.as_bytes())]).into_inner();
        // ローカルヘッダー（30バイト + 名前）の直後から圧縮データ
        let data_start = 30 + name.len();
        for byte in &mut bytes[data_start + 6..data_start + 26] {
            *byte ^= 0xA5;
        }

        let mut container = ZipContainer::open(Cursor::new(bytes)).unwrap();
        match container.part_to_spool(name) {
            Err(XlsxNativeError::Format(msg)) => assert!(msg.contains("corrupt")),
            Err(other) => panic!("Expected Format error, got {:?}", other),
            Ok(_) => panic!("Expected Format error, got a part"),
        }
    }

    #[test]
    fn test_part_size_limit_is_enforced() {
        let config = SecurityConfig {
            max_file_size: 4,
            ..Default::default()
        };
        let result = ZipContainer::open_with_config(package(&[("a.xml", &b"123456"[..])]), config);
        // 申告サイズの時点で拒否される
        assert!(matches!(result, Err(XlsxNativeError::SecurityViolation(_))));
    }
}
