//! Security Tests
//!
//! 読み込むアーカイブに対するセキュリティ対策のテストケースを実装します。
//! ZIP bomb攻撃、パストラバーサル攻撃、XXE攻撃などへの対策を検証します。

use std::io::{Cursor, Write};
use xlsxnative::{Cell, ReaderBuilder, Row, WriterBuilder, XlsxNativeError};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

const WORKSHEET: &str = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>ok</t></is></c></row></sheetData></worksheet>"#;

fn first_pull(zip_data: Vec<u8>) -> Option<Result<Row, XlsxNativeError>> {
    let reader = ReaderBuilder::new().build().unwrap();
    reader.read_bytes(zip_data).next()
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むZIPアーカイブ
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        zip.write_all(WORKSHEET.as_bytes()).unwrap();
        for i in 0..10_000 {
            let file_name = format!("xl/file{}.xml", i);
            zip.start_file(file_name, options).unwrap();
            zip.write_all(b"test").unwrap();
        }

        zip.finish().unwrap();
    }

    match first_pull(zip_data) {
        Some(Err(XlsxNativeError::SecurityViolation(msg))) => {
            assert!(msg.contains("too many files"));
        }
        other => panic!("Expected SecurityViolation, got {:?}", other),
    }
}

/// ZIP bomb攻撃のテスト: 展開後のサイズが大きすぎるZIPアーカイブ
#[test]
#[ignore] // 大きなファイルを作成するため、通常のテストではスキップ
fn test_zip_bomb_large_part() {
    // 2GBを超える展開サイズを持つワークシート（高圧縮率）
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(true);

        zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        let chunk = vec![b' '; 1024 * 1024];
        for _ in 0..2049 {
            zip.write_all(&chunk).unwrap();
        }
        zip.finish().unwrap();
    }

    match first_pull(zip_data) {
        Some(Err(XlsxNativeError::SecurityViolation(msg))) => {
            assert!(msg.contains("exceeds maximum size"));
        }
        other => panic!("Expected SecurityViolation, got {:?}", other),
    }
}

/// パストラバーサル攻撃のテスト: 親ディレクトリ参照を含むエントリ
#[test]
fn test_path_traversal_entry() {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        zip.start_file("xl/worksheets/sheet1.xml", FileOptions::default())
            .unwrap();
        zip.write_all(WORKSHEET.as_bytes()).unwrap();
        zip.start_file("../../etc/evil.xml", FileOptions::default())
            .unwrap();
        zip.write_all(b"<evil/>").unwrap();
        zip.finish().unwrap();
    }

    match first_pull(zip_data) {
        Some(Err(XlsxNativeError::SecurityViolation(msg))) => {
            assert!(msg.contains("Path traversal"));
        }
        other => panic!("Expected SecurityViolation, got {:?}", other),
    }
}

/// パストラバーサル攻撃のテスト: 絶対パスのエントリ
#[test]
fn test_absolute_path_entry() {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        zip.start_file("/tmp/evil.xml", FileOptions::default())
            .unwrap();
        zip.write_all(b"<evil/>").unwrap();
        zip.finish().unwrap();
    }

    assert!(matches!(
        first_pull(zip_data),
        Some(Err(XlsxNativeError::SecurityViolation(_)))
    ));
}

/// XXE攻撃のテスト: 外部エンティティは展開されない
#[test]
fn test_xxe_entity_is_not_expanded() {
    let worksheet = r#"<?xml version="1.0"?>
<!DOCTYPE worksheet [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>&xxe;</t></is></c></row></sheetData></worksheet>"#;

    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        zip.start_file("xl/worksheets/sheet1.xml", FileOptions::default())
            .unwrap();
        zip.write_all(worksheet.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    let rows = ReaderBuilder::new()
        .build()
        .unwrap()
        .read_bytes(zip_data)
        .collect_rows()
        .unwrap();
    assert_eq!(rows, vec![Row::Cells(vec![Cell::from("&xxe;")])]);
}

/// 破損したアーカイブは`Format`エラー
#[test]
fn test_truncated_archive() {
    let bytes = WriterBuilder::new()
        .build()
        .unwrap()
        .write_to_vec(vec![vec!["a", "b"]])
        .unwrap();
    let truncated = bytes[..bytes.len() / 2].to_vec();

    assert!(matches!(
        first_pull(truncated),
        Some(Err(XlsxNativeError::Format(_)))
    ));
}

/// 圧縮データが破損したワークシートは`Format`エラー（I/Oエラーではない）
#[test]
fn test_corrupt_deflate_stream_is_format_error() {
    let name = "xl/worksheets/sheet1.xml";
    let mut worksheet = String::from("<worksheet><sheetData>");
    for i in 1..=200 {
        worksheet.push_str(&format!(
            r#"<row r="{0}"><c r="A{0}" t="inlineStr"><is><t>row {0}</t></is></c></row>"#,
            i
        ));
    }
    worksheet.push_str("</sheetData></worksheet>");

    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name, options).unwrap();
        zip.write_all(worksheet.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    // ローカルヘッダー（30バイト + 名前）の後ろが圧縮データ
    let data_start = 30 + name.len();
    for byte in &mut zip_data[data_start + 10..data_start + 30] {
        *byte ^= 0xFF;
    }

    let mut rows = ReaderBuilder::new().build().unwrap().read_bytes(zip_data);
    match rows.next() {
        Some(Err(XlsxNativeError::Format(_))) => {}
        other => panic!("Expected Format error, got {:?}", other),
    }
    assert!(rows.next().is_none());
}

/// 書き込み: 存在しないディレクトリへの出力は書き込み開始前に拒否される
#[test]
fn test_write_to_missing_directory_is_rejected_before_consuming_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no").join("such").join("dir.xlsx");

    let mut consumed = 0;
    let rows = (0..10).map(|i| {
        consumed += 1;
        vec![i as i64]
    });

    let result = WriterBuilder::new().build().unwrap().write_file(rows, &path);
    assert!(matches!(result, Err(XlsxNativeError::Validation(_))));
    assert_eq!(consumed, 0);
}
