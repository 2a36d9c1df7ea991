//! Writer Module
//!
//! 行のシーケンスを1シートのXLSXパッケージとして書き出す。
//!
//! # 書き込み方式
//!
//! - アーカイブ全体方式（デフォルト）: `zip`クレートで標準的なランダムアクセス可能なZIPを生成
//! - ストリーミング方式（`stream`オプション）: シークせずに各パートを順に追記
//!
//! どちらの方式でも、ワークシートは先に一時領域へ生成され、
//! 行のシーケンスは1度だけ先頭から順に消費されます。

mod package;
mod worksheet;

pub(crate) use worksheet::SheetLayout;

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::builder::WriteOptions;
use crate::container::{
    build_in_temp_then_copy, create_destination, open_in_place, validate_destination,
    ArchiveWriter, DosTimestamp, PartSink, StreamingZipWriter,
};
use crate::error::XlsxNativeError;
use crate::types::Cell;
use worksheet::WorksheetWriter;

/// XLSXライター
///
/// `WriterBuilder`で構築します。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxnative::WriterBuilder;
///
/// # fn main() -> Result<(), xlsxnative::XlsxNativeError> {
/// let writer = WriterBuilder::new().with_creator("Sales team").build()?;
/// let rows = vec![
///     vec!["fname", "sname", "email"],
///     vec!["john", "doe", "john.doe@example.com"],
/// ];
/// writer.write_file(rows, "people.xlsx")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct XlsxWriter {
    options: WriteOptions,
    layout: SheetLayout,
}

impl XlsxWriter {
    pub(crate) fn new(options: WriteOptions, layout: SheetLayout) -> Self {
        Self { options, layout }
    }

    /// 書き込み設定
    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// ファイルパスへ書き込む
    ///
    /// 出力先はその場で開いて上書きします。開けない、またはシークできない出力先の場合は
    /// 一時ファイル上でアーカイブを組み立ててから出力先へコピーします。
    ///
    /// # 戻り値
    ///
    /// * `Ok(true)` - 書き込みに成功した場合
    /// * `Err(Validation)` - 出力先ディレクトリが存在しない、または書き込めない場合（行は消費されない）
    /// * `Err(Io)` - 書き込み中にI/Oエラーが発生した場合
    pub fn write_file<I, R, V, P>(&self, rows: I, path: P) -> Result<bool, XlsxNativeError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Cell>,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        validate_destination(path)?;

        let mut worksheet = self.render_worksheet(rows)?;
        let created = Utc::now();

        if self.options.stream {
            log::debug!("streaming package to {}", path.display());
            let file = create_destination(path)?;
            let mut zip = StreamingZipWriter::new(BufWriter::new(file), timestamp(created));
            self.assemble(&mut zip, created, &mut worksheet)?;
            zip.finish()?.flush()?;
            return Ok(true);
        }

        match open_in_place(path) {
            Some(file) => {
                log::debug!("writing package in place to {}", path.display());
                let mut zip = ArchiveWriter::new(file, timestamp(created));
                self.assemble(&mut zip, created, &mut worksheet)?;
                zip.finish()?.sync_all()?;
            }
            None => {
                log::debug!(
                    "{} cannot be opened in place, building in a temporary file",
                    path.display()
                );
                let mut dest = create_destination(path)?;
                build_in_temp_then_copy(&mut dest, |temp: &mut File| {
                    let mut zip = ArchiveWriter::new(temp, timestamp(created));
                    self.assemble(&mut zip, created, &mut worksheet)?;
                    zip.finish()?;
                    Ok(())
                })?;
            }
        }

        Ok(true)
    }

    /// 任意の出力先へ書き込む
    ///
    /// 出力先はシークできなくても構いません。アーカイブ全体方式では一時ファイル上で
    /// 組み立ててからコピーし、ストリーミング方式では直接書き込みます。
    pub fn write_to<I, R, V, W>(&self, rows: I, sink: &mut W) -> Result<(), XlsxNativeError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Cell>,
        W: Write + ?Sized,
    {
        let mut worksheet = self.render_worksheet(rows)?;
        let created = Utc::now();

        if self.options.stream {
            let mut zip = StreamingZipWriter::new(&mut *sink, timestamp(created));
            self.assemble(&mut zip, created, &mut worksheet)?;
            zip.finish()?.flush()?;
        } else {
            build_in_temp_then_copy(sink, |temp: &mut File| {
                let mut zip = ArchiveWriter::new(temp, timestamp(created));
                self.assemble(&mut zip, created, &mut worksheet)?;
                zip.finish()?;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// メモリ上のバイト列として書き出す
    pub fn write_to_vec<I, R, V>(&self, rows: I) -> Result<Vec<u8>, XlsxNativeError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Cell>,
    {
        let mut worksheet = self.render_worksheet(rows)?;
        let created = Utc::now();

        if self.options.stream {
            let mut zip = StreamingZipWriter::new(Vec::new(), timestamp(created));
            self.assemble(&mut zip, created, &mut worksheet)?;
            zip.finish()
        } else {
            let mut zip = ArchiveWriter::new(Cursor::new(Vec::new()), timestamp(created));
            self.assemble(&mut zip, created, &mut worksheet)?;
            Ok(zip.finish()?.into_inner())
        }
    }

    /// 標準出力へ書き出す
    ///
    /// ダウンロード用のヘッダー（`Content-Disposition`など）は呼び出し側が出力します。
    /// `filename`はログにのみ使用されます。
    pub fn output<I, R, V>(&self, rows: I, filename: &str) -> Result<(), XlsxNativeError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Cell>,
    {
        log::debug!("writing {} to standard output", filename);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.write_to(rows, &mut handle)
    }

    /// 行のシーケンスを消費してワークシートを生成
    fn render_worksheet<I, R, V>(&self, rows: I) -> Result<tempfile::SpooledTempFile, XlsxNativeError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Cell>,
    {
        let mut writer = WorksheetWriter::new(self.layout)?;
        for row in rows {
            writer.write_row(row)?;
        }
        log::debug!("rendered worksheet with {} rows", writer.rows_written());
        writer.finish()
    }

    fn assemble<S: PartSink>(
        &self,
        sink: &mut S,
        created: DateTime<Utc>,
        worksheet: &mut dyn Read,
    ) -> Result<(), XlsxNativeError> {
        package::assemble(sink, &self.options, self.layout.autofilter, created, worksheet)
    }
}

fn timestamp(created: DateTime<Utc>) -> DosTimestamp {
    DosTimestamp::from_datetime(created.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ReadOptions;
    use crate::reader::XlsxReader;
    use crate::types::Row;

    fn writer(stream: bool) -> XlsxWriter {
        let options = WriteOptions {
            stream,
            ..Default::default()
        };
        XlsxWriter::new(options, SheetLayout::default())
    }

    fn read_back(bytes: Vec<u8>) -> Vec<Row> {
        XlsxReader::new(ReadOptions::default())
            .read_bytes(bytes)
            .collect_rows()
            .unwrap()
    }

    fn sample() -> Vec<Vec<Cell>> {
        vec![
            vec![Cell::from("name"), Cell::from("qty")],
            vec![Cell::from("apple"), Cell::from(3i64)],
            vec![Cell::from("pear"), Cell::Null],
        ]
    }

    #[test]
    fn test_write_to_vec_both_strategies() {
        let expected = vec![
            Row::Cells(vec![Cell::from("name"), Cell::from("qty")]),
            Row::Cells(vec![Cell::from("apple"), Cell::Number("3".to_string())]),
            Row::Cells(vec![Cell::from("pear"), Cell::Null]),
        ];

        for stream in [false, true] {
            let bytes = writer(stream).write_to_vec(sample()).unwrap();
            assert_eq!(read_back(bytes), expected, "stream = {}", stream);
        }
    }

    #[test]
    fn test_write_to_non_seekable_sink() {
        for stream in [false, true] {
            let mut sink: Vec<u8> = Vec::new();
            writer(stream).write_to(sample(), &mut sink).unwrap();
            assert_eq!(read_back(sink).len(), 3);
        }
    }

    #[test]
    fn test_write_file_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, vec![0u8; 100_000]).unwrap();

        assert!(writer(false).write_file(sample(), &path).unwrap());
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(read_back(bytes).len(), 3);
    }

    #[test]
    fn test_write_file_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.xlsx");

        let result = writer(false).write_file(sample(), &path);
        assert!(matches!(result, Err(XlsxNativeError::Validation(_))));
        assert!(!path.exists());
    }
}
