//! Reader Module
//!
//! パッケージを開き、最初のワークシートの行を遅延的に返すイテレータを提供する。
//!
//! パッケージの各パート（共有文字列、スタイル、ワークブック、ワークシート）は
//! 読み込み開始時にまとめて取り出され、行のデコードのみがイテレータを進めるたびに行われます。
//! パッケージを開く際のエラーは呼び出し時ではなく、最初に行を取り出した時点で返されます。

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tempfile::SpooledTempFile;

use crate::builder::ReadOptions;
use crate::container::ZipContainer;
use crate::error::XlsxNativeError;
use crate::formatter::DateCodec;
use crate::parser::shared_strings::SharedStringTable;
use crate::parser::styles::StyleTable;
use crate::parser::workbook::WorkbookInfo;
use crate::parser::worksheet::{CellTables, ColumnFormatCache, WorksheetDecoder};
use crate::types::{Cell, Record, Row};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// XLSXリーダー
///
/// `ReaderBuilder`で構築します。1つのリーダーから何度でも読み込みを開始でき、
/// 読み込みごとに独立した共有文字列テーブル、スタイルテーブル、列書式キャッシュが作られます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxnative::ReaderBuilder;
///
/// # fn main() -> Result<(), xlsxnative::XlsxNativeError> {
/// let reader = ReaderBuilder::new().with_assoc(true).build()?;
/// for row in reader.read_file("people.xlsx") {
///     let row = row?;
///     println!("{:?}", row.record());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct XlsxReader {
    options: ReadOptions,
}

impl XlsxReader {
    pub(crate) fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    /// 読み込み設定
    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// ファイルパスから読み込む
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Rows {
        let path = path.as_ref();
        log::debug!("reading {}", path.display());
        match File::open(path) {
            Ok(file) => self.read_stream(BufReader::new(file)),
            Err(e) => Rows::failed(e.into()),
        }
    }

    /// シーク可能なストリームから読み込む
    pub fn read_stream<R: Read + Seek>(&self, source: R) -> Rows {
        match RowStream::open(source, &self.options) {
            Ok(stream) => Rows {
                state: RowsState::Streaming(Box::new(stream)),
            },
            Err(e) => Rows::failed(e),
        }
    }

    /// メモリ上のバイト列から読み込む
    pub fn read_bytes(&self, bytes: impl Into<Vec<u8>>) -> Rows {
        self.read_stream(Cursor::new(bytes.into()))
    }
}

/// 行イテレータ
///
/// 1回限りの有限なシーケンスです。エラーを1度返した後、または最後の行の後は`None`を返し続けます。
/// 途中でドロップすると、ワークシートの一時領域も解放されます。
pub struct Rows {
    state: RowsState,
}

enum RowsState {
    /// 最初の取り出しで返すエラー
    Failed(XlsxNativeError),
    Streaming(Box<RowStream>),
    Done,
}

impl Rows {
    fn failed(error: XlsxNativeError) -> Self {
        Self {
            state: RowsState::Failed(error),
        }
    }

    /// すべての行を読み込んで`Vec`に集める
    pub fn collect_rows(self) -> Result<Vec<Row>, XlsxNativeError> {
        self.collect()
    }
}

impl Iterator for Rows {
    type Item = Result<Row, XlsxNativeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.state, RowsState::Done) {
            RowsState::Failed(e) => Some(Err(e)),
            RowsState::Done => None,
            RowsState::Streaming(mut stream) => match stream.next_row() {
                Ok(Some(row)) => {
                    self.state = RowsState::Streaming(stream);
                    Some(Ok(row))
                }
                Ok(None) => {
                    log::debug!("worksheet exhausted");
                    None
                }
                Err(e) => Some(Err(e)),
            },
        }
    }
}

impl std::iter::FusedIterator for Rows {}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            RowsState::Failed(_) => "failed",
            RowsState::Streaming(_) => "streaming",
            RowsState::Done => "done",
        };
        f.debug_struct("Rows").field("state", &state).finish()
    }
}

/// 1回の読み込みの状態
struct RowStream {
    decoder: WorksheetDecoder<BufReader<SpooledTempFile>>,
    cache: ColumnFormatCache,
    assoc: bool,
    headers: Option<HeaderSlots>,
    total_columns: Option<usize>,
}

impl RowStream {
    fn open<R: Read + Seek>(source: R, options: &ReadOptions) -> Result<Self, XlsxNativeError> {
        let mut container = ZipContainer::open(source)?;

        let workbook = WorkbookInfo::load(
            container.part(WORKBOOK_PART)?.as_deref(),
            container.part(WORKBOOK_RELS_PART)?.as_deref(),
        );
        let shared_strings = SharedStringTable::load(container.part(SHARED_STRINGS_PART)?.as_deref());
        let styles = StyleTable::load(container.part(STYLES_PART)?.as_deref());

        let worksheet = container
            .part_to_spool(&workbook.worksheet_path)?
            .ok_or_else(|| {
                XlsxNativeError::Format(format!(
                    "Worksheet part '{}' is missing",
                    workbook.worksheet_path
                ))
            })?;
        log::debug!(
            "streaming {} ({} shared strings, {} cell formats, {:?})",
            workbook.worksheet_path,
            shared_strings.len(),
            styles.len(),
            workbook.date_system
        );

        let tables = CellTables {
            shared_strings,
            styles,
            codec: DateCodec::new(workbook.date_system),
        };

        Ok(Self {
            decoder: WorksheetDecoder::new(BufReader::new(worksheet), tables),
            cache: ColumnFormatCache::new(),
            assoc: options.assoc,
            headers: None,
            total_columns: None,
        })
    }

    fn next_row(&mut self) -> Result<Option<Row>, XlsxNativeError> {
        let header_offset = usize::from(self.assoc);

        loop {
            let Some(mut cells) = self.decoder.next_row(&mut self.cache, header_offset)? else {
                return Ok(None);
            };

            if let Some(total) = self.total_columns {
                if cells.len() < total {
                    cells.resize(total, Cell::Null);
                }
            }
            if cells.iter().all(Cell::is_empty) {
                log::trace!("skipping empty row");
                continue;
            }

            if !self.assoc {
                if self.total_columns.is_none() {
                    self.total_columns = Some(cells.len());
                }
                return Ok(Some(Row::Cells(cells)));
            }

            match &self.headers {
                None => {
                    let headers: Vec<String> = cells.into_iter().map(Cell::into_string).collect();
                    log::debug!("header row has {} columns", headers.len());
                    self.total_columns = Some(headers.len());
                    self.headers = Some(HeaderSlots::new(headers));
                }
                Some(headers) => return Ok(Some(Row::Record(headers.record(cells)))),
            }
        }
    }
}

/// ヘッダー行から求めた列 → フィールド位置の対応表
///
/// 同名のヘッダーは最初に現れた列の位置にまとめられ、後の列の値が優先されます。
struct HeaderSlots {
    names: Vec<String>,
    slots: Vec<usize>,
}

impl HeaderSlots {
    fn new(headers: Vec<String>) -> Self {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(headers.len());
        let mut names = Vec::with_capacity(headers.len());
        let mut slots = Vec::with_capacity(headers.len());

        for header in headers {
            let slot = match positions.get(&header) {
                Some(&slot) => slot,
                None => {
                    positions.insert(header.clone(), names.len());
                    names.push(header);
                    names.len() - 1
                }
            };
            slots.push(slot);
        }
        if names.len() < slots.len() {
            log::debug!("{} duplicate header names merged", slots.len() - names.len());
        }

        Self { names, slots }
    }

    /// ヘッダー列より右のセルは捨てる
    fn record(&self, cells: Vec<Cell>) -> Record {
        let mut values = vec![Cell::Null; self.names.len()];
        for (&slot, value) in self.slots.iter().zip(cells) {
            values[slot] = value;
        }
        Record::from_fields(self.names.iter().cloned().zip(values).collect())
    }
}
