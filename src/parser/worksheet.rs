//! Worksheet Reader
//!
//! ワークシートXMLを逐次解析し、1行ずつセル値を復元するモジュール。
//! セル参照（例: `C7`）に従って列カーソルを進め、XMLに存在しない
//! 空セルは`Cell::Null`で埋めます。

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::BufRead;

use crate::error::XlsxNativeError;
use crate::formatter::DateCodec;
use crate::parser::shared_strings::SharedStringTable;
use crate::parser::styles::{NumberFormatKind, StyleTable};
use crate::types::{col_letter_to_index, Cell};

/// 列ごとの書式キャッシュ
///
/// ある列で最初に自身のスタイルから書式が解決できた数値セル（ヘッダー行より後）の
/// 書式を記憶し、同じ列で後に現れる、自身のスタイルを解決できない数値セルに適用します。
/// 先頭のデータ行だけに書式が設定されたシートを想定したヒューリスティックです。
///
/// 読み込み1回ごとに生成され、他の読み込みと共有されることはありません。
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnFormatCache {
    formats: HashMap<usize, NumberFormatKind>,
}

impl ColumnFormatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 列の書式を取得
    pub fn get(&self, column: usize) -> Option<NumberFormatKind> {
        self.formats.get(&column).copied()
    }

    /// 列の書式を記憶（既に記憶済みの場合は何もしない）
    pub fn remember(&mut self, column: usize, kind: NumberFormatKind) {
        self.formats.entry(column).or_insert(kind);
    }
}

/// セルのデコードに使う読み込み単位のテーブル
pub(crate) struct CellTables {
    pub shared_strings: SharedStringTable,
    pub styles: StyleTable,
    pub codec: DateCodec,
}

/// 解析途中のセル
#[derive(Debug, Default)]
struct PendingCell {
    reference: Option<String>,
    cell_type: String,
    style: Option<usize>,
    has_style_attr: bool,
    value: String,
    inline: String,
    has_value: bool,
    in_value: bool,
    in_inline: bool,
    in_text: bool,
    phonetic_depth: usize,
}

impl PendingCell {
    /// `<c r="B2" t="s" s="3">`の属性を読み取る
    ///
    /// 壊れた属性は無視します。
    fn from_start(e: &BytesStart<'_>) -> Self {
        let mut cell = PendingCell::default();
        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            match attr.key.local_name().as_ref() {
                b"r" => cell.reference = Some(value),
                b"t" => cell.cell_type = value,
                b"s" => {
                    cell.has_style_attr = true;
                    cell.style = value.trim().parse().ok();
                }
                _ => {}
            }
        }
        cell
    }

    /// セル参照から列インデックスを取得
    fn column(&self) -> Option<usize> {
        let reference = self.reference.as_deref()?;
        let letters: String = reference
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        col_letter_to_index(&letters).map(|col| col as usize)
    }

    fn push_text(&mut self, text: &str) {
        if self.in_value {
            self.value.push_str(text);
        } else if self.in_text {
            self.inline.push_str(text);
        }
    }
}

/// ワークシートのプル型デコーダー
///
/// `next_row`を呼ぶたびに次の`<row>`要素を1つだけ読み進めます。
pub(crate) struct WorksheetDecoder<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    tables: CellTables,
    /// これまでに現れた`<row>`要素の数（空行を含む）
    rows_seen: usize,
    in_sheet_data: bool,
    seen_sheet_data: bool,
    finished: bool,
}

impl<R: BufRead> WorksheetDecoder<R> {
    pub fn new(source: R, tables: CellTables) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            tables,
            rows_seen: 0,
            in_sheet_data: false,
            seen_sheet_data: false,
            finished: false,
        }
    }

    /// 次の行を読み取る
    ///
    /// # 引数
    ///
    /// * `cache` - 列書式キャッシュ（読み込み1回分）
    /// * `header_offset` - この行番号（1始まり）以下の行からはキャッシュを作らない
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(cells))` - 行のセル（途中の欠落は`Null`で埋め済み、末尾は埋めない）
    /// * `Ok(None)` - シートの終端
    /// * `Err(Format)` - `<sheetData>`に到達する前にXMLが壊れていた場合
    ///
    /// `<sheetData>`以降でXMLが壊れていた場合は警告を出力し、読み取れた分の行を返して終了します。
    pub fn next_row(
        &mut self,
        cache: &mut ColumnFormatCache,
        header_offset: usize,
    ) -> Result<Option<Vec<Cell>>, XlsxNativeError> {
        if self.finished {
            return Ok(None);
        }

        let mut row: Option<Vec<Cell>> = None;
        let mut cell: Option<PendingCell> = None;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    if !self.seen_sheet_data {
                        return Err(XlsxNativeError::Format(format!(
                            "Worksheet XML is unreadable: {}",
                            e
                        )));
                    }
                    log::warn!(
                        "malformed worksheet XML after row {}, stopping: {}",
                        self.rows_seen,
                        e
                    );
                    return Ok(row.filter(|cells| !cells.is_empty()));
                }
            };

            match event {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"sheetData" => {
                        self.in_sheet_data = true;
                        self.seen_sheet_data = true;
                    }
                    b"row" if self.in_sheet_data => {
                        self.rows_seen += 1;
                        row = Some(Vec::new());
                    }
                    b"c" if row.is_some() => cell = Some(PendingCell::from_start(&e)),
                    b"v" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.in_value = true;
                            pending.has_value = true;
                        }
                    }
                    b"is" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.in_inline = true;
                            pending.has_value = true;
                        }
                    }
                    b"t" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.in_text = pending.in_inline && pending.phonetic_depth == 0;
                        }
                    }
                    b"rPh" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.phonetic_depth += 1;
                        }
                    }
                    _ => {}
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"sheetData" => {
                        self.finished = true;
                        return Ok(None);
                    }
                    b"row" if self.in_sheet_data => {
                        self.rows_seen += 1;
                        return Ok(Some(Vec::new()));
                    }
                    b"c" => {
                        if let Some(cells) = row.as_mut() {
                            let pending = PendingCell::from_start(&e);
                            push_cell(
                                cells,
                                pending,
                                &self.tables,
                                cache,
                                self.rows_seen > header_offset,
                            );
                        }
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    if let Some(pending) = cell.as_mut() {
                        if pending.in_value || pending.in_text {
                            match e.unescape() {
                                Ok(text) => pending.push_text(&text),
                                Err(_) => pending.push_text(&String::from_utf8_lossy(&e)),
                            }
                        }
                    }
                }
                Event::CData(e) => {
                    if let Some(pending) = cell.as_mut() {
                        pending.push_text(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"v" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.in_value = false;
                        }
                    }
                    b"t" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.in_text = false;
                        }
                    }
                    b"is" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.in_inline = false;
                        }
                    }
                    b"rPh" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.phonetic_depth = pending.phonetic_depth.saturating_sub(1);
                        }
                    }
                    b"c" => {
                        if let (Some(pending), Some(cells)) = (cell.take(), row.as_mut()) {
                            push_cell(
                                cells,
                                pending,
                                &self.tables,
                                cache,
                                self.rows_seen > header_offset,
                            );
                        }
                    }
                    b"row" => {
                        if let Some(cells) = row.take() {
                            log::trace!("decoded row {} with {} cells", self.rows_seen, cells.len());
                            return Ok(Some(cells));
                        }
                    }
                    b"sheetData" => {
                        self.finished = true;
                        return Ok(None);
                    }
                    _ => {}
                },
                Event::Eof => {
                    self.finished = true;
                    if !self.seen_sheet_data {
                        log::warn!("worksheet has no sheetData element");
                    }
                    return Ok(row.filter(|cells| !cells.is_empty()));
                }
                _ => {}
            }
        }
    }
}

/// セルを行に追加（欠落した列は`Null`で埋める）
fn push_cell(
    cells: &mut Vec<Cell>,
    pending: PendingCell,
    tables: &CellTables,
    cache: &mut ColumnFormatCache,
    cacheable_row: bool,
) {
    let cursor = cells.len();
    let column = match pending.column() {
        Some(column) if column >= cursor => column,
        Some(_) => {
            log::warn!(
                "cell {} is out of order, placing it at column {}",
                pending.reference.as_deref().unwrap_or("?"),
                cursor
            );
            cursor
        }
        None => {
            if pending.reference.is_some() {
                log::warn!(
                    "unresolvable cell reference {:?}, placing it at column {}",
                    pending.reference,
                    cursor
                );
            }
            cursor
        }
    };

    cells.resize(column, Cell::Null);
    cells.push(decode_cell(pending, column, tables, cache, cacheable_row));
}

/// セルの値を宣言された型と書式から復元
fn decode_cell(
    pending: PendingCell,
    column: usize,
    tables: &CellTables,
    cache: &mut ColumnFormatCache,
    cacheable_row: bool,
) -> Cell {
    if !pending.has_value {
        return Cell::Null;
    }

    match pending.cell_type.as_str() {
        "s" => match pending.value.trim().parse::<usize>() {
            Ok(index) => Cell::Text(tables.shared_strings.get(index).to_string()),
            Err(_) => {
                log::warn!("invalid shared string index {:?}", pending.value);
                Cell::Text(pending.value)
            }
        },
        "inlineStr" => {
            if pending.inline.is_empty() && !pending.value.is_empty() {
                Cell::Text(pending.value)
            } else {
                Cell::Text(pending.inline)
            }
        }
        "str" | "e" => Cell::Text(pending.value),
        "b" => match pending.value.trim() {
            "1" => Cell::Text("TRUE".to_string()),
            "0" => Cell::Text("FALSE".to_string()),
            _ => Cell::Text(pending.value),
        },
        "d" => decode_iso_date(pending.value),
        "n" => {
            if pending.value.is_empty() {
                return Cell::Null;
            }
            if pending.value.trim().parse::<f64>().is_err() {
                return Cell::Text(pending.value);
            }
            let kind = resolve_number_format(&pending, column, tables, cache, cacheable_row);
            tables.codec.decode(&pending.value, kind)
        }
        // 型の指定がないセルは文字列として扱い、書式は解決しない
        "" if pending.value.is_empty() => Cell::Null,
        "" => Cell::Text(pending.value),
        other => {
            log::trace!("unknown cell type {:?}, keeping raw value", other);
            Cell::Text(pending.value)
        }
    }
}

/// 数値セルの書式を解決
///
/// 1. 自身の`s`属性から解決できればそれを使い、条件を満たせば列キャッシュに記憶
/// 2. 解決できなければ列キャッシュ
/// 3. `s`属性自体がなければ、列キャッシュ、次にスタイル0
/// 4. いずれもなければ通常の数値
fn resolve_number_format(
    pending: &PendingCell,
    column: usize,
    tables: &CellTables,
    cache: &mut ColumnFormatCache,
    cacheable_row: bool,
) -> NumberFormatKind {
    if let Some(kind) = pending.style.and_then(|s| tables.styles.resolve(s)) {
        if cacheable_row {
            cache.remember(column, kind);
        }
        return kind;
    }

    if let Some(kind) = cache.get(column) {
        return kind;
    }

    if !pending.has_style_attr {
        if let Some(kind) = tables.styles.resolve(0) {
            return kind;
        }
    }

    NumberFormatKind::Plain
}

/// `t="d"`（ISO 8601形式）のセルを復元
fn decode_iso_date(raw: String) -> Cell {
    let value = raw.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, format) {
            return if timestamp.num_seconds_from_midnight() == 0 {
                Cell::Date(timestamp.format("%Y-%m-%d").to_string())
            } else {
                Cell::DateTime(timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
            };
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Cell::Date(date.format("%Y-%m-%d").to_string());
    }

    Cell::Text(raw)
}
