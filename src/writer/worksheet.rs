//! Worksheet Writer
//!
//! 行を1つずつ受け取り、ワークシートXMLを一時領域（小さければメモリ、
//! 大きければ一時ファイル）へ書き出すモジュール。データ全体をメモリに保持しません。

use std::io::{BufWriter, Seek, SeekFrom, Write};
use tempfile::SpooledTempFile;

use crate::error::XlsxNativeError;
use crate::types::{Cell, CellCoord, CellRange, MAX_COLS, MAX_ROWS};

/// ワークシートをメモリに保持する上限（これを超えると一時ファイルへ書き出す）
const SPOOL_THRESHOLD: usize = 2 * 1024 * 1024;

/// シートの表示・フィルター設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SheetLayout {
    /// ウィンドウ枠の固定位置（このセルの左上で固定）
    pub freeze_pane: Option<CellCoord>,
    /// オートフィルターの範囲
    pub autofilter: Option<CellRange>,
}

/// ワークシートXMLのストリーミングライター
pub(crate) struct WorksheetWriter {
    out: BufWriter<SpooledTempFile>,
    layout: SheetLayout,
    rows_written: u32,
    /// 1行分のセルXML（行ごとに再利用）
    line: String,
}

impl WorksheetWriter {
    /// XMLヘッダーを書き込んだ状態のライターを生成
    pub fn new(layout: SheetLayout) -> Result<Self, XlsxNativeError> {
        let mut writer = Self {
            out: BufWriter::new(SpooledTempFile::new(SPOOL_THRESHOLD)),
            layout,
            rows_written: 0,
            line: String::new(),
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_header(&mut self) -> Result<(), XlsxNativeError> {
        // 事前に範囲が分からないため、最大のグリッドを宣言する
        let max_cell = CellCoord::new(MAX_ROWS - 1, MAX_COLS - 1).to_a1_notation();

        write!(
            self.out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\n\
             <dimension ref=\"A1:{}\"/>\n",
            max_cell
        )?;
        if let Some(views) = self.layout.freeze_pane.and_then(sheet_views_xml) {
            writeln!(self.out, "{}", views)?;
        }
        write!(
            self.out,
            "<cols>\n\
             <col collapsed=\"false\" hidden=\"false\" max=\"1024\" min=\"1\" style=\"0\" customWidth=\"false\" width=\"11.5\"/>\n\
             </cols>\n\
             <sheetData>\n"
        )?;
        Ok(())
    }

    /// 1行を書き込む
    ///
    /// 行数が1,048,576行、列数が16,384列を超える場合は`Validation`エラー。
    pub fn write_row<I>(&mut self, row: I) -> Result<(), XlsxNativeError>
    where
        I: IntoIterator,
        I::Item: Into<Cell>,
    {
        if self.rows_written >= MAX_ROWS {
            return Err(XlsxNativeError::Validation(format!(
                "Too many rows: a worksheet holds at most {} rows",
                MAX_ROWS
            )));
        }

        self.line.clear();
        for (col, value) in row.into_iter().enumerate() {
            if col >= MAX_COLS as usize {
                return Err(XlsxNativeError::Validation(format!(
                    "Too many columns in row {}: a worksheet holds at most {} columns",
                    self.rows_written + 1,
                    MAX_COLS
                )));
            }
            let reference = CellCoord::new(self.rows_written, col as u32).to_a1_notation();
            write_cell(&mut self.line, &reference, value.into());
            self.line.push_str("\r\n");
        }

        self.rows_written += 1;
        write!(
            self.out,
            "<row r=\"{}\">{}</row>\r\n",
            self.rows_written, self.line
        )?;
        Ok(())
    }

    /// 書き込んだ行数
    pub fn rows_written(&self) -> u32 {
        self.rows_written
    }

    /// フッターを書き込み、先頭にシークしたワークシートを返す
    pub fn finish(mut self) -> Result<SpooledTempFile, XlsxNativeError> {
        self.out.write_all(b"</sheetData>\n")?;
        if let Some(range) = self.layout.autofilter {
            writeln!(self.out, "<autoFilter ref=\"{}\"/>", range.to_a1_notation())?;
        }
        self.out.write_all(b"</worksheet>")?;

        let mut spool = self.out.into_inner().map_err(|e| e.into_error())?;
        spool.seek(SeekFrom::Start(0))?;
        Ok(spool)
    }
}

/// 1セル分のXMLを`out`に追加
///
/// - `Null`と空文字列: 値なしの`<c r="A1"/>`
/// - 数値リテラル（`Number`、または数値として読める`Text`）: `t="n"`で文字列をそのまま出力
/// - それ以外: インライン文字列
fn write_cell(out: &mut String, reference: &str, cell: Cell) {
    let numeric = match &cell {
        Cell::Number(value) | Cell::Text(value) => is_numeric_literal(value),
        _ => false,
    };
    let value = cell.into_string();

    if value.is_empty() {
        out.push_str("<c r=\"");
        out.push_str(reference);
        out.push_str("\"/>");
    } else if numeric {
        out.push_str("<c r=\"");
        out.push_str(reference);
        out.push_str("\" t=\"n\"><v>");
        out.push_str(&value);
        out.push_str("</v></c>");
    } else {
        out.push_str("<c r=\"");
        out.push_str(reference);
        out.push_str("\" t=\"inlineStr\"><is>");
        if needs_space_preserve(&value) {
            out.push_str("<t xml:space=\"preserve\">");
        } else {
            out.push_str("<t>");
        }
        escape_text(&value, out);
        out.push_str("</t></is></c>");
    }
}

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?`に一致するかを判定
///
/// 先頭ゼロ付きの値（郵便番号など）や指数表記は文字列として扱います。
pub(crate) fn is_numeric_literal(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let integer_ok = integer == "0"
        || (!integer.is_empty()
            && !integer.starts_with('0')
            && integer.bytes().all(|b| b.is_ascii_digit()));
    let fraction_ok =
        fraction.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));

    integer_ok && fraction_ok
}

/// テキストノード用のエスケープ
///
/// `&`、`<`、`>`をエスケープし、`\r`は文字参照で保持します。
/// XML 1.0で使用できない制御文字（NUL、ETX、VTなど）は取り除きます。
pub(crate) fn escape_text(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if is_xml_invalid(c) => {}
            c => out.push(c),
        }
    }
}

/// 属性値・メタデータ用のエスケープ（引用符も対象）
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\t' => out.push_str("&#9;"),
            c => escape_text(c.encode_utf8(&mut [0; 4]), &mut out),
        }
    }
    out
}

fn is_xml_invalid(c: char) -> bool {
    (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{FFFE}' || c == '\u{FFFF}'
}

fn needs_space_preserve(value: &str) -> bool {
    value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['\n', '\r', '\t'])
}

/// ウィンドウ枠の固定（`A1`は固定なしとして`None`）
fn sheet_views_xml(cell: CellCoord) -> Option<String> {
    let active_pane = match (cell.col > 0, cell.row > 0) {
        (true, true) => "bottomRight",
        (false, true) => "bottomLeft",
        (true, false) => "topRight",
        (false, false) => return None,
    };

    let mut splits = String::new();
    if cell.col > 0 {
        splits.push_str(&format!(" xSplit=\"{}\"", cell.col));
    }
    if cell.row > 0 {
        splits.push_str(&format!(" ySplit=\"{}\"", cell.row));
    }

    Some(format!(
        "<sheetViews><sheetView workbookViewId=\"0\"><pane{} topLeftCell=\"{}\" activePane=\"{}\" state=\"frozen\"/><selection pane=\"{}\"/></sheetView></sheetViews>",
        splits,
        cell.to_a1_notation(),
        active_pane,
        active_pane
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn render(layout: SheetLayout, rows: Vec<Vec<Cell>>) -> String {
        let mut writer = WorksheetWriter::new(layout).unwrap();
        for row in rows {
            writer.write_row(row).unwrap();
        }
        let mut spool = writer.finish().unwrap();
        let mut xml = String::new();
        spool.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_numeric_literal() {
        for value in ["0", "-0", "42", "-17", "3.14", "-0.5", "1234567890123456789"] {
            assert!(is_numeric_literal(value), "{}", value);
        }
        for value in ["", "-", "007", "1.", ".5", "1e5", "1,5", "abc", " 1", "--1", "0x1F"] {
            assert!(!is_numeric_literal(value), "{}", value);
        }
    }

    #[test]
    fn test_escape_text() {
        let mut out = String::new();
        escape_text("a<b>&c\0d\u{3}e\u{b}f\rg", &mut out);
        assert_eq!(out, "a&lt;b&gt;&amp;cdef&#13;g");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"say "hi" & 'bye'"#), "say &quot;hi&quot; &amp; &apos;bye&apos;");
    }

    #[test]
    fn test_cells_are_typed() {
        let xml = render(
            SheetLayout::default(),
            vec![vec![
                Cell::from("fname"),
                Cell::from(42i64),
                Cell::from("3.5"),
                Cell::Null,
                Cell::from(""),
                Cell::from("007"),
                Cell::Date("2025-01-01".to_string()),
            ]],
        );

        assert!(xml.contains(r#"<c r="A1" t="inlineStr"><is><t>fname</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B1" t="n"><v>42</v></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="n"><v>3.5</v></c>"#));
        assert!(xml.contains(r#"<c r="D1"/>"#));
        assert!(xml.contains(r#"<c r="E1"/>"#));
        assert!(xml.contains(r#"<c r="F1" t="inlineStr"><is><t>007</t></is></c>"#));
        assert!(xml.contains(r#"<c r="G1" t="inlineStr"><is><t>2025-01-01</t></is></c>"#));
    }

    #[test]
    fn test_rows_and_dimension() {
        let xml = render(
            SheetLayout::default(),
            vec![vec![Cell::from("a")], vec![Cell::from("b")]],
        );

        assert!(xml.contains(r#"<dimension ref="A1:XFD1048576"/>"#));
        assert!(xml.contains("<row r=\"1\"><c r=\"A1\""));
        assert!(xml.contains("<row r=\"2\"><c r=\"A2\""));
        assert!(xml.contains("</c>\r\n</row>\r\n"));
        assert!(!xml.contains("sheetViews"));
        assert!(!xml.contains("autoFilter"));
        assert!(xml.ends_with("</sheetData>\n</worksheet>"));
    }

    #[test]
    fn test_whitespace_is_preserved() {
        let xml = render(
            SheetLayout::default(),
            vec![vec![Cell::from(" padded "), Cell::from("line\nbreak")]],
        );
        assert!(xml.contains(r#"<t xml:space="preserve"> padded </t>"#));
        assert!(xml.contains("<t xml:space=\"preserve\">line\nbreak</t>"));
    }

    #[test]
    fn test_freeze_pane_and_autofilter() {
        let layout = SheetLayout {
            freeze_pane: CellCoord::parse("B2"),
            autofilter: CellRange::parse("A1:C1"),
        };
        let xml = render(layout, vec![vec![Cell::from("h")]]);

        assert!(xml.contains(
            r#"<pane xSplit="1" ySplit="1" topLeftCell="B2" activePane="bottomRight" state="frozen"/>"#
        ));
        assert!(xml.contains(r#"<autoFilter ref="A1:C1"/>"#));

        let sheet_views = xml.find("<sheetViews>").unwrap();
        assert!(sheet_views < xml.find("<cols>").unwrap());
    }

    #[test]
    fn test_freeze_pane_rows_only() {
        assert_eq!(sheet_views_xml(CellCoord::new(0, 0)), None);
        let views = sheet_views_xml(CellCoord::new(1, 0)).unwrap();
        assert!(views.contains(r#"<pane ySplit="1" topLeftCell="A2" activePane="bottomLeft""#));
    }

    #[test]
    fn test_too_many_columns() {
        let mut writer = WorksheetWriter::new(SheetLayout::default()).unwrap();
        let row = vec![Cell::from("x"); MAX_COLS as usize + 1];
        assert!(matches!(
            writer.write_row(row),
            Err(XlsxNativeError::Validation(_))
        ));
        assert_eq!(writer.rows_written(), 0);
    }
}
