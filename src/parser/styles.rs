//! Style Resolver
//!
//! `xl/styles.xml`を解析し、スタイルインデックスから実効的な
//! Number Format Stringへの対応表を構築するモジュール。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// 書式の種類
///
/// 数値セルのデコード方法を決定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormatKind {
    /// 通常の数値
    Plain,
    /// 日付・時刻
    DateTime,
    /// 経過時間（`[h]:mm:ss`など）
    Duration,
}

impl NumberFormatKind {
    /// 書式文字列を分類
    pub fn classify(code: &str) -> Self {
        if !is_date_time_format(code) {
            NumberFormatKind::Plain
        } else if is_elapsed_format(code) {
            NumberFormatKind::Duration
        } else {
            NumberFormatKind::DateTime
        }
    }
}

/// スタイルテーブル
///
/// `cellXfs`の宣言順（= セルの`s`属性が参照するインデックス）に
/// 実効書式文字列を保持します。読み込み1回ごとに構築され、以後は変更されません。
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    formats: Vec<Option<ResolvedFormat>>,
}

#[derive(Debug, Clone)]
struct ResolvedFormat {
    code: String,
    kind: NumberFormatKind,
}

impl StyleTable {
    /// `xl/styles.xml`の内容からスタイルテーブルを構築
    ///
    /// パートが存在しない場合は空のテーブルを返します。
    /// XMLが壊れている場合は警告を出力し、それまでに解析できた分だけを保持します。
    pub fn load(xml: Option<&[u8]>) -> Self {
        let Some(xml) = xml else {
            log::debug!("styles part is absent, numeric cells fall back to plain numbers");
            return Self::default();
        };

        let mut custom_formats: HashMap<u32, String> = HashMap::new();
        let mut xf_format_ids: Vec<u32> = Vec::new();
        if let Err(e) = parse_styles(xml, &mut custom_formats, &mut xf_format_ids) {
            log::warn!(
                "malformed styles part, keeping {} cell formats parsed so far: {}",
                xf_format_ids.len(),
                e
            );
        }

        let formats = xf_format_ids
            .into_iter()
            .map(|id| {
                custom_formats
                    .get(&id)
                    .map(String::as_str)
                    .or_else(|| get_builtin_format(id))
                    .map(|code| ResolvedFormat {
                        code: code.to_string(),
                        kind: NumberFormatKind::classify(code),
                    })
            })
            .collect();

        Self { formats }
    }

    /// スタイルインデックスから書式文字列を取得
    ///
    /// インデックスが範囲外、または書式IDが解決できない場合は`None`。
    pub fn format_code(&self, style_index: usize) -> Option<&str> {
        self.formats
            .get(style_index)
            .and_then(|f| f.as_ref())
            .map(|f| f.code.as_str())
    }

    /// スタイルインデックスから書式の種類を取得
    pub fn resolve(&self, style_index: usize) -> Option<NumberFormatKind> {
        self.formats
            .get(style_index)
            .and_then(|f| f.as_ref())
            .map(|f| f.kind)
    }

    /// セル書式の数
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// セル書式が1つもないかどうか
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// `<numFmts>`と`<cellXfs>`を解析（プライベート）
fn parse_styles(
    xml: &[u8],
    custom_formats: &mut HashMap<u32, String>,
    xf_format_ids: &mut Vec<u32>,
) -> Result<(), quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_num_fmts = false;
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"numFmts" => in_num_fmts = true,
                b"cellXfs" => in_cell_xfs = true,
                b"numFmt" if in_num_fmts => read_num_fmt(&e, custom_formats)?,
                b"xf" if in_cell_xfs => xf_format_ids.push(read_xf(&e)?),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                // <numFmt numFmtId="164" formatCode="yyyy-mm-dd"/>
                b"numFmt" if in_num_fmts => read_num_fmt(&e, custom_formats)?,
                // <xf numFmtId="164" fontId="0" fillId="0" borderId="0"/>
                b"xf" if in_cell_xfs => xf_format_ids.push(read_xf(&e)?),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"numFmts" => in_num_fmts = false,
                b"cellXfs" => in_cell_xfs = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn read_num_fmt(
    e: &BytesStart<'_>,
    custom_formats: &mut HashMap<u32, String>,
) -> Result<(), quick_xml::Error> {
    let mut id: Option<u32> = None;
    let mut code: Option<String> = None;

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.local_name().as_ref() {
            b"numFmtId" => id = attr.unescape_value()?.trim().parse().ok(),
            b"formatCode" => code = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }

    match (id, code) {
        (Some(id), Some(code)) => {
            custom_formats.insert(id, code);
        }
        _ => log::warn!("numFmt without a usable numFmtId/formatCode pair is ignored"),
    }
    Ok(())
}

fn read_xf(e: &BytesStart<'_>) -> Result<u32, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"numFmtId" {
            return Ok(attr.unescape_value()?.trim().parse().unwrap_or(0));
        }
    }
    Ok(0)
}

/// ビルトイン書式IDから書式文字列を取得
fn get_builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("m/d/yyyy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yyyy h:mm"),
        37 => Some("#,##0_);(#,##0)"),
        38 => Some("#,##0_);[Red](#,##0)"),
        39 => Some("#,##0.00_);(#,##0.00)"),
        40 => Some("#,##0.00_);[Red](#,##0.00)"),
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

/// 書式文字列が日付・時刻を表すかどうかを判定
///
/// 以下の規則をこの順序で適用します（完全な書式解析ではなく近似です）:
///
/// 1. `General` → false
/// 2. `_`または`0 `で始まる（会計・通貨書式） → false
/// 3. `-00000`を含む（地域別のゼロ埋め書式） → false
/// 4. `[`、`]`、`.000`を取り除いた結果が`WW` → true（週番号）
/// 5. `h:m`を含む → true（時刻）
/// 6. `yy`、`dd`、`mm`のいずれかを含む → true（日付）
///
/// 5と6は大文字小文字を区別します（`MM`や`YYYY`は日付とみなしません）。
///
/// # 使用例
///
/// ```rust
/// use xlsxnative::is_date_time_format;
///
/// assert!(!is_date_time_format("General"));
/// assert!(is_date_time_format("yyyy-mm-dd"));
/// assert!(is_date_time_format("h:mm:ss"));
/// assert!(!is_date_time_format("@"));
/// ```
pub fn is_date_time_format(code: &str) -> bool {
    if code.eq_ignore_ascii_case("general") {
        return false;
    }
    if code.starts_with('_') || code.starts_with("0 ") {
        return false;
    }
    if code.contains("-00000") {
        return false;
    }

    let clean = code.replace(['[', ']'], "").replace(".000", "");
    if clean == "WW" {
        return true;
    }

    clean.contains("h:m") || clean.contains("yy") || clean.contains("dd") || clean.contains("mm")
}

/// 経過時間の書式（`[h]`、`[mm]`、`[ss]`など）かどうか
fn is_elapsed_format(code: &str) -> bool {
    let lower = code.to_ascii_lowercase();
    let mut rest = lower.as_str();
    while let Some(start) = rest.find('[') {
        let after = &rest[start + 1..];
        let Some(end) = after.find(']') else {
            break;
        };
        let tag = &after[..end];
        let elapsed = ['h', 'm', 's']
            .iter()
            .any(|unit| !tag.is_empty() && tag.chars().all(|c| c == *unit));
        if elapsed {
            return true;
        }
        rest = &after[end + 1..];
    }
    false
}
