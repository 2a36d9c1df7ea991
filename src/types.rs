//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Excelの最大行数
pub(crate) const MAX_ROWS: u32 = 1_048_576;

/// Excelの最大列数（XFD）
pub(crate) const MAX_COLS: u32 = 16_384;

/// 読み込み結果のセル値
///
/// 型は保存されるものではなく、読み込みのたびに
/// （生のXML値、宣言された型属性、解決された書式）から導出されます。
/// 数値は精度を失わないよう、XML上の10進文字列のまま保持します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// 空セル（XMLに存在しないセル、または値を持たないセル）
    Null,

    /// 文字列
    Text(String),

    /// 数値（10進文字列）
    Number(String),

    /// 日付（`YYYY-MM-DD`）
    Date(String),

    /// 日時（`YYYY-MM-DD HH:MM:SS`）
    DateTime(String),

    /// 時刻（`HH:MM:SS`）
    Time(String),

    /// 経過時間（`[h]:mm:ss`書式、時間は24を超え得る）
    Duration(String),
}

impl Cell {
    /// 値が空かどうかを判定
    ///
    /// `Null`と空文字列の`Text`を空とみなします。
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 値を文字列として取得（`Null`の場合は`None`）
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Null => None,
            Cell::Text(s)
            | Cell::Number(s)
            | Cell::Date(s)
            | Cell::DateTime(s)
            | Cell::Time(s)
            | Cell::Duration(s) => Some(s),
        }
    }

    /// 値を所有文字列として取得（`Null`は空文字列）
    pub fn into_string(self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s)
            | Cell::Number(s)
            | Cell::Date(s)
            | Cell::DateTime(s)
            | Cell::Time(s)
            | Cell::Duration(s) => s,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or(""))
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&String> for Cell {
    fn from(value: &String) -> Self {
        Cell::Text(value.clone())
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Number(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value.to_string())
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(value.to_string())
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Number(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value.to_string())
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// 連想モードの1行（ヘッダー名 → セル値）
///
/// 挿入順（列順）を保持します。同名のヘッダーは後の列の値で上書きされ、
/// 位置は最初に現れた列のまま維持されます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Cell)>,
}

impl Record {
    /// 空のレコードを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// フィールドを追加（同名の既存フィールドは値を置き換える）
    pub fn insert(&mut self, name: impl Into<String>, value: Cell) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// 重複のない(ヘッダー名, 値)の列からレコードを組み立てる
    pub(crate) fn from_fields(fields: Vec<(String, Cell)>) -> Self {
        Self { fields }
    }

    /// ヘッダー名で値を取得
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// フィールド数
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// フィールドが存在しないかどうか
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// ヘッダー名を列順に返す
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// (ヘッダー名, 値) を列順に返す
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// 値のみを列順に取り出す
    pub fn into_values(self) -> Vec<Cell> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// 読み込みで得られる1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// 位置（A, B, C, ...）に揃えたセル列
    Cells(Vec<Cell>),

    /// 連想モード: 先頭行をヘッダー名として使用したレコード
    Record(Record),
}

impl Row {
    /// 位置指定モードの行であればセル列を返す
    pub fn cells(&self) -> Option<&[Cell]> {
        match self {
            Row::Cells(cells) => Some(cells),
            Row::Record(_) => None,
        }
    }

    /// 連想モードの行であればレコードを返す
    pub fn record(&self) -> Option<&Record> {
        match self {
            Row::Cells(_) => None,
            Row::Record(record) => Some(record),
        }
    }

    /// セル値を列順に取り出す（レコードの場合はヘッダー名を捨てる）
    pub fn into_cells(self) -> Vec<Cell> {
        match self {
            Row::Cells(cells) => cells,
            Row::Record(record) => record.into_values(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Row::Cells(cells) => cells.serialize(serializer),
            Row::Record(record) => record.serialize(serializer),
        }
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}{}", col_index_to_letter(self.col), self.row + 1)
    }

    /// A1形式の文字列を座標に変換（例: "AC14" -> (13, 28)）
    ///
    /// `$`による絶対参照記号は無視します。
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim().replace('$', "");
        let split = reference
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(reference.len());
        let (letters, digits) = reference.split_at(split);

        let col = col_letter_to_index(letters)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 || row > MAX_ROWS {
            return None;
        }

        Some(Self::new(row - 1, col))
    }

    /// 絶対参照形式の文字列に変換（例: (0, 0) -> "$A$1"）
    pub fn to_absolute(self) -> String {
        format!("${}${}", col_index_to_letter(self.col), self.row + 1)
    }
}

/// セル範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// 新しい範囲を生成
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    /// `A1:C10`形式の文字列を範囲に変換
    ///
    /// 単一セル（`A1`）は1セルの範囲とみなします。開始が終了より後ろにある場合は`None`。
    pub fn parse(reference: &str) -> Option<Self> {
        let (start, end) = match reference.split_once(':') {
            Some((start, end)) => (CellCoord::parse(start)?, CellCoord::parse(end)?),
            None => {
                let coord = CellCoord::parse(reference)?;
                (coord, coord)
            }
        };
        if start.row > end.row || start.col > end.col {
            return None;
        }
        Some(Self::new(start, end))
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}:{}", self.start.to_a1_notation(), self.end.to_a1_notation())
    }

    /// 絶対参照形式（`$A$1:$C$10`）
    pub fn to_absolute(&self) -> String {
        format!("{}:{}", self.start.to_absolute(), self.end.to_absolute())
    }
}

/// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
pub(crate) fn col_index_to_letter(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// 列文字を列インデックスに変換（"A" -> 0, "AC" -> 28）
///
/// 空文字列、英字以外、または最大列数（XFD）を超える場合は`None`。
pub(crate) fn col_letter_to_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut col = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    if col > MAX_COLS {
        return None;
    }
    Some(col - 1)
}
