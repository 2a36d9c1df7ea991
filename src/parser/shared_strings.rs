//! Shared String Table
//!
//! `xl/sharedStrings.xml`を解析し、インデックスで参照される文字列表を構築するモジュール。

use quick_xml::events::Event;
use quick_xml::Reader;

/// 共有文字列テーブル
///
/// `<si>`要素1つが1エントリに対応し、文書順の位置がインデックスになります。
/// リッチテキストの場合はすべての`<t>`ランを連結した文字列を保持し、
/// ふりがな（`<rPh>`）は無視します。
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    strings: Vec<String>,
}

impl SharedStringTable {
    /// `xl/sharedStrings.xml`の内容から共有文字列テーブルを構築
    ///
    /// パートが存在しない場合は空のテーブルを返します（エラーではありません）。
    /// XMLが壊れている場合は警告を出力し、それまでに読み取れたエントリを保持します。
    pub fn load(xml: Option<&[u8]>) -> Self {
        let Some(xml) = xml else {
            log::debug!("shared strings part is absent");
            return Self::default();
        };

        let mut strings = Vec::new();
        if let Err(e) = parse_shared_strings(xml, &mut strings) {
            log::warn!(
                "malformed shared strings part, keeping {} entries parsed so far: {}",
                strings.len(),
                e
            );
        }
        log::debug!("loaded {} shared strings", strings.len());

        Self { strings }
    }

    /// インデックスから文字列を取得
    ///
    /// 範囲外のインデックスは空文字列を返します。
    pub fn get(&self, index: usize) -> &str {
        self.strings.get(index).map(String::as_str).unwrap_or("")
    }

    /// エントリ数
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// エントリが1つもないかどうか
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn parse_shared_strings(xml: &[u8], strings: &mut Vec<String>) -> Result<(), quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    // <rPh>（ふりがな）の入れ子の深さ
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if current.is_some() && phonetic_depth == 0 => in_t = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Event::Text(e) if in_t => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) if in_t => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(text) = current.take() {
                        strings.push(text);
                    }
                    in_t = false;
                }
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}
