//! Workbook Parser
//!
//! `xl/workbook.xml`とそのリレーションシップから、最初のワークシートの
//! パート名と日付システムを取得するモジュール。

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::formatter::DateSystem;

/// 既定のワークシートパート名
pub(crate) const DEFAULT_WORKSHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// ワークブックレベルの情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkbookInfo {
    /// 最初のワークシートのパート名（例: `xl/worksheets/sheet1.xml`）
    pub worksheet_path: String,
    /// 日付システム
    pub date_system: DateSystem,
}

impl Default for WorkbookInfo {
    fn default() -> Self {
        Self {
            worksheet_path: DEFAULT_WORKSHEET_PATH.to_string(),
            date_system: DateSystem::V1900,
        }
    }
}

impl WorkbookInfo {
    /// ワークブックパートとリレーションシップパートから情報を取得
    ///
    /// どちらかが存在しない、または解決できない場合は
    /// `xl/worksheets/sheet1.xml`にフォールバックします。
    pub fn load(workbook_xml: Option<&[u8]>, rels_xml: Option<&[u8]>) -> Self {
        let mut info = Self::default();

        let Some(workbook_xml) = workbook_xml else {
            log::debug!("workbook part is absent, using {}", DEFAULT_WORKSHEET_PATH);
            return info;
        };

        let (first_sheet_rid, date1904) = match parse_workbook(workbook_xml) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("malformed workbook part, using defaults: {}", e);
                return info;
            }
        };
        if date1904 {
            info.date_system = DateSystem::V1904;
        }

        let target = match (first_sheet_rid, rels_xml) {
            (Some(rid), Some(rels)) => match find_relationship_target(rels, &rid) {
                Ok(target) => target,
                Err(e) => {
                    log::warn!("malformed workbook relationships part: {}", e);
                    None
                }
            },
            _ => None,
        };

        match target {
            Some(target) => info.worksheet_path = resolve_target(&target),
            None => log::debug!(
                "first sheet relationship not resolved, using {}",
                DEFAULT_WORKSHEET_PATH
            ),
        }

        info
    }
}

/// 最初の`<sheet>`の`r:id`と`date1904`フラグを取得
fn parse_workbook(xml: &[u8]) -> Result<(Option<String>, bool), quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut first_sheet_rid = None;
    let mut date1904 = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.local_name().as_ref() == b"date1904" {
                            let value = attr.unescape_value()?;
                            date1904 = &*value == "1" || value.eq_ignore_ascii_case("true");
                        }
                    }
                }
                b"sheet" if first_sheet_rid.is_none() => {
                    for attr in e.attributes() {
                        let attr = attr?;
                        // r:id（名前空間接頭辞付き）
                        if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                            first_sheet_rid = Some(attr.unescape_value()?.into_owned());
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((first_sheet_rid, date1904))
}

/// リレーションシップIDからターゲットを取得
fn find_relationship_target(xml: &[u8], rid: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(attr.unescape_value()?.into_owned()),
                        b"Target" => target = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rid) {
                    return Ok(target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

/// `xl/`基準の相対ターゲット、またはパッケージルート基準の絶対ターゲットをパート名に変換
fn resolve_target(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
