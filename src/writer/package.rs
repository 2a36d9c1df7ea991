//! Package Assembler
//!
//! 最小構成のパッケージに必要な固定パート（リレーションシップ、コンテンツタイプ、
//! 文書プロパティ、スタイル、ワークブック）を生成し、ワークシートと合わせて
//! アーカイブへ書き込むモジュール。

use chrono::{DateTime, Utc};
use std::io::Read;

use crate::builder::WriteOptions;
use crate::container::PartSink;
use crate::error::XlsxNativeError;
use crate::types::CellRange;
use crate::writer::worksheet::escape_attr;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const ROOT_RELS_PART: &str = "_rels/.rels";
pub(crate) const APP_PART: &str = "docProps/app.xml";
pub(crate) const CORE_PART: &str = "docProps/core.xml";
pub(crate) const STYLES_PART: &str = "xl/styles.xml";
pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const WORKSHEET_PART: &str = "xl/worksheets/sheet1.xml";

const APP_NAME: &str = "xlsxnative";
const SHEET_NAME: &str = "Sheet1";
const DEFAULT_LANGUAGE: &str = "en-US";

/// 固定パートとワークシートをアーカイブへ書き込む
///
/// ワークシートは最後に書き込みます。
pub(crate) fn assemble<S: PartSink>(
    sink: &mut S,
    options: &WriteOptions,
    autofilter: Option<CellRange>,
    created: DateTime<Utc>,
    worksheet: &mut dyn Read,
) -> Result<(), XlsxNativeError> {
    let parts = [
        (CONTENT_TYPES_PART, content_types_xml()),
        (ROOT_RELS_PART, root_rels_xml()),
        (APP_PART, app_xml(options)),
        (CORE_PART, core_xml(options, created)),
        (STYLES_PART, styles_xml()),
        (WORKBOOK_PART, workbook_xml(autofilter)),
        (WORKBOOK_RELS_PART, workbook_rels_xml()),
    ];

    for (name, xml) in parts.iter() {
        sink.write_part(name, &mut xml.as_bytes())?;
    }
    sink.write_part(WORKSHEET_PART, worksheet)?;

    log::debug!("assembled package with {} parts", parts.len() + 1);
    Ok(())
}

fn content_types_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
</Types>"#,
        ROOT_RELS_PART,
        WORKBOOK_RELS_PART,
        WORKSHEET_PART,
        WORKBOOK_PART,
        STYLES_PART,
        APP_PART,
        CORE_PART
    )
}

fn root_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{}"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="{}"/>
    <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="{}"/>
</Relationships>"#,
        WORKBOOK_PART, CORE_PART, APP_PART
    )
}

fn app_xml(options: &WriteOptions) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"
    xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
    <Application>{}</Application>
    <TotalTime>0</TotalTime>
    <Company>{}</Company>
</Properties>"#,
        APP_NAME,
        metadata(&options.company)
    )
}

fn core_xml(options: &WriteOptions, created: DateTime<Utc>) -> String {
    let language = match options.language.as_deref() {
        Some(language) if !language.is_empty() => escape_attr(language),
        _ => DEFAULT_LANGUAGE.to_string(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:dcmitype="http://purl.org/dc/dcmitype/"
    xmlns:dcterms="http://purl.org/dc/terms/"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created>
    <dc:title>{title}</dc:title>
    <dc:subject>{subject}</dc:subject>
    <dc:creator>{creator}</dc:creator>
    <cp:keywords>{keywords}</cp:keywords>
    <dc:description>{description}</dc:description>
    <cp:category>{category}</cp:category>
    <dc:language>{language}</dc:language>
    <cp:revision>0</cp:revision>
</cp:coreProperties>"#,
        created = created.format("%Y-%m-%dT%H:%M:%SZ"),
        title = metadata(&options.title),
        subject = metadata(&options.subject),
        creator = metadata(&options.creator),
        keywords = metadata(&options.keywords),
        description = metadata(&options.description),
        category = metadata(&options.category),
        language = language,
    )
}

fn styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1">
    <numFmt numFmtId="164" formatCode="GENERAL"/>
</numFmts>
<fonts count="1">
    <font><name val="Arial"/><family val="2"/><sz val="10"/></font>
</fonts>
<fills count="2">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
</fills>
<borders count="1">
    <border><left/><right/><top/><bottom/><diagonal/></border>
</borders>
<cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="1">
    <xf applyAlignment="false" applyBorder="false" applyFont="true" applyProtection="false" borderId="0" fillId="0" fontId="0" numFmtId="164" xfId="0">
        <alignment horizontal="general" vertical="bottom" textRotation="0" wrapText="false" indent="0" shrinkToFit="false"/>
        <protection locked="true" hidden="false"/>
    </xf>
</cellXfs>
<cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
</cellStyles>
</styleSheet>"#
        .to_string()
}

fn workbook_xml(autofilter: Option<CellRange>) -> String {
    // オートフィルターにはシートローカルの定義名が必要
    let defined_names = match autofilter {
        Some(range) => format!(
            "\n    <definedNames>\n        <definedName name=\"_xlnm._FilterDatabase\" localSheetId=\"0\" hidden=\"1\">{}!{}</definedName>\n    </definedNames>",
            SHEET_NAME,
            range.to_absolute()
        ),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
    xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <fileVersion appName="{}"/>
    <sheets>
        <sheet name="{}" sheetId="1" state="visible" r:id="rId2"/>
    </sheets>{}
</workbook>"#,
        APP_NAME, SHEET_NAME, defined_names
    )
}

fn workbook_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#
        .to_string()
}

fn metadata(value: &Option<String>) -> String {
    value.as_deref().map(escape_attr).unwrap_or_default()
}
