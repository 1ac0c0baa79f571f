// In-place workbook updates at the xlsx package level
//
// An xlsx file is a zip of XML parts. Updating one sheet means:
// - regenerating that sheet's worksheet part from the table
// - copying every other part raw (compressed bytes untouched)
// - for a new sheet: registering it in workbook.xml, its relationships and
//   [Content_Types].xml, after the existing sheets
//
// The new package is written to a temporary file next to the original and
// renamed over it, so a failure at any point leaves the original intact.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use sheetpilot_engine::SourceTable;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::IoError;
use crate::sheet_xml::worksheet_xml;
use crate::styles::{date_needs, ensure_date_styles, DateStyles, STYLES_PART};
use crate::{extension, WRITABLE_EXTENSIONS};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// A sheet entry of workbook.xml resolved to its package part
#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetPart {
    name: String,
    sheet_id: u32,
    rel_id: String,
    /// Part path inside the package, e.g. `xl/worksheets/sheet1.xml`
    path: String,
}

impl SheetPart {
    fn is_worksheet(&self) -> bool {
        self.path.contains("worksheets/")
    }

    /// Relationships part belonging to this sheet
    fn rels_path(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
            None => format!("_rels/{}.rels", self.path),
        }
    }
}

/// What `write_sheet` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetWrite {
    Replaced,
    Added,
}

#[derive(Debug, Default)]
struct PackageEdits {
    replace: HashMap<String, Vec<u8>>,
    add: Vec<(String, Vec<u8>)>,
    drop: HashSet<String>,
}

/// Replace the contents of an existing sheet, keeping its name and position.
pub fn replace_sheet(path: &Path, sheet_name: &str, table: &SourceTable) -> Result<(), IoError> {
    update_sheet(path, sheet_name, table, false).map(|_| ())
}

/// Replace the named sheet if it exists, otherwise append it as the last sheet.
/// Names match case-insensitively, as in Excel; a replaced sheet keeps its
/// existing name.
pub fn write_sheet(path: &Path, sheet_name: &str, table: &SourceTable) -> Result<SheetWrite, IoError> {
    update_sheet(path, sheet_name, table, true)
}

fn update_sheet(
    path: &Path,
    sheet_name: &str,
    table: &SourceTable,
    add_missing: bool,
) -> Result<SheetWrite, IoError> {
    check_writable(path)?;

    let mut archive = open_archive(path)?;
    let part_names: HashSet<String> = archive.file_names().map(str::to_string).collect();

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
    let content_types_xml = read_part(&mut archive, CONTENT_TYPES_PART)?;
    let sheets = resolve_sheet_parts(&workbook_xml, &rels_xml)?;

    let mut edits = PackageEdits::default();
    let date_styles = match date_needs(table) {
        (false, false) => DateStyles::default(),
        (need_date, need_datetime) if part_names.contains(STYLES_PART) => {
            let styles_xml = read_part(&mut archive, STYLES_PART)?;
            let (styles, rewritten) = ensure_date_styles(&styles_xml, need_date, need_datetime)?;
            if let Some(xml) = rewritten {
                edits.replace.insert(STYLES_PART.to_string(), xml.into_bytes());
            }
            styles
        }
        _ => {
            log::warn!("{} has no styles part; dates are written as text", path.display());
            DateStyles::default()
        }
    };

    let sheet_xml = worksheet_xml(table, &date_styles)?;
    let mut rels_out = rels_xml.clone();
    let mut content_types_out = content_types_xml.clone();

    let outcome = match sheets.iter().find(|s| same_sheet_name(&s.name, sheet_name)) {
        Some(part) => {
            if !part.is_worksheet() {
                return Err(IoError::Package(format!(
                    "sheet '{}' is not a worksheet ({})",
                    sheet_name, part.path
                )));
            }
            edits.replace.insert(part.path.clone(), sheet_xml);
            // The regenerated sheet references no drawings, comments or tables.
            edits.drop.insert(part.rels_path());
            SheetWrite::Replaced
        }
        None if add_missing => {
            let added = plan_new_sheet(&sheets, &part_names, &rels_xml, sheet_name)?;

            let workbook_out = insert_before_close(&workbook_xml, b"sheets", |prefix| {
                format!(
                    r#"<{}sheet name="{}" sheetId="{}" r:id="{}"/>"#,
                    prefix,
                    quick_xml::escape::escape(sheet_name),
                    added.sheet_id,
                    added.rel_id
                )
            })?;
            rels_out = insert_before_close(&rels_out, b"Relationships", |prefix| {
                format!(
                    r#"<{}Relationship Id="{}" Type="{}" Target="{}"/>"#,
                    prefix,
                    added.rel_id,
                    WORKSHEET_REL_TYPE,
                    added.path.trim_start_matches("xl/")
                )
            })?;
            content_types_out = insert_before_close(&content_types_out, b"Types", |prefix| {
                format!(
                    r#"<{}Override PartName="/{}" ContentType="{}"/>"#,
                    prefix, added.path, WORKSHEET_CONTENT_TYPE
                )
            })?;

            edits.replace.insert(WORKBOOK_PART.to_string(), workbook_out.into_bytes());
            edits.add.push((added.path, sheet_xml));
            SheetWrite::Added
        }
        None => {
            return Err(IoError::SheetNotFound {
                requested: sheet_name.to_string(),
                available: sheets.iter().map(|s| s.name.clone()).collect(),
            });
        }
    };

    // The calculation chain lists formula cells by sheet; a regenerated sheet
    // invalidates it. Excel rebuilds it on load.
    if part_names.contains(CALC_CHAIN_PART) {
        edits.drop.insert(CALC_CHAIN_PART.to_string());
        rels_out = remove_elements(&rels_out, b"Relationship", |e| {
            attr(e, b"Target").is_some_and(|t| t.ends_with("calcChain.xml"))
        })?;
        content_types_out = remove_elements(&content_types_out, b"Override", |e| {
            attr(e, b"PartName").is_some_and(|p| p == format!("/{}", CALC_CHAIN_PART))
        })?;
    }

    if rels_out != rels_xml {
        edits.replace.insert(WORKBOOK_RELS_PART.to_string(), rels_out.into_bytes());
    }
    if content_types_out != content_types_xml {
        edits.replace.insert(CONTENT_TYPES_PART.to_string(), content_types_out.into_bytes());
    }

    rewrite_package(path, archive, &edits)?;
    log::info!(
        "{} sheet '{}' in {}",
        if outcome == SheetWrite::Added { "added" } else { "replaced" },
        sheet_name,
        path.display()
    );
    Ok(outcome)
}

/// Identifiers for a sheet about to be added
#[derive(Debug)]
struct NewSheet {
    sheet_id: u32,
    rel_id: String,
    path: String,
}

fn plan_new_sheet(
    sheets: &[SheetPart],
    part_names: &HashSet<String>,
    rels_xml: &str,
    sheet_name: &str,
) -> Result<NewSheet, IoError> {
    validate_sheet_name(sheet_name)?;
    if let Some(existing) = sheets.iter().find(|s| same_sheet_name(&s.name, sheet_name)) {
        return Err(IoError::Package(format!(
            "sheet name '{}' clashes with existing sheet '{}'",
            sheet_name, existing.name
        )));
    }

    let sheet_id = sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;

    let rel_ids = relationship_ids(rels_xml)?;
    let rel_id = (1..)
        .map(|n| format!("rId{}", n))
        .find(|id| !rel_ids.contains(id))
        .unwrap_or_default();

    let path = (sheets.len() + 1..)
        .map(|n| format!("xl/worksheets/sheet{}.xml", n))
        .find(|p| !part_names.contains(p))
        .unwrap_or_default();

    Ok(NewSheet { sheet_id, rel_id, path })
}

/// Excel's sheet name rules: 1-31 chars, none of `[]:*?/\`, no leading or
/// trailing apostrophe.
fn validate_sheet_name(name: &str) -> Result<(), IoError> {
    let len = name.chars().count();
    let invalid = len == 0
        || len > 31
        || name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        || name.starts_with('\'')
        || name.ends_with('\'');
    if invalid {
        return Err(IoError::Package(format!("invalid sheet name '{}'", name)));
    }
    Ok(())
}

/// Excel treats sheet names case-insensitively.
fn same_sheet_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn check_writable(path: &Path) -> Result<(), IoError> {
    match extension(path) {
        Some(ext) if WRITABLE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(IoError::UnsupportedFormat {
            path: path.display().to_string(),
            operation: "in-place update",
        }),
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, IoError> {
    let file = File::open(path).map_err(|e| IoError::Open(format!("{}: {}", path.display(), e)))?;
    ZipArchive::new(file).map_err(|e| IoError::Package(e.to_string()))
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, IoError> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| IoError::Package(format!("missing part {}", name)))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| IoError::Package(format!("{}: {}", name, e)))?;
    Ok(content)
}

fn write_err(e: impl std::fmt::Display) -> IoError {
    IoError::Write(e.to_string())
}

/// Write the edited package to a temporary sibling file, then rename it over
/// the original.
fn rewrite_package(path: &Path, mut archive: ZipArchive<File>, edits: &PackageEdits) -> Result<(), IoError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".sheetpilot-")
        .suffix(".xlsx.tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;

    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();

            if edits.drop.contains(&name) {
                continue;
            }
            match edits.replace.get(&name) {
                Some(bytes) => {
                    zip.start_file(name.as_str(), options).map_err(write_err)?;
                    zip.write_all(bytes).map_err(write_err)?;
                }
                None => zip.raw_copy_file(entry).map_err(write_err)?,
            }
        }

        for (name, bytes) in &edits.add {
            zip.start_file(name.as_str(), options).map_err(write_err)?;
            zip.write_all(bytes).map_err(write_err)?;
        }

        zip.finish().map_err(write_err)?;
    }

    // Release the original before renaming over it.
    drop(archive);

    tmp.as_file().sync_all().map_err(write_err)?;
    if let Ok(meta) = std::fs::metadata(path) {
        let _ = tmp.as_file().set_permissions(meta.permissions());
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// ============================================================================
// XML helpers
// ============================================================================

pub(crate) fn xml_err(e: impl std::fmt::Display) -> IoError {
    IoError::Package(e.to_string())
}

/// Attribute value by local name, unescaped
pub(crate) fn attr(e: &BytesStart, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).to_string();
            match quick_xml::escape::unescape(&raw) {
                Ok(v) => v.into_owned(),
                Err(_) => raw,
            }
        })
}

/// Resolve workbook.xml `<sheet>` entries to their part paths via the
/// workbook relationships.
fn resolve_sheet_parts(workbook_xml: &str, rels_xml: &str) -> Result<Vec<SheetPart>, IoError> {
    // Step 1: rId -> target path
    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    targets.insert(id, resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Step 2: sheets in workbook order
    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(e, b"name")
                    .ok_or_else(|| IoError::Package("sheet without a name".to_string()))?;
                let sheet_id = attr(e, b"sheetId").and_then(|v| v.parse().ok()).unwrap_or(0);
                let rel_id = attr(e, b"id")
                    .ok_or_else(|| IoError::Package(format!("sheet '{}' has no relationship", name)))?;
                let path = targets
                    .get(&rel_id)
                    .cloned()
                    .ok_or_else(|| IoError::Package(format!("sheet '{}' points to unknown {}", name, rel_id)))?;
                sheets.push(SheetPart { name, sheet_id, rel_id, path });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if sheets.is_empty() {
        return Err(IoError::NoSheets);
    }
    Ok(sheets)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn relationship_ids(rels_xml: &str) -> Result<HashSet<String>, IoError> {
    let mut ids = HashSet::new();
    let mut reader = Reader::from_str(rels_xml);
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"Relationship" => {
                if let Some(id) = attr(e, b"Id") {
                    ids.insert(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ids)
}

/// Insert a fragment right before the closing tag of the first element with
/// the given local name. The fragment builder receives the element's
/// namespace prefix (`"x:"` or `""`).
fn insert_before_close(xml: &str, local: &[u8], fragment: impl Fn(&str) -> String) -> Result<String, IoError> {
    let mut reader = Reader::from_str(xml);
    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event().map_err(xml_err)? {
            Event::End(ref e) if e.local_name().as_ref() == local => {
                let qname = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let prefix = match qname.split_once(':') {
                    Some((p, _)) => format!("{}:", p),
                    None => String::new(),
                };
                let mut out = String::with_capacity(xml.len() + 256);
                out.push_str(&xml[..offset]);
                out.push_str(&fragment(&prefix));
                out.push_str(&xml[offset..]);
                return Ok(out);
            }
            Event::Eof => {
                return Err(IoError::Package(format!(
                    "no closing </{}> element",
                    String::from_utf8_lossy(local)
                )))
            }
            _ => {}
        }
    }
}

/// Drop empty elements with the given local name that match the predicate;
/// every other event is written back unchanged.
fn remove_elements(xml: &str, local: &[u8], matches: impl Fn(&BytesStart) -> bool) -> Result<String, IoError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == local && matches(e) => {}
            event => writer.write_event(event).map_err(xml_err)?,
        }
    }
    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="R&amp;D" sheetId="4" r:id="rId2"/></sheets></workbook>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#;

    #[test]
    fn test_resolve_sheet_parts() {
        let sheets = resolve_sheet_parts(WORKBOOK, RELS).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Data");
        assert_eq!(sheets[0].path, "xl/worksheets/sheet1.xml");
        assert_eq!(sheets[1].name, "R&D");
        assert_eq!(sheets[1].sheet_id, 4);
        assert_eq!(sheets[1].path, "xl/worksheets/sheet2.xml");
        assert!(sheets[1].is_worksheet());
        assert_eq!(sheets[0].rels_path(), "xl/worksheets/_rels/sheet1.xml.rels");
    }

    #[test]
    fn test_resolve_sheet_parts_unknown_relationship() {
        let rels = r#"<Relationships xmlns="x"></Relationships>"#;
        assert!(matches!(resolve_sheet_parts(WORKBOOK, rels), Err(IoError::Package(_))));
    }

    #[test]
    fn test_plan_new_sheet_picks_free_ids() {
        let sheets = resolve_sheet_parts(WORKBOOK, RELS).unwrap();
        let mut parts = HashSet::new();
        parts.insert("xl/worksheets/sheet3.xml".to_string());
        let plan = plan_new_sheet(&sheets, &parts, RELS, "AI_Results").unwrap();
        assert_eq!(plan.sheet_id, 5);
        assert_eq!(plan.rel_id, "rId4");
        assert_eq!(plan.path, "xl/worksheets/sheet4.xml");
    }

    #[test]
    fn test_plan_new_sheet_rejects_case_insensitive_clash() {
        let sheets = resolve_sheet_parts(WORKBOOK, RELS).unwrap();
        let err = plan_new_sheet(&sheets, &HashSet::new(), RELS, "DATA").unwrap_err();
        assert!(err.to_string().contains("clashes with existing sheet 'Data'"));
        assert!(same_sheet_name("AI_Results", "ai_results"));
        assert!(!same_sheet_name("AI_Results", "AI Results"));
    }

    #[test]
    fn test_validate_sheet_name() {
        assert!(validate_sheet_name("AI_Results").is_ok());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name("'quoted'").is_err());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
    }

    #[test]
    fn test_insert_before_close() {
        let out = insert_before_close(WORKBOOK, b"sheets", |p| format!("<{}sheet name=\"New\"/>", p)).unwrap();
        assert!(out.contains(r#"r:id="rId2"/><sheet name="New"/></sheets>"#));

        let prefixed = r#"<x:workbook xmlns:x="ns"><x:sheets><x:sheet name="A"/></x:sheets></x:workbook>"#;
        let out = insert_before_close(prefixed, b"sheets", |p| format!("<{}sheet name=\"B\"/>", p)).unwrap();
        assert!(out.contains(r#"<x:sheet name="A"/><x:sheet name="B"/></x:sheets>"#));

        assert!(insert_before_close("<a></a>", b"sheets", |_| String::new()).is_err());
    }

    #[test]
    fn test_remove_elements() {
        let out = remove_elements(RELS, b"Relationship", |e| {
            attr(e, b"Target").is_some_and(|t| t.ends_with("calcChain.xml"))
        })
        .unwrap();
        assert!(!out.contains("calcChain"));
        assert!(out.contains(r#"Id="rId1""#));
        assert!(out.contains(r#"Id="rId2""#));
        assert!(out.starts_with("<?xml"));
    }
}
