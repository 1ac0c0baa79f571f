// Date cell formats for regenerated worksheets
//
// A date cell stores a serial number; only its cell format (an `xf` entry of
// the `cellXfs` list in xl/styles.xml) marks it as a date. Regenerated sheets
// reuse the workbook's first date format and first date-time format, and
// append either one to `cellXfs` when the workbook has none.

use std::collections::HashMap;
use std::io::Cursor;

use chrono::{NaiveDateTime, Timelike};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use sheetpilot_engine::{CellValue, SourceTable};

use crate::error::IoError;
use crate::package::{attr, xml_err};

pub(crate) const STYLES_PART: &str = "xl/styles.xml";

/// Built-in `m/d/yyyy`, used when a date format has to be added
const BUILTIN_DATE: u32 = 14;
/// Built-in `m/d/yyyy h:mm`
const BUILTIN_DATETIME: u32 = 22;

/// `cellXfs` indices for date cells. `None` means dates fall back to text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateStyles {
    /// Date without a time of day
    pub date: Option<u32>,
    /// Date with a time of day
    pub datetime: Option<u32>,
}

impl DateStyles {
    pub fn for_value(&self, dt: &NaiveDateTime) -> Option<u32> {
        if dt.num_seconds_from_midnight() == 0 {
            self.date.or(self.datetime)
        } else {
            self.datetime.or(self.date)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateKind {
    Date,
    DateTime,
}

/// Which date formats a table needs: (date only, date with time).
pub(crate) fn date_needs(table: &SourceTable) -> (bool, bool) {
    let mut date = false;
    let mut datetime = false;
    for cell in table.rows().iter().flatten() {
        if let CellValue::DateTime(dt) = cell {
            if dt.num_seconds_from_midnight() == 0 {
                date = true;
            } else {
                datetime = true;
            }
        }
    }
    (date, datetime)
}

/// Find (or add) the formats the table's dates need.
///
/// Returns the style indices and, when formats were appended, the rewritten
/// styles part.
pub(crate) fn ensure_date_styles(
    styles_xml: &str,
    need_date: bool,
    need_datetime: bool,
) -> Result<(DateStyles, Option<String>), IoError> {
    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut has_cell_xfs = false;
    let mut in_cell_xfs = false;

    let mut reader = Reader::from_str(styles_xml);
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                has_cell_xfs = true;
                in_cell_xfs = true;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"numFmt" => {
                let id = attr(e, b"numFmtId").and_then(|v| v.parse().ok());
                if let (Some(id), Some(code)) = (id, attr(e, b"formatCode")) {
                    custom.insert(id, code);
                }
            }
            Event::Empty(ref e) | Event::Start(ref e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                xf_formats.push(attr(e, b"numFmtId").and_then(|v| v.parse().ok()).unwrap_or(0));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let kind_of = |id: u32| match id {
        14..=17 => Some(DateKind::Date),
        BUILTIN_DATETIME => Some(DateKind::DateTime),
        _ => custom.get(&id).and_then(|code| classify_format_code(code)),
    };
    let first = |kind: DateKind| {
        xf_formats
            .iter()
            .position(|id| kind_of(*id) == Some(kind))
            .map(|i| i as u32)
    };

    let mut styles = DateStyles { date: first(DateKind::Date), datetime: first(DateKind::DateTime) };

    let mut added = Vec::new();
    let mut next = xf_formats.len() as u32;
    if need_date && styles.date.is_none() {
        styles.date = Some(next);
        added.push(BUILTIN_DATE);
        next += 1;
    }
    if need_datetime && styles.datetime.is_none() {
        styles.datetime = Some(next);
        added.push(BUILTIN_DATETIME);
        next += 1;
    }

    if added.is_empty() {
        return Ok((styles, None));
    }
    if !has_cell_xfs {
        log::warn!("styles part has no cellXfs list; dates are written as text");
        return Ok((DateStyles::default(), None));
    }

    let rewritten = append_cell_xfs(styles_xml, &added, next)?;
    log::debug!("added {} date format(s) to {}", added.len(), STYLES_PART);
    Ok((styles, Some(rewritten)))
}

/// Append `xf` entries with the given number formats to `cellXfs` and set
/// its count. Every other event is written back unchanged.
fn append_cell_xfs(styles_xml: &str, formats: &[u32], count: u32) -> Result<String, IoError> {
    let mut reader = Reader::from_str(styles_xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut prefix = String::new();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                prefix = match qname.split_once(':') {
                    Some((p, _)) => format!("{}:", p),
                    None => String::new(),
                };
                let mut start = BytesStart::new(qname.clone());
                for a in e.attributes().flatten() {
                    if a.key.local_name().as_ref() != b"count" {
                        start.push_attribute(a);
                    }
                }
                let count = count.to_string();
                start.push_attribute(("count", count.as_str()));
                writer.write_event(Event::Start(start)).map_err(xml_err)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                for id in formats {
                    let id = id.to_string();
                    let xf = BytesStart::new(format!("{}xf", prefix)).with_attributes([
                        ("numFmtId", id.as_str()),
                        ("fontId", "0"),
                        ("fillId", "0"),
                        ("borderId", "0"),
                        ("xfId", "0"),
                        ("applyNumberFormat", "1"),
                    ]);
                    writer.write_event(Event::Empty(xf)).map_err(xml_err)?;
                }
                writer.write_event(Event::End(e)).map_err(xml_err)?;
            }
            event => writer.write_event(event).map_err(xml_err)?,
        }
    }

    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_err)
}

/// Date-ness of a custom format code, ignoring quoted literals, `[...]`
/// sections (colors, locales, elapsed time) and escaped characters.
fn classify_format_code(code: &str) -> Option<DateKind> {
    let mut tokens = String::new();
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '[' => {
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            other => tokens.push(other.to_ascii_lowercase()),
        }
    }

    let has_date = tokens.contains(['y', 'd']);
    let has_time = tokens.contains(['h', 's']);
    match (has_date, has_time) {
        (true, true) => Some(DateKind::DateTime),
        (true, false) => Some(DateKind::Date),
        _ => None,
    }
}
