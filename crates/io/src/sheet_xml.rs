// Worksheet part generation
//
// Produces a self-contained SpreadsheetML worksheet for a table: header row
// first, then data rows. Text uses inline strings so the part does not depend
// on the workbook's shared string table. Dates are serial numbers carrying a
// date format index from `DateStyles`; without one they are written as text.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sheetpilot_engine::table::col_to_letter;
use sheetpilot_engine::{CellValue, SourceTable};

use crate::error::IoError;
use crate::styles::DateStyles;
use crate::xlsx::datetime_to_excel_serial;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

type XmlResult = Result<(), Box<dyn std::error::Error>>;

/// Render a table as a worksheet part (`xl/worksheets/sheetN.xml`).
pub fn worksheet_xml(table: &SourceTable, dates: &DateStyles) -> Result<Vec<u8>, IoError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_worksheet(&mut writer, table, dates).map_err(|e| IoError::Package(e.to_string()))?;
    Ok(writer.into_inner().into_inner())
}

fn write_worksheet(writer: &mut Writer<Cursor<Vec<u8>>>, table: &SourceTable, dates: &DateStyles) -> XmlResult {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let root = BytesStart::new("worksheet").with_attributes([("xmlns", MAIN_NS), ("xmlns:r", REL_NS)]);
    writer.write_event(Event::Start(root))?;

    let width = table.column_count();
    let height = table.row_count() + 1;
    let dimension = if width == 0 {
        "A1".to_string()
    } else {
        format!("A1:{}{}", col_to_letter(width - 1), height)
    };
    writer.write_event(Event::Empty(
        BytesStart::new("dimension").with_attributes([("ref", dimension.as_str())]),
    ))?;

    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

    if width > 0 {
        let header: Vec<CellValue> = table.columns().iter().map(|c| CellValue::text(c.as_str())).collect();
        write_row(writer, 0, &header, dates)?;
    }
    for (idx, row) in table.rows().iter().enumerate() {
        write_row(writer, idx + 1, row, dates)?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(())
}

fn write_row(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    row_idx: usize,
    cells: &[CellValue],
    dates: &DateStyles,
) -> XmlResult {
    let row_ref = (row_idx + 1).to_string();
    writer.write_event(Event::Start(
        BytesStart::new("row").with_attributes([("r", row_ref.as_str())]),
    ))?;

    for (col_idx, cell) in cells.iter().enumerate() {
        let cell_ref = format!("{}{}", col_to_letter(col_idx), row_idx + 1);
        match cell {
            CellValue::Empty => {}
            CellValue::Number(n) if n.is_finite() => {
                let value = format!("{}", n);
                write_value_cell(writer, &cell_ref, None, None, &value)?;
            }
            CellValue::Bool(b) => {
                write_value_cell(writer, &cell_ref, Some("b"), None, if *b { "1" } else { "0" })?;
            }
            CellValue::DateTime(dt) => match dates.for_value(dt) {
                Some(style) => {
                    let style = style.to_string();
                    let serial = format!("{}", datetime_to_excel_serial(dt));
                    write_value_cell(writer, &cell_ref, None, Some(&style), &serial)?;
                }
                None => write_inline_string(writer, &cell_ref, &cell.to_string())?,
            },
            other => write_inline_string(writer, &cell_ref, &other.to_string())?,
        }
    }

    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn write_value_cell(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    cell_ref: &str,
    cell_type: Option<&str>,
    style: Option<&str>,
    value: &str,
) -> XmlResult {
    let mut start = BytesStart::new("c").with_attributes([("r", cell_ref)]);
    if let Some(s) = style {
        start.push_attribute(("s", s));
    }
    if let Some(t) = cell_type {
        start.push_attribute(("t", t));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Start(BytesStart::new("v")))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("v")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_inline_string(writer: &mut Writer<Cursor<Vec<u8>>>, cell_ref: &str, text: &str) -> XmlResult {
    writer.write_event(Event::Start(
        BytesStart::new("c").with_attributes([("r", cell_ref), ("t", "inlineStr")]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;

    let mut t = BytesStart::new("t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;

    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}
