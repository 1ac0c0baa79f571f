// Excel file import (xlsx, xlsm, xls, xlsb, ods)
//
// One sheet is read into a SourceTable. The grid is anchored at A1 so that
// leading empty columns keep their position (and get placeholder names), and
// the first row is the header.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use sheetpilot_engine::{CellValue, SourceTable};

use crate::error::IoError;
use crate::{extension, READABLE_EXTENSIONS};

/// Maximum dimensions read from a sheet
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// A sheet read from a workbook
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    /// Sheet name actually read (resolved from the request)
    pub name: String,
    /// Position of the sheet in the workbook (0-indexed)
    pub index: usize,
    pub table: SourceTable,
}

/// Sheet names in workbook order
pub fn sheet_names(path: &Path) -> Result<Vec<String>, IoError> {
    check_readable(path)?;
    let workbook = open_workbook_auto(path).map_err(|e| IoError::Open(e.to_string()))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one sheet as a table. `sheet = None` (or blank) reads the first sheet.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<LoadedSheet, IoError> {
    check_readable(path)?;

    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::Open(e.to_string()))?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    let index = resolve_sheet(&names, sheet)?;
    let name = names[index].clone();

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| IoError::Open(format!("failed to read sheet '{}': {}", name, e)))?;

    let (height, width) = range.get_size();
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let start_row = start_row as usize;
    let start_col = start_col as usize;

    let total_rows = (start_row + height).min(MAX_ROWS);
    let total_cols = (start_col + width).min(MAX_COLS);
    if start_row + height > MAX_ROWS || start_col + width > MAX_COLS {
        log::warn!(
            "sheet '{}' truncated to {}x{}",
            name, total_rows, total_cols
        );
    }

    let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); start_row.min(total_rows)];
    for row in range.rows() {
        if grid.len() >= total_rows {
            break;
        }
        let mut cells = vec![CellValue::Empty; start_col.min(total_cols)];
        for cell in row.iter() {
            if cells.len() >= total_cols {
                break;
            }
            cells.push(convert_cell(cell));
        }
        grid.push(cells);
    }
    // Header row must span every data column, even if the header cells are blank.
    if let Some(header) = grid.first_mut() {
        header.resize(total_cols.max(header.len()), CellValue::Empty);
    }

    let table = SourceTable::from_grid(grid);
    log::debug!(
        "read sheet '{}' ({} rows, columns {:?})",
        name,
        table.row_count(),
        table.columns()
    );

    Ok(LoadedSheet { name, index, table })
}

/// Resolve a sheet request against the workbook's sheet names.
///
/// An exact name match wins; otherwise a 1-based position ("2") is accepted.
pub fn resolve_sheet(names: &[String], requested: Option<&str>) -> Result<usize, IoError> {
    if names.is_empty() {
        return Err(IoError::NoSheets);
    }

    let requested = match requested.map(str::trim) {
        None | Some("") => return Ok(0),
        Some(r) => r,
    };

    if let Some(idx) = names.iter().position(|n| n == requested) {
        return Ok(idx);
    }

    if let Ok(pos) = requested.parse::<usize>() {
        if pos >= 1 && pos <= names.len() {
            return Ok(pos - 1);
        }
    }

    Err(IoError::SheetNotFound {
        requested: requested.to_string(),
        available: names.to_vec(),
    })
}

fn check_readable(path: &Path) -> Result<(), IoError> {
    match extension(path) {
        Some(ext) if READABLE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(IoError::UnsupportedFormat {
            path: path.display().to_string(),
            operation: "reading",
        }),
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Store error as text representation
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(value) => CellValue::DateTime(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::text(s.as_str()),
        Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

/// Days from 0001-01-01 to 1899-12-30, the 1900 system's day zero
const EXCEL_EPOCH_DAYS_FROM_CE: i64 = 693_594;

/// Convert an Excel serial date (1900 system) to a timestamp, rounded to the
/// nearest second.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // Serial 0 is 1899-12-30 once the 1900 leap-year bug is accounted for.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::seconds(seconds))
}

/// Excel serial (1900 system) for a timestamp; inverse of
/// `excel_serial_to_datetime`.
pub fn datetime_to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let days = dt.date().num_days_from_ce() as i64 - EXCEL_EPOCH_DAYS_FROM_CE;
    days as f64 + dt.time().num_seconds_from_midnight() as f64 / 86_400.0
}
