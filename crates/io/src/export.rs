// Standalone result workbooks
//
// Written with rust_xlsxwriter. File names carry a local timestamp and get a
// numeric suffix when a file of that name already exists, so earlier results
// are never overwritten.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use sheetpilot_engine::{CellValue, SourceTable};

use crate::error::IoError;

/// Sheet name inside a standalone result file
pub const RESULT_FILE_SHEET: &str = "Sheet1";

/// Number formats for date cells in result files
const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Prefix of standalone result file names
pub const RESULT_FILE_PREFIX: &str = "ai_result";

/// Write `table` to a fresh workbook in `dir` (created if missing) and return
/// the path written.
pub fn write_new_file(dir: &Path, table: &SourceTable) -> Result<PathBuf, IoError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| IoError::Write(format!("cannot create {}: {}", dir.display(), e)))?;
    let path = result_file_path(dir, Local::now().naive_local());
    write_table_file(&path, RESULT_FILE_SHEET, table)?;
    log::info!("wrote {} result row(s) to {}", table.row_count(), path.display());
    Ok(path)
}

/// `ai_result_<YYYYMMDD_HHMMSS>.xlsx` in `dir`, suffixed `_1`, `_2`, ... when taken.
pub fn result_file_path(dir: &Path, now: NaiveDateTime) -> PathBuf {
    let stem = format!("{}_{}", RESULT_FILE_PREFIX, now.format("%Y%m%d_%H%M%S"));
    let candidate = dir.join(format!("{}.xlsx", stem));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{}_{}.xlsx", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Write a one-sheet workbook: header row, then the table rows.
pub fn write_table_file(path: &Path, sheet_name: &str, table: &SourceTable) -> Result<(), IoError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(sheet_name)
        .map_err(|e| IoError::Write(format!("failed to create sheet '{}': {}", sheet_name, e)))?;

    write_cells(worksheet, table).map_err(|e| IoError::Write(e.to_string()))?;

    workbook
        .save(path)
        .map_err(|e| IoError::Write(format!("failed to save {}: {}", path.display(), e)))
}

fn write_cells(worksheet: &mut Worksheet, table: &SourceTable) -> Result<(), XlsxError> {
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, col as u16, name.as_str())?;
    }

    for (idx, row) in table.rows().iter().enumerate() {
        // rust_xlsxwriter uses 0-based row/col as u32/u16
        let row32 = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col16 = col as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    worksheet.write_string(row32, col16, s.as_str())?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(row32, col16, *n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row32, col16, *b)?;
                }
                CellValue::DateTime(dt) => {
                    let format = if dt.num_seconds_from_midnight() == 0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_datetime_with_format(row32, col16, dt, format)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::read_table;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_result_file_path_unique() {
        let dir = tempdir().unwrap();
        let first = result_file_path(dir.path(), at(9, 5, 7));
        assert_eq!(first.file_name().unwrap(), "ai_result_20250131_090507.xlsx");

        std::fs::write(&first, b"taken").unwrap();
        let second = result_file_path(dir.path(), at(9, 5, 7));
        assert_eq!(second.file_name().unwrap(), "ai_result_20250131_090507_1.xlsx");

        std::fs::write(&second, b"taken").unwrap();
        let third = result_file_path(dir.path(), at(9, 5, 7));
        assert_eq!(third.file_name().unwrap(), "ai_result_20250131_090507_2.xlsx");
    }

    #[test]
    fn test_write_new_file_round_trip() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("downloads");
        let items = vec!["Acme".to_string(), "Globex".to_string()];
        let table = SourceTable::single_column("AI_Processed_Result", &items);

        let path = write_new_file(&out_dir, &table).unwrap();
        assert!(path.starts_with(&out_dir));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("ai_result_"));

        let loaded = read_table(&path, None).unwrap();
        assert_eq!(loaded.name, RESULT_FILE_SHEET);
        assert_eq!(loaded.table.columns(), &["AI_Processed_Result"]);
        assert_eq!(loaded.table.row_count(), 2);
        assert_eq!(loaded.table.get(1, "AI_Processed_Result"), Some(&CellValue::text("Globex")));
    }

    #[test]
    fn test_write_table_file_typed_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typed.xlsx");
        let mut table = SourceTable::new(vec!["N".into(), "B".into(), "E".into()]).unwrap();
        table
            .push_row(vec![CellValue::Number(2.5), CellValue::Bool(false), CellValue::Empty])
            .unwrap();
        write_table_file(&path, "Out", &table).unwrap();

        let loaded = read_table(&path, Some("Out")).unwrap();
        assert_eq!(loaded.table.get(0, "N"), Some(&CellValue::Number(2.5)));
        assert_eq!(loaded.table.get(0, "B"), Some(&CellValue::Bool(false)));
        assert_eq!(loaded.table.get(0, "E"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_write_table_file_keeps_dates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let mut table = SourceTable::new(vec!["Signed".into(), "Seen".into()]).unwrap();
        table
            .push_row(vec![
                CellValue::DateTime(day.and_hms_opt(0, 0, 0).unwrap()),
                CellValue::DateTime(day.and_hms_opt(14, 5, 0).unwrap()),
            ])
            .unwrap();
        write_table_file(&path, "Out", &table).unwrap();

        let loaded = read_table(&path, Some("Out")).unwrap();
        assert_eq!(loaded.table.get(0, "Signed"), Some(&CellValue::DateTime(day.and_hms_opt(0, 0, 0).unwrap())));
        assert_eq!(loaded.table.get(0, "Seen"), Some(&CellValue::DateTime(day.and_hms_opt(14, 5, 0).unwrap())));
    }

    #[test]
    fn test_write_table_file_rejects_bad_sheet_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        let err = write_table_file(&path, "a/b", &SourceTable::default()).unwrap_err();
        assert!(matches!(err, IoError::Write(_)));
    }
}
