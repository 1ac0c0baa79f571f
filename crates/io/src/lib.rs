// File I/O operations
//
// Reading goes through calamine (xlsx, xlsm, xls, xlsb, ods). Writing back
// into an existing workbook works at the package level and is xlsx/xlsm only:
// the target worksheet part is regenerated and every other part is copied
// raw, so untouched sheets stay byte-identical.

pub mod csv;
pub mod error;
pub mod export;
pub mod package;
pub mod sheet_xml;
pub mod styles;
pub mod xlsx;

pub use error::IoError;

/// Extensions accepted as table sources
pub const READABLE_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Extensions whose workbooks can be updated in place
pub const WRITABLE_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// Lowercased file extension, if any
pub fn extension(path: &std::path::Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
