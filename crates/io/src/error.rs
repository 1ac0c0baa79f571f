use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// File extension not in the readable/writable set.
    UnsupportedFormat { path: String, operation: &'static str },
    /// The workbook could not be opened or parsed.
    Open(String),
    /// The workbook has no sheets.
    NoSheets,
    /// Requested sheet does not exist.
    SheetNotFound { requested: String, available: Vec<String> },
    /// The xlsx package is missing a part or has malformed XML.
    Package(String),
    /// Writing or renaming the output failed (locked, read-only, disk full).
    Write(String),
}

impl IoError {
    /// Errors caused by the caller's input rather than the file system.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::Open(_) | Self::NoSheets | Self::SheetNotFound { .. }
        )
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { path, operation } => {
                write!(f, "{operation} is not supported for '{path}'")
            }
            Self::Open(msg) => write!(f, "failed to open workbook: {msg}"),
            Self::NoSheets => write!(f, "workbook contains no sheets"),
            Self::SheetNotFound { requested, available } => {
                write!(f, "could not find sheet named '{requested}'")?;
                if !available.is_empty() {
                    write!(f, " (available: {})", available.join(", "))?;
                }
                Ok(())
            }
            Self::Package(msg) => write!(f, "invalid workbook package: {msg}"),
            Self::Write(msg) => write!(f, "write failed: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<zip::result::ZipError> for IoError {
    fn from(e: zip::result::ZipError) -> Self {
        IoError::Package(e.to_string())
    }
}
