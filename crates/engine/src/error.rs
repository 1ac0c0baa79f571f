use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Column names must be non-empty after trimming.
    EmptyColumnName,
    /// Column names must be unique within a table.
    DuplicateColumn(String),
    /// A row has more cells than the table has columns.
    RowTooWide { row: usize, cells: usize, columns: usize },
    /// A replacement column does not match the table's row count.
    ColumnLength { column: String, expected: usize, actual: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyColumnName => write!(f, "column name must not be empty"),
            Self::DuplicateColumn(name) => write!(f, "duplicate column name '{name}'"),
            Self::RowTooWide { row, cells, columns } => {
                write!(f, "row {row} has {cells} cells but the table has {columns} columns")
            }
            Self::ColumnLength { column, expected, actual } => {
                write!(f, "column '{column}' has {actual} values, expected {expected}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
