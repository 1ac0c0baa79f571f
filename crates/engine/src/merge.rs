// Merge normalized items back into tabular form
//
// Three output policies:
// - AppendColumn: items become a new (or overwritten) column of the source
//   table, one item per row, truncated or padded to the row count
// - AppendSheet:  items become a one-column results table for a fixed sheet
// - NewFile:      same results table, destined for a standalone file
//
// Merging never fails on count mismatches; it records notes instead.

use std::fmt;

use crate::cell::CellValue;
use crate::error::EngineError;
use crate::table::SourceTable;

/// Column header of the results table (sheet and file policies)
pub const RESULT_COLUMN: &str = "AI_Processed_Result";

/// Sheet the results table is written to under `AppendSheet`
pub const RESULTS_SHEET: &str = "AI_Results";

/// Where normalized results go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPolicy {
    /// New column in the source sheet
    AppendColumn { column: String },
    /// Results sheet in the source workbook
    AppendSheet,
    /// Standalone results file
    NewFile,
}

impl OutputPolicy {
    /// Column-append policy; the column name must not be blank.
    pub fn append_column(column: impl Into<String>) -> Result<Self, EngineError> {
        let column = column.into().trim().to_string();
        if column.is_empty() {
            return Err(EngineError::EmptyColumnName);
        }
        Ok(OutputPolicy::AppendColumn { column })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputPolicy::AppendColumn { .. } => "append-column",
            OutputPolicy::AppendSheet => "append-sheet",
            OutputPolicy::NewFile => "new-file",
        }
    }
}

/// Diagnostic recorded while merging. Not an error: processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeNote {
    /// Item count differs from the table's row count (AppendColumn)
    CountMismatch { items: usize, rows: usize },
    /// No items to write (AppendSheet / NewFile)
    EmptyResult,
}

impl MergeNote {
    /// Values dropped because the model returned more items than rows.
    pub fn dropped(&self) -> usize {
        match self {
            MergeNote::CountMismatch { items, rows } => items.saturating_sub(*rows),
            MergeNote::EmptyResult => 0,
        }
    }

    /// Blank cells added because the model returned fewer items than rows.
    pub fn padded(&self) -> usize {
        match self {
            MergeNote::CountMismatch { items, rows } => rows.saturating_sub(*items),
            MergeNote::EmptyResult => 0,
        }
    }
}

impl fmt::Display for MergeNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeNote::CountMismatch { items, rows } => {
                write!(
                    f,
                    "WARNING: AI output count ({}) does not match original data rows ({}). \
                     Results will be adjusted to fit the new column",
                    items, rows
                )?;
                if items > rows {
                    write!(f, " ({} extra value(s) truncated).", self.dropped())
                } else {
                    write!(f, " ({} row(s) padded with blanks).", self.padded())
                }
            }
            MergeNote::EmptyResult => write!(
                f,
                "AI response could not be parsed into a list, unable to generate result Excel file."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutput {
    /// Source table with the result column assigned (AppendColumn)
    UpdatedTable(SourceTable),
    /// One-column results table (AppendSheet / NewFile)
    ResultTable(SourceTable),
    /// Nothing to persist
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub output: MergeOutput,
    pub notes: Vec<MergeNote>,
}

impl MergeResult {
    pub fn has_artifact(&self) -> bool {
        !matches!(self.output, MergeOutput::Nothing)
    }

    pub fn table(&self) -> Option<&SourceTable> {
        match &self.output {
            MergeOutput::UpdatedTable(t) | MergeOutput::ResultTable(t) => Some(t),
            MergeOutput::Nothing => None,
        }
    }
}

/// Merges items into tables. The results column header is configurable.
#[derive(Debug, Clone)]
pub struct TableMerger {
    result_column: String,
}

impl Default for TableMerger {
    fn default() -> Self {
        Self { result_column: RESULT_COLUMN.to_string() }
    }
}

impl TableMerger {
    pub fn with_result_column(column: impl Into<String>) -> Self {
        let column = column.into();
        if column.trim().is_empty() {
            return Self::default();
        }
        Self { result_column: column }
    }

    pub fn result_column(&self) -> &str {
        &self.result_column
    }

    pub fn merge(
        &self,
        items: &[String],
        table: &SourceTable,
        policy: &OutputPolicy,
    ) -> Result<MergeResult, EngineError> {
        match policy {
            OutputPolicy::AppendColumn { column } => append_column(items, table, column),
            OutputPolicy::AppendSheet | OutputPolicy::NewFile => Ok(self.results_table(items)),
        }
    }

    fn results_table(&self, items: &[String]) -> MergeResult {
        if items.is_empty() {
            return MergeResult {
                output: MergeOutput::Nothing,
                notes: vec![MergeNote::EmptyResult],
            };
        }
        MergeResult {
            output: MergeOutput::ResultTable(SourceTable::single_column(&self.result_column, items)),
            notes: Vec::new(),
        }
    }
}

/// Merge with the default results column.
pub fn merge(
    items: &[String],
    table: &SourceTable,
    policy: &OutputPolicy,
) -> Result<MergeResult, EngineError> {
    TableMerger::default().merge(items, table, policy)
}

fn append_column(items: &[String], table: &SourceTable, column: &str) -> Result<MergeResult, EngineError> {
    let rows = table.row_count();
    let mut notes = Vec::new();

    if items.len() != rows {
        let note = MergeNote::CountMismatch { items: items.len(), rows };
        log::warn!("{}", note);
        notes.push(note);
    }

    // Position i holds items[i] while both exist; the rest stay blank.
    let values: Vec<CellValue> = (0..rows)
        .map(|i| items.get(i).map(|s| CellValue::text(s.as_str())).unwrap_or_default())
        .collect();

    let mut updated = table.clone();
    updated.set_column(column, values)?;

    Ok(MergeResult {
        output: MergeOutput::UpdatedTable(updated),
        notes,
    })
}
