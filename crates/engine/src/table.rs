// Source table model
//
// A table is a header row of unique column names plus data rows of equal
// width. Rows are addressed by position, cells by column name or index.

use std::collections::HashSet;

use crate::cell::CellValue;
use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl SourceTable {
    /// Create an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(EngineError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { columns, rows: Vec::new() })
    }

    /// Build a table from a raw cell grid whose first row is the header.
    ///
    /// Blank header cells become positional placeholders (`Unnamed: 2` for
    /// the third column) and repeated names get a `.1`, `.2`, ... suffix.
    /// Short rows are padded; trailing rows with no values are dropped.
    pub fn from_grid(grid: Vec<Vec<CellValue>>) -> Self {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = grid.into_iter();

        let header = grid.next().unwrap_or_default();
        let columns = header_names(&header, width);

        let mut rows: Vec<Vec<CellValue>> = grid
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();

        while rows.last().is_some_and(|row| row.iter().all(CellValue::is_empty)) {
            rows.pop();
        }

        Self { columns, rows }
    }

    /// A one-column table with one row per value.
    pub fn single_column(name: &str, values: &[String]) -> Self {
        Self {
            columns: vec![name.to_string()],
            rows: values.iter().map(|v| vec![CellValue::text(v.as_str())]).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (row, column name); `None` when either is out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Append a row, padding it to the table width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) -> Result<(), EngineError> {
        if row.len() > self.columns.len() {
            return Err(EngineError::RowTooWide {
                row: self.rows.len(),
                cells: row.len(),
                columns: self.columns.len(),
            });
        }
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
        Ok(())
    }

    /// Assign a whole column. An existing column with the same name is
    /// overwritten in place; otherwise the column is appended last.
    pub fn set_column(&mut self, name: &str, values: Vec<CellValue>) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::EmptyColumnName);
        }
        if values.len() != self.rows.len() {
            return Err(EngineError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        match self.column_index(name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// The first `n` rows as a new table.
    pub fn head(&self, n: usize) -> SourceTable {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

fn header_names(header: &[CellValue], width: usize) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(width);

    for col in 0..width {
        let base = match header.get(col) {
            Some(CellValue::Empty) | None => format!("Unnamed: {}", col),
            Some(value) => value.to_string(),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while used.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        used.insert(name.clone());
        names.push(name);
    }

    names
}

/// Convert 0-indexed column to letter (0 = A, 25 = Z, 26 = AA, etc.)
pub fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::text(s)
    }

    #[test]
    fn test_from_grid_header_placeholders() {
        let grid = vec![
            vec![text("Company"), CellValue::Empty, text("Revenue")],
            vec![text("Acme"), text("x"), CellValue::Number(10.0)],
        ];
        let table = SourceTable::from_grid(grid);
        assert_eq!(table.columns(), &["Company", "Unnamed: 1", "Revenue"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.get(0, "Revenue"), Some(&CellValue::Number(10.0)));
    }

    #[test]
    fn test_from_grid_duplicate_headers() {
        let grid = vec![
            vec![text("Name"), text("Name"), text("Name.1"), text("Name")],
            vec![text("a"), text("b"), text("c"), text("d")],
        ];
        let table = SourceTable::from_grid(grid);
        assert_eq!(table.columns(), &["Name", "Name.1", "Name.1.1", "Name.2"]);
    }

    #[test]
    fn test_from_grid_pads_short_rows_and_drops_trailing_blanks() {
        let grid = vec![
            vec![text("A"), text("B")],
            vec![text("1")],
            vec![],
            vec![text("3"), text("4")],
            vec![CellValue::Empty, CellValue::Empty],
            vec![],
        ];
        let table = SourceTable::from_grid(grid);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[0], vec![text("1"), CellValue::Empty]);
        // Interior blank row is kept
        assert!(table.rows()[1].iter().all(CellValue::is_empty));
    }

    #[test]
    fn test_from_grid_empty() {
        let table = SourceTable::from_grid(Vec::new());
        assert_eq!(table.column_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let err = SourceTable::new(vec!["a".into(), "a".into()]).unwrap_err();
        assert_eq!(err, EngineError::DuplicateColumn("a".into()));
    }

    #[test]
    fn test_set_column_appends_then_overwrites_in_place() {
        let mut table = SourceTable::new(vec!["A".into(), "B".into()]).unwrap();
        table.push_row(vec![text("1"), text("2")]).unwrap();
        table.push_row(vec![text("3")]).unwrap();

        table.set_column("C", vec![text("x"), text("y")]).unwrap();
        assert_eq!(table.columns(), &["A", "B", "C"]);
        assert_eq!(table.get(1, "C"), Some(&text("y")));

        table.set_column("A", vec![text("p"), CellValue::Empty]).unwrap();
        assert_eq!(table.columns(), &["A", "B", "C"]);
        assert_eq!(table.get(0, "A"), Some(&text("p")));
        assert_eq!(table.get(1, "A"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut table = SourceTable::new(vec!["A".into()]).unwrap();
        table.push_row(vec![text("1")]).unwrap();
        let err = table.set_column("B", vec![]).unwrap_err();
        assert!(matches!(err, EngineError::ColumnLength { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn test_push_row_too_wide() {
        let mut table = SourceTable::new(vec!["A".into()]).unwrap();
        assert!(table.push_row(vec![text("1"), text("2")]).is_err());
    }

    #[test]
    fn test_head() {
        let values: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        let table = SourceTable::single_column("N", &values);
        assert_eq!(table.head(5).row_count(), 5);
        assert_eq!(table.head(20).row_count(), 8);
    }

    #[test]
    fn test_col_to_letter() {
        assert_eq!(col_to_letter(0), "A");
        assert_eq!(col_to_letter(2), "C");
        assert_eq!(col_to_letter(25), "Z");
        assert_eq!(col_to_letter(26), "AA");
        assert_eq!(col_to_letter(701), "ZZ");
        assert_eq!(col_to_letter(702), "AAA");
    }
}
