// CSV rendering of tables
//
// Used to embed sheet data in model prompts. Header first, then one record
// per row; values use the same display text as the written workbook.

use sheetpilot_engine::SourceTable;

use crate::error::IoError;

pub fn table_to_csv(table: &SourceTable) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if table.column_count() > 0 {
        writer.write_record(table.columns()).map_err(|e| IoError::Write(e.to_string()))?;
        for row in table.rows() {
            let record: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
            writer.write_record(&record).map_err(|e| IoError::Write(e.to_string()))?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| IoError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IoError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetpilot_engine::CellValue;

    fn sample() -> SourceTable {
        let mut table = SourceTable::new(vec!["Company".into(), "Revenue".into(), "Note".into()]).unwrap();
        table
            .push_row(vec![CellValue::text("Acme, Inc."), CellValue::Number(1200.0), CellValue::Empty])
            .unwrap();
        table
            .push_row(vec![CellValue::text("Globex"), CellValue::Number(3.5), CellValue::text("say \"hi\"")])
            .unwrap();
        table
    }

    #[test]
    fn test_table_to_csv_quotes_and_blanks() {
        let csv = table_to_csv(&sample()).unwrap();
        assert_eq!(
            csv,
            "Company,Revenue,Note\n\"Acme, Inc.\",1200,\nGlobex,3.5,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_header_only_and_empty() {
        let table = SourceTable::new(vec!["A".into()]).unwrap();
        assert_eq!(table_to_csv(&table).unwrap(), "A\n");
        assert_eq!(table_to_csv(&SourceTable::default()).unwrap(), "");
    }
}
