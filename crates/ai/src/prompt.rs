// Prompt construction
//
// The model sees: the actual column names with their spreadsheet letters,
// the sheet as CSV, the user's instruction, and a strict output contract
// (one `* ` bullet per result, nothing else). The row count is stated so
// per-row instructions come back with one item per row.

use std::fmt::Write;

use sheetpilot_engine::table::col_to_letter;
use sheetpilot_engine::SourceTable;

/// Build the full prompt for `instruction` over `table`, whose CSV rendering
/// is `table_csv`.
pub fn build_prompt(table: &SourceTable, table_csv: &str, instruction: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are a data analysis assistant.\n");
    prompt.push_str(
        "You will receive data from a spreadsheet (in CSV format) and a command from the user about this data.\n",
    );
    prompt.push_str("Analyze the data according to the command and give a clear, concise response.\n\n");

    prompt.push_str(&column_reference(table));

    prompt.push_str("\n---\nSpreadsheet Data (CSV Format):\n");
    prompt.push_str(table_csv);
    if !table_csv.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("---\n\n");

    let _ = writeln!(prompt, "User Command: {}", instruction.trim());
    prompt.push_str("---\n\n");

    prompt.push_str(&output_contract(table.row_count()));
    prompt
}

/// Column names with the letter each one occupies.
fn column_reference(table: &SourceTable) -> String {
    let mut text = String::from("Refer to the following actual column names in the spreadsheet data:\n");
    for (i, name) in table.columns().iter().enumerate() {
        let _ = writeln!(
            text,
            "- Actual Column Name: '{}' (spreadsheet column {})",
            name,
            col_to_letter(i)
        );
    }
    text.push_str(
        "\nWhen the command mentions a column letter (e.g. 'Column C'), use the actual column name \
         at that position from the list above (e.g. 'Unnamed: 2' for column C).\n",
    );
    text.push_str("Only process the columns the command names; do not extend to other columns.\n");
    text.push_str("If the command asks for de-duplication, remove duplicates strictly.\n");
    text
}

fn output_contract(rows: usize) -> String {
    let mut text = String::from("OUTPUT FORMAT (mandatory): a Markdown list and nothing else.\n");
    text.push_str("1. Only provide a Markdown list.\n");
    text.push_str("2. Each list item MUST start with `* ` (an asterisk followed by a space).\n");
    text.push_str("3. One item per line, with no empty lines between items.\n");
    text.push_str(
        "4. Do not include explanations, headings, summaries, introductions, greetings or any other text.\n",
    );
    text.push_str(
        "5. Each item is a single concise result, without extra parentheses, numbering, bold markers or descriptions.\n",
    );
    let _ = writeln!(
        text,
        "6. If the command produces a value for each row of the data, the list must have exactly {} items, \
         one per row in order (write N/A when a value cannot be produced).",
        rows
    );
    text.push_str("\nYour response (only the Markdown list):\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetpilot_engine::CellValue;

    fn table() -> SourceTable {
        SourceTable::from_grid(vec![
            vec![CellValue::text("Company"), CellValue::Empty, CellValue::text("Score")],
            vec![CellValue::text("Acme"), CellValue::text("x"), CellValue::Number(3.0)],
            vec![CellValue::text("Globex"), CellValue::Empty, CellValue::Number(4.0)],
        ])
    }

    #[test]
    fn test_prompt_lists_columns_with_letters() {
        let prompt = build_prompt(&table(), "Company,Unnamed: 1,Score\n", "dedupe column B");
        assert!(prompt.contains("- Actual Column Name: 'Company' (spreadsheet column A)"));
        assert!(prompt.contains("- Actual Column Name: 'Unnamed: 1' (spreadsheet column B)"));
        assert!(prompt.contains("- Actual Column Name: 'Score' (spreadsheet column C)"));
    }

    #[test]
    fn test_prompt_embeds_data_instruction_and_contract() {
        let csv = "Company,Unnamed: 1,Score\nAcme,x,3\nGlobex,,4";
        let prompt = build_prompt(&table(), csv, "  summarize each company  ");
        assert!(prompt.contains("Spreadsheet Data (CSV Format):\nCompany,Unnamed: 1,Score\nAcme,x,3\nGlobex,,4\n---"));
        assert!(prompt.contains("User Command: summarize each company\n"));
        assert!(prompt.contains("exactly 2 items"));
        assert!(prompt.contains("`* `"));
        assert!(prompt.ends_with("(only the Markdown list):\n"));
    }
}
