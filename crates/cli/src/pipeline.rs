// Request processing
//
// read sheet -> prompt -> model -> normalize -> merge -> persist
//
// Only request validation and reading the source table fail hard. A failed
// model call, an empty result or a failed write still produce a response:
// the model text comes back with `Note:` / `ERROR:` paragraphs appended and
// no artifact.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use sheetpilot_ai::{build_prompt, AskError, ModelClient};
use sheetpilot_config::settings::Settings;
use sheetpilot_engine::{EngineError, MergeOutput, OutputPolicy, ResponseNormalizer, SourceTable, TableMerger};
use sheetpilot_io::csv::table_to_csv;
use sheetpilot_io::{export, package, xlsx, IoError};

/// Where results go (command-line spelling of `OutputPolicy`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// New column in the source sheet (requires --column)
    AppendColumn,
    /// Results sheet in the source workbook
    #[default]
    AppendSheet,
    /// Standalone results workbook
    NewFile,
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub path: PathBuf,
    pub instruction: String,
    /// Sheet name or 1-based position; first sheet when absent
    pub sheet: Option<String>,
    pub mode: OutputMode,
    /// Column name for `AppendColumn`
    pub column: Option<String>,
}

impl ProcessRequest {
    fn policy(&self) -> Result<OutputPolicy, PipelineError> {
        match self.mode {
            OutputMode::AppendColumn => {
                let column = self.column.clone().unwrap_or_default();
                OutputPolicy::append_column(column).map_err(|e| match e {
                    EngineError::EmptyColumnName => PipelineError::MissingColumn,
                    other => PipelineError::Merge(other),
                })
            }
            OutputMode::AppendSheet => Ok(OutputPolicy::AppendSheet),
            OutputMode::NewFile => Ok(OutputPolicy::NewFile),
        }
    }
}

/// Settings-derived knobs
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    pub results_sheet: String,
    pub preview_rows: usize,
    pub normalizer: ResponseNormalizer,
    pub merger: TableMerger,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let normalizer = match &settings.normalizer.replace_keywords {
            Some(keywords) => ResponseNormalizer::with_keywords(keywords.iter()),
            None => ResponseNormalizer::default(),
        }
        .extend_keywords(settings.normalizer.extra_keywords.iter());

        Self {
            output_dir: settings.output.directory.clone(),
            results_sheet: settings.output.results_sheet.clone(),
            preview_rows: settings.output.preview_rows,
            normalizer,
            merger: TableMerger::with_result_column(settings.output.result_column.clone()),
        }
    }
}

/// Result of one processing request (the `--json` contract)
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub message: String,
    pub filename: String,
    /// Sheet actually read
    pub sheet: String,
    pub mode: &'static str,
    /// First rows as records, column order preserved; blanks are null
    pub data_preview: Vec<Map<String, Value>>,
    /// Model text with notes appended
    pub ai_response: String,
    pub items: Vec<String>,
    pub notes: Vec<String>,
    pub output_path: Option<String>,
    #[serde(skip)]
    pub model_error: Option<AskError>,
}

impl ProcessResponse {
    pub fn has_artifact(&self) -> bool {
        self.output_path.is_some()
    }
}

/// Hard failures: nothing was sent to the model
#[derive(Debug)]
pub enum PipelineError {
    MissingInstruction,
    MissingColumn,
    Read(IoError),
    Merge(EngineError),
}

impl PipelineError {
    /// Bad request arguments, as opposed to an unreadable source.
    pub fn is_usage(&self) -> bool {
        matches!(self, PipelineError::MissingInstruction | PipelineError::MissingColumn)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingInstruction => write!(f, "Please provide an AI instruction"),
            PipelineError::MissingColumn => {
                write!(f, "When adding a new column, please specify its name")
            }
            PipelineError::Read(e) => write!(f, "{}", e),
            PipelineError::Merge(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

pub fn process(
    request: &ProcessRequest,
    options: &PipelineOptions,
    model: &dyn ModelClient,
) -> Result<ProcessResponse, PipelineError> {
    let instruction = request.instruction.trim();
    if instruction.is_empty() {
        return Err(PipelineError::MissingInstruction);
    }
    let policy = request.policy()?;

    let loaded = xlsx::read_table(&request.path, request.sheet.as_deref()).map_err(PipelineError::Read)?;
    let table = &loaded.table;
    log::info!(
        "read sheet '{}' from {} ({} rows)",
        loaded.name,
        request.path.display(),
        table.row_count()
    );
    log::debug!("columns: {:?}", table.columns());

    let csv = table_to_csv(table).map_err(PipelineError::Read)?;
    let prompt = build_prompt(table, &csv, instruction);
    log::debug!("prompt:\n{}", prompt);

    let (mut ai_response, model_error) = match model.generate(&prompt) {
        Ok(text) => (text, None),
        Err(e) => {
            log::warn!("{} call failed: {}", model.provider(), e);
            (model_failure_text(&e), Some(e))
        }
    };
    log::debug!("raw response:\n{}", ai_response);

    let items = options.normalizer.normalize(&ai_response);
    log::debug!(
        "parsed {} item(s) for {} row(s): {:?}",
        items.len(),
        table.row_count(),
        items
    );

    let mut notes = Vec::new();
    let mut preview_source: Option<SourceTable> = None;
    let output_path = match options.merger.merge(&items, table, &policy) {
        Ok(merged) => {
            notes.extend(merged.notes.iter().map(|n| format!("Note: {}", n)));
            if let MergeOutput::UpdatedTable(updated) = &merged.output {
                preview_source = Some(updated.head(options.preview_rows));
            }
            match persist(&request.path, &loaded.name, &policy, options, merged.output) {
                Ok(path) => path,
                Err(message) => {
                    log::warn!("{}", message);
                    notes.push(format!("ERROR: {}", message));
                    None
                }
            }
        }
        Err(e) => {
            log::warn!("merge failed: {}", e);
            notes.push(format!("ERROR: Could not merge results: {}", e));
            None
        }
    };

    for note in &notes {
        ai_response.push_str("\n\n");
        ai_response.push_str(note);
    }

    let preview = preview_source.unwrap_or_else(|| table.head(options.preview_rows));

    Ok(ProcessResponse {
        message: "File reading and AI processing successful!".to_string(),
        filename: request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        sheet: loaded.name.clone(),
        mode: policy.as_str(),
        data_preview: preview_records(&preview),
        ai_response,
        items,
        notes,
        output_path: output_path.map(|p| p.display().to_string()),
        model_error,
    })
}

/// Text standing in for the model response when the call failed.
fn model_failure_text(e: &AskError) -> String {
    if e.is_configuration() {
        format!("ERROR: {}, cannot process AI command.", e)
    } else {
        format!("An error occurred while processing AI command: {}", e)
    }
}

/// Write the merge output; returns the artifact location.
fn persist(
    source: &Path,
    sheet_name: &str,
    policy: &OutputPolicy,
    options: &PipelineOptions,
    output: MergeOutput,
) -> Result<Option<PathBuf>, String> {
    match (output, policy) {
        (MergeOutput::Nothing, _) => Ok(None),
        (MergeOutput::UpdatedTable(table), _) => package::replace_sheet(source, sheet_name, &table)
            .map(|_| Some(source.to_path_buf()))
            .map_err(|e| {
                format!(
                    "Could not write results as a new column to the original file. \
                     Please ensure the file is not in use. Detailed error: {}",
                    e
                )
            }),
        (MergeOutput::ResultTable(table), OutputPolicy::NewFile) => {
            export::write_new_file(&options.output_dir, &table)
                .map(Some)
                .map_err(|e| format!("Could not create result file. Detailed error: {}", e))
        }
        (MergeOutput::ResultTable(table), _) => package::write_sheet(source, &options.results_sheet, &table)
            .map(|_| Some(source.to_path_buf()))
            .map_err(|e| {
                format!(
                    "Could not write results to the original file. \
                     Please ensure the file is not in use. Detailed error: {}",
                    e
                )
            }),
    }
}

/// Rows as `{column: value}` records, column order preserved.
pub fn preview_records(table: &SourceTable) -> Vec<Map<String, Value>> {
    table
        .rows()
        .iter()
        .map(|row| {
            table
                .columns()
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name.clone(), serde_json::to_value(cell).unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use sheetpilot_engine::CellValue;
    use std::cell::RefCell;

    struct StubModel {
        reply: Result<String, AskError>,
        prompts: RefCell<Vec<String>>,
    }

    impl StubModel {
        fn replying(text: &str) -> Self {
            Self { reply: Ok(text.to_string()), prompts: RefCell::new(Vec::new()) }
        }

        fn failing(err: AskError) -> Self {
            Self { reply: Err(err), prompts: RefCell::new(Vec::new()) }
        }
    }

    impl ModelClient for StubModel {
        fn provider(&self) -> &str {
            "stub"
        }

        fn generate(&self, prompt: &str) -> Result<String, AskError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("companies.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name("Data").unwrap();
        sheet.write_string(0, 0, "Company").unwrap();
        sheet.write_string(0, 1, "Revenue").unwrap();
        for (i, name) in ["Acme", "Globex", "Initech"].iter().enumerate() {
            sheet.write_string(i as u32 + 1, 0, *name).unwrap();
            sheet.write_number(i as u32 + 1, 1, (i as f64 + 1.0) * 10.0).unwrap();
        }
        workbook.add_worksheet().set_name("Other").unwrap().write_string(0, 0, "x").unwrap();
        workbook.save(&path).unwrap();
        path
    }

    fn request(path: &Path, mode: OutputMode) -> ProcessRequest {
        ProcessRequest {
            path: path.to_path_buf(),
            instruction: "classify each company".to_string(),
            sheet: None,
            mode,
            column: Some("Sector".to_string()),
        }
    }

    fn options(dir: &Path) -> PipelineOptions {
        PipelineOptions { output_dir: dir.join("downloads"), ..PipelineOptions::default() }
    }

    #[test]
    fn test_append_column_exact_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let model = StubModel::replying("Here you go:\n* Tools\n* Energy\n* Software\n");

        let response = process(&request(&path, OutputMode::AppendColumn), &options(dir.path()), &model).unwrap();

        assert_eq!(response.items, vec!["Tools", "Energy", "Software"]);
        assert!(response.notes.is_empty());
        assert_eq!(response.output_path.as_deref(), Some(path.display().to_string().as_str()));
        assert_eq!(response.sheet, "Data");
        assert_eq!(response.mode, "append-column");
        assert_eq!(response.data_preview.len(), 3);
        assert_eq!(response.data_preview[1]["Sector"], "Energy");

        let loaded = xlsx::read_table(&path, Some("Data")).unwrap();
        assert_eq!(loaded.table.get(2, "Sector"), Some(&CellValue::text("Software")));
        assert_eq!(xlsx::sheet_names(&path).unwrap(), vec!["Data", "Other"]);

        let prompts = model.prompts.borrow();
        assert!(prompts[0].contains("User Command: classify each company"));
        assert!(prompts[0].contains("Acme,10"));
    }

    #[test]
    fn test_append_column_mismatch_note() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let model = StubModel::replying("* Tools");

        let response = process(&request(&path, OutputMode::AppendColumn), &options(dir.path()), &model).unwrap();

        assert_eq!(response.notes.len(), 1);
        assert!(response.notes[0].starts_with("Note: WARNING: AI output count (1) does not match original data rows (3)"));
        assert!(response.ai_response.starts_with("* Tools\n\nNote: WARNING"));
        assert!(response.has_artifact());

        let loaded = xlsx::read_table(&path, None).unwrap();
        assert_eq!(loaded.table.get(1, "Sector"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_append_sheet_writes_results_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let model = StubModel::replying("* Acme\n* Globex");

        let response = process(&request(&path, OutputMode::AppendSheet), &options(dir.path()), &model).unwrap();
        assert!(response.has_artifact());
        assert_eq!(xlsx::sheet_names(&path).unwrap(), vec!["Data", "Other", "AI_Results"]);

        let results = xlsx::read_table(&path, Some("AI_Results")).unwrap();
        assert_eq!(results.table.columns(), &["AI_Processed_Result"]);
        assert_eq!(results.table.row_count(), 2);
        // Preview shows the source sheet
        assert_eq!(response.data_preview[0]["Company"], "Acme");
        assert_eq!(response.data_preview[0]["Revenue"], 10);
    }

    #[test]
    fn test_new_file_and_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let original = std::fs::read(&path).unwrap();

        let model = StubModel::replying("* Acme");
        let response = process(&request(&path, OutputMode::NewFile), &options(dir.path()), &model).unwrap();
        let written = PathBuf::from(response.output_path.unwrap());
        assert!(written.starts_with(dir.path().join("downloads")));
        assert_eq!(std::fs::read(&path).unwrap(), original);

        let model = StubModel::replying("I could not find any companies.");
        let response = process(&request(&path, OutputMode::NewFile), &options(dir.path()), &model).unwrap();
        assert!(response.items.is_empty());
        assert!(!response.has_artifact());
        assert_eq!(
            response.notes,
            vec!["Note: AI response could not be parsed into a list, unable to generate result Excel file."]
        );
    }

    #[test]
    fn test_model_failure_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let model = StubModel::failing(AskError::MissingKey("set SHEETPILOT_GEMINI_KEY".into()));

        let response = process(&request(&path, OutputMode::AppendSheet), &options(dir.path()), &model).unwrap();
        assert!(response.ai_response.starts_with("ERROR: API key not configured"));
        assert!(response.items.is_empty());
        assert!(!response.has_artifact());
        assert!(response.model_error.is_some());
        assert_eq!(xlsx::sheet_names(&path).unwrap(), vec!["Data", "Other"]);
    }

    #[test]
    fn test_persistence_error_for_legacy_format() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("companies.xls");
        let table = SourceTable::single_column("AI", &["a".to_string()]);

        let err = persist(
            &legacy,
            "Data",
            &OutputPolicy::AppendSheet,
            &options(dir.path()),
            MergeOutput::ResultTable(table),
        )
        .unwrap_err();
        assert!(err.contains("in-place update"));
        assert!(!legacy.exists());
    }

    #[test]
    fn test_validation_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let model = StubModel::replying("* x");

        let mut req = request(&path, OutputMode::AppendSheet);
        req.instruction = "   ".into();
        let err = process(&req, &options(dir.path()), &model).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInstruction));
        assert!(err.is_usage());

        let mut req = request(&path, OutputMode::AppendColumn);
        req.column = None;
        assert!(matches!(
            process(&req, &options(dir.path()), &model).unwrap_err(),
            PipelineError::MissingColumn
        ));

        let mut req = request(&path, OutputMode::AppendSheet);
        req.sheet = Some("Missing".into());
        let err = process(&req, &options(dir.path()), &model).unwrap_err();
        assert!(matches!(err, PipelineError::Read(IoError::SheetNotFound { .. })));
        assert!(!err.is_usage());

        assert!(model.prompts.borrow().is_empty());
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::default();
        settings.normalizer.replace_keywords = Some(vec!["custom".into()]);
        settings.normalizer.extra_keywords = vec!["more".into()];
        settings.output.result_column = "Answer".into();
        let options = PipelineOptions::from_settings(&settings);
        assert_eq!(options.normalizer.keywords(), &["custom", "more"]);
        assert_eq!(options.merger.result_column(), "Answer");
        assert_eq!(options.preview_rows, 5);
    }

    #[test]
    fn test_preview_records_keep_column_order() {
        let mut table = SourceTable::new(vec!["z".into(), "a".into()]).unwrap();
        table.push_row(vec![CellValue::Empty, CellValue::Bool(true)]).unwrap();
        let records = preview_records(&table);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(records[0]["z"], Value::Null);
        assert_eq!(records[0]["a"], true);
    }
}
