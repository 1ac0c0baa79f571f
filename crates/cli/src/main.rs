// SheetPilot CLI - natural-language instructions over spreadsheets

mod exit_codes;

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sheetpilot_ai::{client_or_unavailable, ModelClient, ReplayClient};
use sheetpilot_cli::pipeline::{self, OutputMode, PipelineError, PipelineOptions, ProcessRequest};
use sheetpilot_config::ai::{AIConfigStatus, AIDiagnostics, ResolvedAIConfig};
use sheetpilot_config::settings::Settings;
use sheetpilot_io::{xlsx, IoError};
use tracing_subscriber::EnvFilter;

use exit_codes::{
    EXIT_AI_CONFIG, EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_ERROR, EXIT_INPUT,
    EXIT_PROCESS_MODEL, EXIT_PROCESS_NO_ARTIFACT, EXIT_SUCCESS, EXIT_USAGE,
};

/// Log filter override (falls back to RUST_LOG)
const LOG_ENV: &str = "SHEETPILOT_LOG";

#[derive(Parser)]
#[command(name = "sheetpilot")]
#[command(about = "Run natural-language instructions over spreadsheet data with a generative model")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a sheet and an instruction to the model and write the results back
    #[command(after_help = "\
Examples:
  sheetpilot process leads.xlsx -i 'Extract the company names from column C'
  sheetpilot process leads.xlsx -i 'Classify each row by industry' --mode append-column --column Industry
  sheetpilot process leads.xlsx -i 'List unique cities' --sheet 2 --mode new-file --json
  sheetpilot process leads.xlsx -i 'Summarize' --response-file captured.txt")]
    Process {
        /// Source workbook (.xlsx, .xlsm, .xls, .xlsb, .ods)
        file: PathBuf,

        /// Instruction for the model
        #[arg(long, short = 'i')]
        instruction: String,

        /// Sheet name or 1-based position (default: first sheet)
        #[arg(long, short = 's')]
        sheet: Option<String>,

        /// Where results go
        #[arg(long, short = 'm', value_enum, default_value_t = OutputMode::AppendSheet)]
        mode: OutputMode,

        /// New column name (required for append-column)
        #[arg(long, short = 'c')]
        column: Option<String>,

        /// Directory for new-file results (overrides output.directory)
        #[arg(long, env = "SHEETPILOT_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Use a captured model response instead of calling the provider
        #[arg(long, value_name = "PATH")]
        response_file: Option<PathBuf>,

        /// Print the response as a single JSON object
        #[arg(long)]
        json: bool,
    },

    /// List the sheets of a workbook in order
    Sheets {
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract list items from model output (file or stdin)
    #[command(after_help = "\
Examples:
  sheetpilot normalize captured.txt
  pbpaste | sheetpilot normalize --json")]
    Normalize {
        /// Text file to read; omit or pass '-' for stdin
        input: Option<PathBuf>,

        /// Output as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// AI provider configuration
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Show the resolved AI configuration and whether it is usable
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  sheetpilot-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  sheetpilot-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Process {
            file,
            instruction,
            sheet,
            mode,
            column,
            output_dir,
            response_file,
            json,
        } => cmd_process(file, instruction, sheet, mode, column, output_dir, response_file, json),
        Commands::Sheets { file, json } => cmd_sheets(&file, json),
        Commands::Normalize { input, json } => cmd_normalize(input, json),
        Commands::Ai { command } => match command {
            AiCommands::Doctor { json } => cmd_ai_doctor(json),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr; stdout carries only the command result.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => std::env::var(LOG_ENV)
            .ok()
            .and_then(|v| EnvFilter::try_new(v).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose > 1)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn workbook(err: IoError, path: &Path) -> Self {
        let hint = match &err {
            IoError::SheetNotFound { .. } => Some(format!("run `sheetpilot sheets {}` to list sheets", path.display())),
            IoError::UnsupportedFormat { .. } => {
                Some("supported formats: .xlsx, .xlsm, .xls, .xlsb, .ods".to_string())
            }
            _ => None,
        };
        let code = if err.is_input_error() { EXIT_INPUT } else { EXIT_ERROR };
        Self { code, message: err.to_string(), hint }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingInstruction => {
                CliError::args(err.to_string()).with_hint("pass the instruction with --instruction")
            }
            PipelineError::MissingColumn => {
                CliError::args(err.to_string()).with_hint("append-column needs --column <NAME>")
            }
            PipelineError::Read(e) => {
                let code = if e.is_input_error() { EXIT_INPUT } else { EXIT_ERROR };
                CliError { code, message: e.to_string(), hint: None }
            }
            PipelineError::Merge(e) => CliError::io(e.to_string()),
        }
    }
}

// ============================================================================
// process
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_process(
    file: PathBuf,
    instruction: String,
    sheet: Option<String>,
    mode: OutputMode,
    column: Option<String>,
    output_dir: Option<PathBuf>,
    response_file: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let settings = Settings::load();
    let mut options = PipelineOptions::from_settings(&settings);
    if let Some(dir) = output_dir {
        options.output_dir = dir;
    }

    let model: Box<dyn ModelClient> = match response_file {
        Some(path) => Box::new(ReplayClient::new(path)),
        None => client_or_unavailable(&ResolvedAIConfig::from_settings(&settings.ai)),
    };

    let request = ProcessRequest { path: file.clone(), instruction, sheet, mode, column };
    let response = pipeline::process(&request, &options, model.as_ref()).map_err(|e| match e {
        PipelineError::Read(io_err) => CliError::workbook(io_err, &file),
        other => CliError::from(other),
    })?;

    if json {
        let out = serde_json::to_string_pretty(&response).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", out);
    } else {
        println!("{}", response.ai_response);
        println!();
        match &response.output_path {
            Some(path) => println!("Results written to {}", path),
            None => println!("No result file was produced."),
        }
    }

    if let Some(err) = &response.model_error {
        let hint = if err.is_configuration() { Some("run `sheetpilot ai doctor`".to_string()) } else { None };
        return Err(CliError { code: EXIT_PROCESS_MODEL, message: format!("model call failed: {}", err), hint });
    }
    if !response.has_artifact() {
        return Err(CliError {
            code: EXIT_PROCESS_NO_ARTIFACT,
            message: "no result was written".to_string(),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// sheets
// ============================================================================

fn cmd_sheets(file: &Path, json: bool) -> Result<(), CliError> {
    let names = xlsx::sheet_names(file).map_err(|e| CliError::workbook(e, file))?;

    if json {
        let sheets: Vec<serde_json::Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| serde_json::json!({ "index": i + 1, "name": name }))
            .collect();
        let out = serde_json::json!({
            "file": file.display().to_string(),
            "sheets": sheets,
        });
        println!("{}", serde_json::to_string_pretty(&out).map_err(|e| CliError::io(e.to_string()))?);
    } else {
        for (i, name) in names.iter().enumerate() {
            println!("{:>3}  {}", i + 1, name);
        }
    }
    Ok(())
}

// ============================================================================
// normalize
// ============================================================================

fn cmd_normalize(input: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let text = match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .map_err(|e| CliError::input(format!("{}: {}", path.display(), e)))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::input(format!("stdin: {}", e)))?;
            buf
        }
    };

    let options = PipelineOptions::from_settings(&Settings::load());
    let items = options.normalizer.normalize(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&items).map_err(|e| CliError::io(e.to_string()))?);
    } else {
        for item in &items {
            println!("{}", item);
        }
    }
    Ok(())
}

// ============================================================================
// ai doctor
// ============================================================================

fn cmd_ai_doctor(json: bool) -> Result<(), CliError> {
    let path = Settings::config_path();
    let settings = if path.exists() {
        Settings::load_from(&path).map_err(|e| CliError {
            code: EXIT_AI_CONFIG,
            message: e,
            hint: Some("fix or remove the settings file".to_string()),
        })?
    } else {
        Settings::default()
    };

    let config = ResolvedAIConfig::from_settings(&settings.ai);
    let diag = AIDiagnostics::from_resolved(&config);

    if json {
        let out = serde_json::to_string_pretty(&diag.to_json()).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", out);
    } else {
        print!("{}", diag);
        match config.status {
            AIConfigStatus::Disabled => {
                println!();
                println!("AI is disabled. To enable:");
                println!("  Set ai.provider in {}", diag.config_path);
            }
            AIConfigStatus::MissingKey => {
                println!();
                println!(
                    "Fix: set {} or store key in keychain",
                    sheetpilot_config::ai::env_var_name(config.provider_name())
                );
            }
            AIConfigStatus::Ready => {}
        }
    }

    match config.status {
        AIConfigStatus::Disabled => {
            Err(CliError { code: EXIT_AI_DISABLED, message: "AI is disabled".to_string(), hint: None })
        }
        AIConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: format!(
                "AI misconfigured: {}",
                config.blocking_reason.unwrap_or_else(|| "missing_api_key".to_string())
            ),
            hint: None,
        }),
        AIConfigStatus::Ready => Ok(()),
    }
}
