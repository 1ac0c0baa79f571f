// Application settings
// Loaded from ~/.config/sheetpilot/settings.json (or $SHEETPILOT_CONFIG)

use serde::{Deserialize, Serialize};
use sheetpilot_engine::merge::{RESULTS_SHEET, RESULT_COLUMN};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the settings file location
pub const CONFIG_ENV: &str = "SHEETPILOT_CONFIG";

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// AI features disabled (default)
    #[default]
    None,
    /// Local model via Ollama
    Local,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
    /// Google Gemini API
    Gemini,
}

impl AIProvider {
    /// Returns true if AI features are enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    /// Cloud providers authenticate with an API key
    pub fn needs_api_key(&self) -> bool {
        matches!(self, AIProvider::OpenAI | AIProvider::Gemini)
    }

    /// Lowercase identifier, as written in settings.json
    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::Local => "local",
            AIProvider::OpenAI => "openai",
            AIProvider::Gemini => "gemini",
        }
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Local => "llama3:8b",
            AIProvider::OpenAI => "gpt-4o",
            AIProvider::Gemini => "gemini-2.0-flash",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AISettings {
    /// Selected AI provider
    pub provider: AIProvider,

    /// Model identifier (provider-specific, empty = provider default)
    pub model: String,

    /// Custom endpoint for Local provider (Ollama URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::None,
            model: String::new(),
            endpoint: None,
            timeout_secs: 60,
            temperature: None,
        }
    }
}

impl AISettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            self.model.trim()
        }
    }

    /// Get the effective endpoint for Local provider
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or("http://localhost:11434")
    }
}

/// Where and how results are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputSettings {
    /// Destination of standalone result files (relative paths resolve
    /// against the working directory)
    pub directory: PathBuf,
    /// Sheet receiving results when appending a sheet
    pub results_sheet: String,
    /// Header of the one-column results table
    pub result_column: String,
    /// Source rows echoed back in the response preview
    pub preview_rows: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("downloads"),
            results_sheet: RESULTS_SHEET.to_string(),
            result_column: RESULT_COLUMN.to_string(),
            preview_rows: 5,
        }
    }
}

/// Response normalizer tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NormalizerSettings {
    /// Phrases added to the built-in explanatory filter list
    pub extra_keywords: Vec<String>,
    /// Replaces the built-in list entirely when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ai: AISettings,
    pub output: OutputSettings,
    pub normalizer: NormalizerSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetpilot");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {}", path.display(), e))?;
        Self::parse(&contents).map_err(|e| format!("Error parsing {}: {}", path.display(), e))
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        if cleaned.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Save current settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.ai.provider, AIProvider::None);
        assert_eq!(settings.ai.timeout_secs, 60);
        assert_eq!(settings.output.directory, PathBuf::from("downloads"));
        assert_eq!(settings.output.results_sheet, "AI_Results");
        assert_eq!(settings.output.result_column, "AI_Processed_Result");
        assert_eq!(settings.output.preview_rows, 5);
        assert!(settings.normalizer.extra_keywords.is_empty());
    }

    #[test]
    fn test_parse_with_comments_and_partial_sections() {
        let json = r#"{
    // AI provider
    "ai": {
        "provider": "gemini",
        "timeoutSecs": 15
    },
    // Output
    "output": { "previewRows": 3 },
    "normalizer": { "extraKeywords": ["in summary"] }
}"#;
        let settings = Settings::parse(json).unwrap();
        assert_eq!(settings.ai.provider, AIProvider::Gemini);
        assert_eq!(settings.ai.timeout_secs, 15);
        assert_eq!(settings.ai.effective_model(), "gemini-2.0-flash");
        assert_eq!(settings.output.preview_rows, 3);
        assert_eq!(settings.output.results_sheet, "AI_Results");
        assert_eq!(settings.normalizer.extra_keywords, vec!["in summary"]);
        assert!(settings.normalizer.replace_keywords.is_none());
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert_eq!(Settings::parse("// nothing here\n").unwrap(), Settings::default());
        assert!(Settings::parse("{ \"ai\": { \"provider\": \"skynet\" } }").is_err());
    }

    #[test]
    fn test_effective_model_and_endpoint() {
        let mut ai = AISettings { provider: AIProvider::OpenAI, ..Default::default() };
        assert_eq!(ai.effective_model(), "gpt-4o");
        ai.model = " gpt-4o-mini ".to_string();
        assert_eq!(ai.effective_model(), "gpt-4o-mini");
        assert_eq!(ai.effective_endpoint(), "http://localhost:11434");
    }

    #[test]
    fn test_provider_names_round_trip() {
        for provider in [AIProvider::None, AIProvider::Local, AIProvider::OpenAI, AIProvider::Gemini] {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.name()));
        }
        assert!(AIProvider::Gemini.needs_api_key());
        assert!(!AIProvider::Local.needs_api_key());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.ai.provider = AIProvider::Local;
        settings.output.directory = PathBuf::from("/tmp/results");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"resultsSheet\""));
    }
}
