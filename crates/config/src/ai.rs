// AI configuration and secrets management
//
// API keys are looked up in:
// 1. System keychain (preferred)
// 2. Environment variables (fallback for CI/headless)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::settings::{AIProvider, AISettings, Settings};

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "sheetpilot";

/// Accepted in addition to SHEETPILOT_GEMINI_KEY
const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from environment variable
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Get the environment variable name for a provider
pub fn env_var_name(provider: &str) -> String {
    format!("SHEETPILOT_{}_KEY", provider.to_uppercase())
}

/// Get the keychain account name for a provider
fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

/// Environment variables checked for a provider, in order
fn env_var_candidates(provider: &str) -> Vec<String> {
    let mut names = vec![env_var_name(provider)];
    if provider.eq_ignore_ascii_case("gemini") {
        names.push(GOOGLE_API_KEY_ENV.to_string());
    }
    names
}

/// Get an API key for the specified provider
///
/// Checks in order:
/// 1. System keychain
/// 2. Environment variable (SHEETPILOT_OPENAI_KEY, etc.; GOOGLE_API_KEY for gemini)
pub fn get_api_key(provider: &str) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    for name in env_var_candidates(provider) {
        if let Ok(key) = env::var(&name) {
            if !key.trim().is_empty() {
                return KeyLookup {
                    key: Some(key.trim().to_string()),
                    source: KeySource::Environment,
                };
            }
        }
    }

    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account("probe")).is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

// ============================================================================
// Resolved AI Configuration (single source of truth)
// ============================================================================

/// The effective AI configuration, fully resolved from settings and the
/// key store.
#[derive(Debug, Clone)]
pub struct ResolvedAIConfig {
    pub provider: AIProvider,
    /// Effective model (resolved from settings or provider default)
    pub model: String,
    /// Endpoint for Local provider (resolved with default)
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    /// API key (if available and provider needs one)
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub status: AIConfigStatus,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

/// Status of the AI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AIConfigStatus {
    /// AI is disabled (provider = None)
    Disabled,
    /// Configuration is complete
    Ready,
    /// Provider is configured but API key is missing
    MissingKey,
}

impl AIConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl ResolvedAIConfig {
    /// Resolve the effective AI configuration from settings.
    pub fn from_settings(settings: &AISettings) -> Self {
        Self::resolve(settings, get_api_key)
    }

    /// Load settings and resolve in one call
    pub fn load() -> Self {
        Self::from_settings(&Settings::load().ai)
    }

    fn resolve(settings: &AISettings, lookup_key: impl Fn(&str) -> KeyLookup) -> Self {
        let provider = settings.provider;

        if !provider.is_enabled() {
            return Self {
                provider,
                model: String::new(),
                endpoint: None,
                timeout_secs: settings.timeout_secs,
                temperature: settings.temperature,
                api_key: None,
                key_source: KeySource::None,
                status: AIConfigStatus::Disabled,
                blocking_reason: Some("provider=none".to_string()),
            };
        }

        let model = settings.effective_model().to_string();

        let endpoint = if matches!(provider, AIProvider::Local) {
            Some(settings.effective_endpoint().to_string())
        } else {
            settings.endpoint.clone()
        };

        let (api_key, key_source, status, blocking_reason) = if provider.needs_api_key() {
            let lookup = lookup_key(provider.name());
            match lookup.key {
                Some(key) => (Some(key), lookup.source, AIConfigStatus::Ready, None),
                None => (
                    None,
                    KeySource::None,
                    AIConfigStatus::MissingKey,
                    Some(format!(
                        "No API key found. Set via keychain or {}",
                        env_var_candidates(provider.name()).join(" / ")
                    )),
                ),
            }
        } else {
            // Local provider doesn't need a key
            (None, KeySource::None, AIConfigStatus::Ready, None)
        };

        Self {
            provider,
            model,
            endpoint,
            timeout_secs: settings.timeout_secs,
            temperature: settings.temperature,
            api_key,
            key_source,
            status,
            blocking_reason,
        }
    }

    /// Provider display name
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

// ============================================================================
// Diagnostics (for CLI doctor and debugging)
// ============================================================================

/// Diagnostic information about AI configuration
#[derive(Debug)]
pub struct AIDiagnostics {
    pub provider: String,
    pub model: String,
    pub status: AIConfigStatus,
    pub blocking_reason: Option<String>,
    pub key_present: bool,
    pub key_source: KeySource,
    pub keychain_available: bool,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub config_path: String,
}

impl AIDiagnostics {
    pub fn from_resolved(config: &ResolvedAIConfig) -> Self {
        Self {
            provider: config.provider.name().to_string(),
            model: config.model.clone(),
            status: config.status,
            blocking_reason: config.blocking_reason.clone(),
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            keychain_available: keychain_available(),
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
            config_path: Settings::config_path_display(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "schema_version": 1,
            "status": self.status.as_str(),
            "blocking_reason": self.blocking_reason,
            "enabled": self.status != AIConfigStatus::Disabled,
            "provider": self.provider,
            "model_effective": if self.model.is_empty() { "(none)" } else { self.model.as_str() },
            "key": if self.key_present { "present" } else { "missing" },
            "key_source": self.key_source.as_str(),
            "keychain": if self.keychain_available { "ok" } else { "unavailable" },
            "endpoint": self.endpoint,
            "timeout_secs": self.timeout_secs,
            "config_path": self.config_path,
        })
    }
}

impl std::fmt::Display for AIDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "AI Doctor")?;
        writeln!(f, "---------")?;
        writeln!(f, "status:          {}", self.status.as_str())?;
        if let Some(reason) = &self.blocking_reason {
            writeln!(f, "blocking_reason: {}", reason)?;
        }
        writeln!(f, "provider:        {}", self.provider)?;
        writeln!(f, "model_effective: {}", if self.model.is_empty() { "(none)" } else { &self.model })?;
        writeln!(f, "key:             {}", if self.key_present { "present" } else { "missing" })?;
        writeln!(f, "key_source:      {}", self.key_source.as_str())?;
        writeln!(f, "keychain:        {}", if self.keychain_available { "ok" } else { "unavailable" })?;
        if let Some(endpoint) = &self.endpoint {
            writeln!(f, "endpoint:        {}", endpoint)?;
        }
        writeln!(f, "timeout_secs:    {}", self.timeout_secs)?;
        writeln!(f, "config:          {}", self.config_path)?;
        Ok(())
    }
}
