// Model client seam and shared HTTP plumbing
//
// Providers own their endpoint, auth and body shape. They hand a JSON body
// to `HttpClient::post_json`, which maps transport failures and non-2xx
// statuses to AskError.

use std::time::Duration;

use sheetpilot_config::ai::ResolvedAIConfig;
use sheetpilot_config::settings::AIProvider;

use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;
use crate::openai::OpenAIClient;

const USER_AGENT: &str = concat!("sheetpilot/", env!("CARGO_PKG_VERSION"));

/// Error from a model call
#[derive(Debug, Clone, PartialEq)]
pub enum AskError {
    /// Provider disabled or not configured
    NotConfigured(String),
    /// API key missing
    MissingKey(String),
    /// Network error
    NetworkError(String),
    /// Request exceeded the configured timeout
    Timeout(u64),
    /// API error response
    ApiError { status: u16, message: String },
    /// Failed to parse response
    ParseError(String),
    /// Response carried no text
    EmptyResponse,
    /// Captured response could not be read
    Replay(String),
}

impl AskError {
    /// The provider cannot be used at all (as opposed to a failed call).
    pub fn is_configuration(&self) -> bool {
        matches!(self, AskError::NotConfigured(_) | AskError::MissingKey(_))
    }
}

impl std::fmt::Display for AskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AskError::NotConfigured(msg) => write!(f, "AI not configured: {}", msg),
            AskError::MissingKey(msg) => write!(f, "API key not configured: {}", msg),
            AskError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AskError::Timeout(secs) => write!(f, "Model request timed out after {}s", secs),
            AskError::ApiError { status, message } => write!(f, "API error ({}): {}", status, message),
            AskError::ParseError(msg) => write!(f, "Failed to parse response: {}", msg),
            AskError::EmptyResponse => write!(f, "Model returned no usable content"),
            AskError::Replay(msg) => write!(f, "Cannot read captured response: {}", msg),
        }
    }
}

impl std::error::Error for AskError {}

/// A generative model: prompt in, free text out.
pub trait ModelClient {
    /// Provider identifier for logs and reports
    fn provider(&self) -> &str;

    /// Blocking call; returns the model's text response.
    fn generate(&self, prompt: &str) -> Result<String, AskError>;
}

/// Build the client for the resolved configuration.
pub fn client_for(config: &ResolvedAIConfig) -> Result<Box<dyn ModelClient>, AskError> {
    let api_key = || {
        config.api_key.clone().ok_or_else(|| {
            AskError::MissingKey(
                config
                    .blocking_reason
                    .clone()
                    .unwrap_or_else(|| format!("no key for {}", config.provider_name())),
            )
        })
    };

    let client: Box<dyn ModelClient> = match config.provider {
        AIProvider::None => {
            return Err(AskError::NotConfigured("AI is disabled (ai.provider = none)".to_string()));
        }
        AIProvider::Gemini => {
            let mut client = GeminiClient::new(api_key()?, config.model.clone(), config.timeout_secs)?;
            if let Some(endpoint) = &config.endpoint {
                client = client.with_base_url(endpoint.clone());
            }
            Box::new(client.with_temperature(config.temperature))
        }
        AIProvider::OpenAI => {
            let mut client = OpenAIClient::new(api_key()?, config.model.clone(), config.timeout_secs)?;
            if let Some(endpoint) = &config.endpoint {
                client = client.with_base_url(endpoint.clone());
            }
            Box::new(client.with_temperature(config.temperature))
        }
        AIProvider::Local => {
            let endpoint = config
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            let client = OllamaClient::new(endpoint, config.model.clone(), config.timeout_secs)?;
            Box::new(client.with_temperature(config.temperature))
        }
    };

    log::debug!("using {} model {}", client.provider(), config.model);
    Ok(client)
}

/// Stands in for a provider that cannot be used, so a request still runs
/// through normalization and reports the failure in its response.
pub struct UnavailableClient {
    error: AskError,
}

impl UnavailableClient {
    pub fn new(error: AskError) -> Self {
        Self { error }
    }
}

impl ModelClient for UnavailableClient {
    fn provider(&self) -> &str {
        "unavailable"
    }

    fn generate(&self, _prompt: &str) -> Result<String, AskError> {
        Err(self.error.clone())
    }
}

/// `client_for`, falling back to an `UnavailableClient` carrying the error.
pub fn client_or_unavailable(config: &ResolvedAIConfig) -> Box<dyn ModelClient> {
    client_for(config).unwrap_or_else(|e| {
        log::warn!("{}", e);
        Box::new(UnavailableClient::new(e))
    })
}

/// Blocking HTTP client with a per-request timeout and provider-specific
/// error message extraction.
pub(crate) struct HttpClient {
    http: reqwest::blocking::Client,
    timeout_secs: u64,
    error_extractor: fn(&serde_json::Value) -> Option<String>,
}

impl HttpClient {
    pub(crate) fn new(
        timeout_secs: u64,
        error_extractor: fn(&serde_json::Value) -> Option<String>,
    ) -> Result<Self, AskError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AskError::NetworkError(e.to_string()))?;

        Ok(Self { http, timeout_secs, error_extractor })
    }

    /// POST a JSON body and return the parsed JSON response.
    pub(crate) fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, AskError> {
        let mut request = self.http.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                AskError::Timeout(self.timeout_secs)
            } else {
                AskError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| AskError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|body| (self.error_extractor)(&body))
                .unwrap_or(text);
            return Err(AskError::ApiError { status: status.as_u16(), message });
        }

        serde_json::from_str(&text).map_err(|e| AskError::ParseError(e.to_string()))
    }
}

/// `{"error": {"message": "..."}}`, shared by the Gemini and OpenAI APIs
pub(crate) fn nested_error_message(body: &serde_json::Value) -> Option<String> {
    body["error"]["message"].as_str().map(str::to_string)
}

/// Empty or whitespace-only text counts as no response.
pub(crate) fn non_empty(text: String) -> Result<String, AskError> {
    if text.trim().is_empty() {
        Err(AskError::EmptyResponse)
    } else {
        Ok(text)
    }
}
