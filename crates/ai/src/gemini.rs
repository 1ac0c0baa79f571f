// Google Gemini (generateContent REST API)

use serde_json::json;

use crate::client::{nested_error_message, non_empty, AskError, HttpClient, ModelClient};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self, AskError> {
        Ok(Self {
            client: HttpClient::new(timeout_secs, nested_error_message)?,
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
            temperature: None,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if let Some(t) = self.temperature {
            body["generationConfig"] = json!({ "temperature": t });
        }
        body
    }
}

impl ModelClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn generate(&self, prompt: &str) -> Result<String, AskError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = self.client.post_json(
            &url,
            &[("x-goog-api-key", self.api_key.as_str())],
            &self.request_body(prompt),
        )?;
        non_empty(response_text(&body))
    }
}

/// Text of the first candidate, all parts joined.
fn response_text(body: &serde_json::Value) -> String {
    body["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}
