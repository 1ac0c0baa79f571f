// OpenAI chat completions

use serde_json::json;

use crate::client::{nested_error_message, non_empty, AskError, HttpClient, ModelClient};

const OPENAI_API_BASE: &str = "https://api.openai.com";

pub struct OpenAIClient {
    client: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self, AskError> {
        Ok(Self {
            client: HttpClient::new(timeout_secs, nested_error_message)?,
            api_key,
            model,
            base_url: OPENAI_API_BASE.to_string(),
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
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

impl ModelClient for OpenAIClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn generate(&self, prompt: &str) -> Result<String, AskError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let auth = format!("Bearer {}", self.api_key);
        let body = self
            .client
            .post_json(&url, &[("Authorization", auth.as_str())], &self.request_body(prompt))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        non_empty(content)
    }
}
