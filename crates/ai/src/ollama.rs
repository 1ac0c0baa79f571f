// Local models through Ollama's /api/generate

use serde_json::json;

use crate::client::{non_empty, AskError, HttpClient, ModelClient};

pub struct OllamaClient {
    client: HttpClient,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub fn new(endpoint: String, model: String, timeout_secs: u64) -> Result<Self, AskError> {
        Ok(Self {
            client: HttpClient::new(timeout_secs, ollama_error)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Ollama reports errors as `{"error": "..."}`.
fn ollama_error(body: &serde_json::Value) -> Option<String> {
    body["error"].as_str().map(str::to_string)
}

impl ModelClient for OllamaClient {
    fn provider(&self) -> &str {
        "local"
    }

    fn generate(&self, prompt: &str) -> Result<String, AskError> {
        let mut request = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            request["options"] = json!({ "temperature": t });
        }

        let url = format!("{}/api/generate", self.endpoint);
        let body = self.client.post_json(&url, &[], &request)?;
        non_empty(body["response"].as_str().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_generate_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(serde_json::json!({
                "model": "llama3:8b", "response": "* local", "done": true
            }));
        });

        let client = OllamaClient::new(server.base_url(), "llama3:8b".into(), 5).unwrap();
        assert_eq!(client.generate("p").unwrap(), "* local");
        mock.assert();
    }

    #[test]
    fn test_generate_model_missing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(404).json_body(serde_json::json!({ "error": "model 'x' not found" }));
        });

        let client = OllamaClient::new(server.base_url(), "x".into(), 5).unwrap();
        assert_eq!(
            client.generate("p").unwrap_err(),
            AskError::ApiError { status: 404, message: "model 'x' not found".into() }
        );
    }

    #[test]
    fn test_connection_refused() {
        // Port 9 (discard) is not served locally.
        let client = OllamaClient::new("http://127.0.0.1:9".into(), "m".into(), 2).unwrap();
        let err = client.generate("p").unwrap_err();
        assert!(matches!(err, AskError::NetworkError(_) | AskError::Timeout(_)));
    }
}
