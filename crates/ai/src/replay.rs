// Captured responses
//
// Returns a model response saved earlier instead of calling a provider.
// Used for offline runs and for tuning the normalizer against real output.

use std::path::PathBuf;

use crate::client::{non_empty, AskError, ModelClient};

pub struct ReplayClient {
    path: PathBuf,
}

impl ReplayClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelClient for ReplayClient {
    fn provider(&self) -> &str {
        "replay"
    }

    fn generate(&self, _prompt: &str) -> Result<String, AskError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| AskError::Replay(format!("{}: {}", self.path.display(), e)))?;
        non_empty(text)
    }
}
