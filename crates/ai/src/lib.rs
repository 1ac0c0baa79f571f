// Generative model access
//
// `prompt` turns a table and an instruction into the request text;
// `client` defines the ModelClient seam and picks a provider from the
// resolved configuration.

pub mod client;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod replay;

pub use client::{client_for, client_or_unavailable, AskError, ModelClient, UnavailableClient};
pub use replay::ReplayClient;
pub use prompt::build_prompt;
