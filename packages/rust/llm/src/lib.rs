//! OpenRouter-backed collaborators for the docsmith pipeline.
//!
//! [`OpenRouterClient`] implements the core's `Extractor`, `Classifier` and
//! `TranslationBackend` traits over the OpenAI-compatible chat-completions API.
//! Transport failures are mapped onto the stage-specific error variants so the
//! pipeline can attribute them to the right record.

mod classify;
mod client;
mod extract;
mod json;
mod translate;

pub use client::{Completion, OpenRouterClient};

#[cfg(test)]
pub(crate) mod test_support {
    use docsmith_shared::OpenRouterConfig;
    use wiremock::MockServer;

    use crate::client::OpenRouterClient;

    pub fn client_for(server: &MockServer) -> OpenRouterClient {
        let config = OpenRouterConfig {
            base_url: format!("{}/api/v1/", server.uri()),
            ..OpenRouterConfig::default()
        };
        OpenRouterClient::new("test-key", &config).unwrap()
    }

    /// A chat-completions response body carrying `content`.
    pub fn completion_body(content: &str, tokens_in: u64, tokens_out: u64) -> serde_json::Value {
        serde_json::json!({
            "model": "test/model",
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": tokens_in, "completion_tokens": tokens_out}
        })
    }
}
