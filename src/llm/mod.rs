//! Text-generation clients.
//!
//! The agent talks to the model through [`LlmClient`], a plain
//! prompt-in/completion-out interface. [`HuggingFaceEndpoint`] is the hosted
//! implementation.

mod huggingface;

use async_trait::async_trait;
use thiserror::Error;

pub use huggingface::HuggingFaceEndpoint;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model endpoint error: {0}")]
    Endpoint(String),

    #[error("model endpoint returned no generations")]
    Empty,
}

/// A text-completion model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt`, stopping at the first of `stop`.
    async fn generate(&self, prompt: &str, stop: &[String]) -> Result<String, LlmError>;
}

/// Cut `text` at the earliest occurrence of any stop sequence.
pub fn truncate_at_stop(text: &str, stop: &[String]) -> String {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    text[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_earliest_stop() {
        let stop = vec!["\nObservation".to_string(), "Human:".to_string()];
        let text = "Action: x\nAction Input: y\nObservation: made up\nHuman: hi";
        assert_eq!(truncate_at_stop(text, &stop), "Action: x\nAction Input: y");
    }

    #[test]
    fn no_stop_keeps_text() {
        assert_eq!(truncate_at_stop("Final Answer: ok", &[]), "Final Answer: ok");
        assert_eq!(truncate_at_stop("abc", &[String::new()]), "abc");
    }
}
