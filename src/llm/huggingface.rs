//! Hugging Face Inference API text-generation client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{truncate_at_stop, LlmClient, LlmError};
use crate::config::GenerationConfig;

/// Hosted text-generation endpoint (`inputs` + `parameters` request shape).
pub struct HuggingFaceEndpoint {
    client: reqwest::Client,
    endpoint_url: String,
    api_token: String,
    params: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Batch(Vec<Generation>),
    Single(Generation),
    Error { error: String },
}

impl HuggingFaceEndpoint {
    pub fn new(endpoint_url: String, api_token: String, params: GenerationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint_url,
            api_token,
            params,
        }
    }

    fn request_body(&self, prompt: &str, stop: &[String]) -> serde_json::Value {
        json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": self.params.max_new_tokens,
                "temperature": self.params.temperature,
                "top_p": self.params.top_p,
                "repetition_penalty": self.params.repetition_penalty,
                "do_sample": true,
                "return_full_text": false,
                "stop": stop,
            }
        })
    }
}

#[async_trait]
impl LlmClient for HuggingFaceEndpoint {
    async fn generate(&self, prompt: &str, stop: &[String]) -> Result<String, LlmError> {
        tracing::debug!(
            "Generating with prompt of {} chars against {}",
            prompt.len(),
            self.endpoint_url
        );

        let response = self
            .client
            .post(&self.endpoint_url)
            .bearer_auth(&self.api_token)
            .json(&self.request_body(prompt, stop))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = parse_generation(&body)?;
        Ok(truncate_at_stop(&text, stop))
    }
}

fn parse_generation(body: &str) -> Result<String, LlmError> {
    let parsed: GenerationResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Endpoint(format!("unexpected response body ({}): {}", e, body)))?;

    match parsed {
        GenerationResponse::Batch(generations) => generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or(LlmError::Empty),
        GenerationResponse::Single(g) => Ok(g.generated_text),
        GenerationResponse::Error { error } => Err(LlmError::Endpoint(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_and_single_responses() {
        assert_eq!(
            parse_generation(r#"[{"generated_text": "Final Answer: hi"}]"#).unwrap(),
            "Final Answer: hi"
        );
        assert_eq!(
            parse_generation(r#"{"generated_text": "Thought: ok"}"#).unwrap(),
            "Thought: ok"
        );
    }

    #[test]
    fn maps_error_bodies() {
        let err = parse_generation(r#"{"error": "Model is currently loading", "estimated_time": 20.0}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::Endpoint(ref m) if m.contains("loading")));
        assert!(matches!(parse_generation("[]"), Err(LlmError::Empty)));
        assert!(matches!(parse_generation("<html>"), Err(LlmError::Endpoint(_))));
    }

    #[test]
    fn request_body_carries_sampling_parameters() {
        let endpoint = HuggingFaceEndpoint::new(
            "http://localhost/model".to_string(),
            "token".to_string(),
            GenerationConfig::default(),
        );
        let body = endpoint.request_body("Question: hi", &["\nObservation".to_string()]);
        assert_eq!(body["inputs"], "Question: hi");
        assert_eq!(body["parameters"]["max_new_tokens"], 1024);
        assert_eq!(body["parameters"]["return_full_text"], false);
        assert_eq!(body["parameters"]["stop"][0], "\nObservation");
    }
}
