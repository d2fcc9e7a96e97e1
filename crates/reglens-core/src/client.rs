use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;

/// Failure taxonomy for a single generation attempt.
///
/// These are transport-level classifications: the retry orchestrator never
/// re-prompts on any of them, it maps them straight to an error result.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generation endpoint unreachable: {0}")]
    Connection(String),

    #[error("request timed out after {0} seconds; the model may be overloaded")]
    Timeout(u64),

    #[error("model '{0}' not found by the provider")]
    ModelNotFound(String),

    #[error("provider returned an unexpected response: {0}")]
    Protocol(String),
}

/// Client-measured metadata for a successful generation.
///
/// These values come from our side of the wire (plus provider-reported
/// token counts); they overwrite anything the model claims about itself.
#[derive(Debug, Clone)]
pub struct GenerationMetadata {
    pub model_used: String,
    pub token_count_input: Option<u64>,
    pub token_count_output: Option<u64>,
    pub duration_ms: u64,
}

/// A completed generation: the raw response text plus measured metadata.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub metadata: GenerationMetadata,
}

/// The seam between the pipeline and whichever hosted text-generation
/// service backs it. Implementations carry no retry logic; retries belong
/// to the pipeline driver.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        model: &str,
    ) -> Result<Generation, GenerateError>;
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

/// Client for the Ollama `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .user_agent("reglens")
            .build()
            .map_err(|e| GenerateError::Protocol(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            http,
        })
    }

    fn classify_transport_error(&self, err: reqwest::Error) -> GenerateError {
        if err.is_timeout() {
            GenerateError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() {
            GenerateError::Connection(format!(
                "no generation server answering at {}: {err}",
                self.base_url
            ))
        } else {
            GenerateError::Protocol(err.to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        model: &str,
    ) -> Result<Generation, GenerateError> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = OllamaRequest {
            model,
            prompt,
            system,
            stream: false,
            // Low temperature for consistent structured output.
            options: OllamaOptions {
                temperature: 0.1,
                num_predict: 4096,
            },
        };

        let started = Instant::now();
        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GenerateError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let body = read_limited_text(resp, 1024).await;
            return Err(GenerateError::Protocol(format!(
                "status {status}: {body}"
            )));
        }

        let parsed = resp
            .json::<OllamaResponse>()
            .await
            .map_err(|e| GenerateError::Protocol(format!("invalid response envelope: {e}")))?;

        let duration_ms = started.elapsed().as_millis() as u64;
        Ok(Generation {
            text: parsed.response,
            metadata: GenerationMetadata {
                model_used: model.to_string(),
                token_count_input: parsed.prompt_eval_count,
                token_count_output: parsed.eval_count,
                duration_ms,
            },
        })
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(_) => "<failed to read error body>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_shape() {
        let payload = OllamaRequest {
            model: "mistral:latest",
            prompt: "p",
            system: "s",
            stream: false,
            options: OllamaOptions {
                temperature: 0.1,
                num_predict: 4096,
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["model"], "mistral:latest");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 4096);
    }

    #[test]
    fn test_response_envelope_tolerates_missing_counts() {
        let parsed: OllamaResponse =
            serde_json::from_str(r#"{"response":"{\"ok\":1}"}"#).unwrap();
        assert_eq!(parsed.response, r#"{"ok":1}"#);
        assert!(parsed.prompt_eval_count.is_none());
        assert!(parsed.eval_count.is_none());
    }
}
