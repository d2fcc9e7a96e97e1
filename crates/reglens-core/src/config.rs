use std::time::Duration;

/// Pipeline configuration.
///
/// Every limit the pipeline enforces lives here; callers construct one
/// (usually via [`PipelineConfig::from_env`]) and pass it through. The
/// defaults match the reference deployment against a local Ollama server.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the generation endpoint (e.g. "http://localhost:11434").
    pub base_url: String,
    /// Model identifier passed through uninterpreted to the provider.
    pub default_model: String,
    /// Per-attempt request timeout. Not cumulative across retries.
    pub request_timeout: Duration,
    /// Number of retries after the first attempt on content-level failures.
    pub max_retries: u32,
    /// Maximum characters accepted per input document before truncation.
    pub max_input_chars: usize,
    /// Maximum combined characters of both documents (warning only).
    pub max_combined_chars: usize,
    /// Maximum number of change records emitted per analysis.
    pub max_change_records: usize,
    /// Character budget for each change record text field.
    pub excerpt_budget: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "mistral:latest".to_string(),
            request_timeout: Duration::from_secs(60),
            max_retries: 1,
            max_input_chars: 8_000,
            max_combined_chars: 15_000,
            max_change_records: 10,
            excerpt_budget: 300,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables:
    /// - `REGLENS_BASE_URL`
    /// - `REGLENS_MODEL`
    /// - `REGLENS_TIMEOUT_SECS`
    /// - `REGLENS_MAX_RETRIES`
    /// - `REGLENS_MAX_INPUT_CHARS`
    /// - `REGLENS_MAX_COMBINED_CHARS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("REGLENS_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let default_model =
            std::env::var("REGLENS_MODEL").unwrap_or(defaults.default_model);

        let request_timeout = std::env::var("REGLENS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let max_retries = std::env::var("REGLENS_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_retries);

        let max_input_chars = std::env::var("REGLENS_MAX_INPUT_CHARS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_input_chars);

        let max_combined_chars = std::env::var("REGLENS_MAX_COMBINED_CHARS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_combined_chars);

        Self {
            base_url,
            default_model,
            request_timeout,
            max_retries,
            max_input_chars,
            max_combined_chars,
            max_change_records: defaults.max_change_records,
            excerpt_budget: defaults.excerpt_budget,
        }
    }
}
