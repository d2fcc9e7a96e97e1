/// The analysis pipeline driver.
///
/// One invocation runs: normalize → segment → align/diff → compress for the
/// local change-record stage, and a bounded generate → extract → validate
/// loop for the LLM analysis. Content-level failures (unparsable output,
/// schema violations) are retried with an escalating-strictness prompt;
/// transport-level failures abort immediately since a different prompt
/// cannot fix a broken transport. Every path terminates in a well-formed
/// [`AnalysisOutcome`] — nothing propagates past this boundary.
use std::time::Instant;

use tracing::{info, warn};

use crate::client::{GenerateError, TextGenerator};
use crate::compress::compress_changes;
use crate::config::PipelineConfig;
use crate::diff::diff_sections;
use crate::model::{
    truncate_chars, AnalysisOutcome, AnalysisReport, ChangeRecord, ErrorReport, ErrorType,
};
use crate::normalize::split_paragraphs;
use crate::prompt::{build_strict_retry_prompt, build_user_prompt, SYSTEM_PROMPT};
use crate::segment::segment_paragraphs;
use crate::validate::{new_analysis_id, normalize_enum_casing, validate_analysis};

/// Characters of raw model output preserved on failure for diagnosis.
const RAW_OUTPUT_DIAGNOSTIC_CHARS: usize = 1000;

/// How many validation errors are echoed back in the retry prompt.
const RETRY_ERROR_LIMIT: usize = 3;

/// Why a single attempt failed without aborting the loop. The two classes
/// are retried identically but map to different terminal error types.
#[derive(Debug, Clone)]
enum AttemptFailure {
    /// No structured object could be recovered from the response text.
    Extraction,
    /// A structured object was recovered but violated the schema.
    Validation(Vec<String>),
}

impl AttemptFailure {
    fn description(&self) -> String {
        match self {
            Self::Extraction => "could not parse structured data from response".to_string(),
            Self::Validation(errors) => {
                let shown: Vec<&str> = errors
                    .iter()
                    .take(RETRY_ERROR_LIMIT)
                    .map(String::as_str)
                    .collect();
                format!("schema validation failed: {}", shown.join("; "))
            }
        }
    }

    fn terminal_error_type(&self) -> ErrorType {
        match self {
            Self::Extraction => ErrorType::InvalidJson,
            Self::Validation(_) => ErrorType::SchemaValidation,
        }
    }
}

/// Run the local diff/compression stage only: raw texts in, ranked change
/// records out. No network activity. Exposed for collaborators that skip
/// full LLM analysis (e.g. one-change-at-a-time task generation).
pub fn extract_change_records(
    old_text: &str,
    new_text: &str,
    config: &PipelineConfig,
) -> Vec<ChangeRecord> {
    let old = segment_paragraphs(&split_paragraphs(old_text));
    let new = segment_paragraphs(&split_paragraphs(new_text));
    let lines = diff_sections(&old, &new);
    compress_changes(&lines, config)
}

/// Run the complete analysis pipeline against `generator`.
///
/// Performs up to `1 + config.max_retries` generation attempts and always
/// returns exactly one of [`AnalysisReport`] or [`ErrorReport`].
pub async fn run_analysis(
    generator: &dyn TextGenerator,
    config: &PipelineConfig,
    old_text: &str,
    new_text: &str,
    model: &str,
) -> AnalysisOutcome {
    let analysis_id = new_analysis_id();
    let started = Instant::now();

    let combined = old_text.chars().count() + new_text.chars().count();
    if combined > config.max_combined_chars {
        warn!(
            combined,
            limit = config.max_combined_chars,
            "combined input exceeds configured limit"
        );
    }

    let mut last_failure: Option<AttemptFailure> = None;
    let mut last_raw: Option<String> = None;

    for attempt in 0..=config.max_retries {
        let is_retry = attempt > 0;
        let prompt = match &last_failure {
            None => build_user_prompt(old_text, new_text, &analysis_id),
            Some(failure) => {
                info!(attempt, "retrying with strict prompt");
                build_strict_retry_prompt(
                    old_text,
                    new_text,
                    &analysis_id,
                    &failure.description(),
                )
            }
        };

        let generation = match generator.generate(&prompt, SYSTEM_PROMPT, model).await {
            Ok(g) => g,
            Err(e) => return transport_failure(e, is_retry),
        };

        let Some(mut parsed) = extract_structured_logged(&generation.text) else {
            last_raw = Some(generation.text);
            last_failure = Some(AttemptFailure::Extraction);
            continue;
        };

        let errors = validate_analysis(&parsed);
        if !errors.is_empty() {
            warn!(
                attempt,
                error_count = errors.len(),
                first = %errors[0],
                "schema validation failed"
            );
            last_raw = Some(generation.text);
            last_failure = Some(AttemptFailure::Validation(errors));
            continue;
        }

        normalize_enum_casing(&mut parsed);
        let mut report: AnalysisReport = match serde_json::from_value(parsed) {
            Ok(report) => report,
            Err(e) => {
                // A validated value should always deserialize; treat any
                // residual mismatch as one more content failure.
                last_raw = Some(generation.text);
                last_failure =
                    Some(AttemptFailure::Validation(vec![format!("response: {e}")]));
                continue;
            }
        };

        // The generator's self-reported metadata is untrusted; replace it
        // with what we measured.
        report.metadata = crate::model::AnalysisMetadata {
            model_used: generation.metadata.model_used,
            token_count_input: generation.metadata.token_count_input,
            token_count_output: generation.metadata.token_count_output,
            processing_time_ms: Some(started.elapsed().as_millis() as u64),
        };

        info!(
            attempt,
            changes = report.changes.len(),
            tasks = report.suggested_tasks.len(),
            "analysis validated"
        );
        return AnalysisOutcome::Report(Box::new(report));
    }

    let failure = last_failure.unwrap_or(AttemptFailure::Extraction);
    AnalysisOutcome::Error(
        ErrorReport::new(failure.terminal_error_type(), failure.description())
            .with_raw_output(
                last_raw
                    .as_deref()
                    .map(|raw| truncate_chars(raw, RAW_OUTPUT_DIAGNOSTIC_CHARS)),
            )
            .with_retry_attempted(config.max_retries > 0),
    )
}

fn extract_structured_logged(raw: &str) -> Option<serde_json::Value> {
    let parsed = crate::extract::extract_structured(raw);
    if parsed.is_none() {
        warn!(
            response_chars = raw.chars().count(),
            "could not parse structured data from response"
        );
    }
    parsed
}

fn transport_failure(error: GenerateError, is_retry: bool) -> AnalysisOutcome {
    let error_type = match &error {
        GenerateError::Timeout(_) => ErrorType::Timeout,
        GenerateError::ModelNotFound(_) => ErrorType::ModelNotFound,
        // Protocol-class errors are unmodeled client-side failures; callers
        // treat them like an unreachable endpoint.
        GenerateError::Connection(_) | GenerateError::Protocol(_) => ErrorType::Connection,
    };
    warn!(error = %error, "generation transport failure, aborting retries");
    AnalysisOutcome::Error(
        ErrorReport::new(error_type, error.to_string()).with_retry_attempted(is_retry),
    )
}
