use serde::{Deserialize, Serialize};

/// Classification of a compressed textual change within one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// A compressed, typed representation of one detected change.
///
/// Exactly one of `{before, after}` or `{text}` is populated, selected by
/// `kind`: `Modified` carries `before`/`after`, `Added` and `Removed` carry
/// `text`. All text fields are truncated to the configured excerpt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Anchor key of the section this change belongs to.
    pub section: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ChangeRecord {
    /// The record's display text: `text` for additions/removals, the joined
    /// before/after excerpts for modifications. Used for ranking and dedup.
    pub fn display_text(&self) -> String {
        match self.kind {
            ChangeKind::Modified => format!(
                "{} {}",
                self.before.as_deref().unwrap_or(""),
                self.after.as_deref().unwrap_or("")
            ),
            _ => self.text.clone().unwrap_or_default(),
        }
    }
}

/// Risk level used for both per-change and overall assessments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Model confidence in an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// How the model classified a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Addition,
    Removal,
    Modification,
    Clarification,
}

/// Priority of a suggested follow-up task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// One change reported by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeItem {
    /// Identifier unique within the response (e.g. "C1").
    pub change_id: String,
    pub change_type: ChangeType,
    pub description: String,
    /// Verbatim quote from the old text, or null if not applicable.
    pub old_text_excerpt: Option<String>,
    /// Verbatim quote from the new text, or null if not applicable.
    pub new_text_excerpt: Option<String>,
    pub business_impact: String,
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
}

/// One follow-up task suggested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub task_id: String,
    /// Each entry references a `change_id` present in `changes`.
    pub related_change_ids: Vec<String>,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub suggested_owner_role: String,
}

/// Metadata attached to a successful analysis.
///
/// Populated from client-side measurements, never from values the model
/// reports about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count_input: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count_output: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// A schema-validated analysis of the differences between two document
/// versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub summary: String,
    pub overall_risk_level: RiskLevel,
    pub overall_confidence: Confidence,
    pub changes: Vec<ChangeItem>,
    pub suggested_tasks: Vec<TaskItem>,
    pub uncertainty_flags: Vec<String>,
    pub metadata: AnalysisMetadata,
}

/// Failure classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Connection,
    Timeout,
    ModelNotFound,
    InvalidJson,
    SchemaValidation,
    InputError,
}

/// Standardized error result, mutually exclusive with [`AnalysisReport`]
/// at the call boundary. Callers distinguish the two by `error: true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Always `true`; present so serialized output is self-describing.
    pub error: bool,
    pub error_type: ErrorType,
    pub error_message: String,
    /// First 1000 characters of the last raw model output, for diagnosis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    pub retry_attempted: bool,
}

impl ErrorReport {
    pub fn new(error_type: ErrorType, error_message: impl Into<String>) -> Self {
        Self {
            error: true,
            error_type,
            error_message: error_message.into(),
            raw_output: None,
            retry_attempted: false,
        }
    }

    pub fn with_raw_output(mut self, raw_output: Option<String>) -> Self {
        self.raw_output = raw_output;
        self
    }

    pub fn with_retry_attempted(mut self, retry_attempted: bool) -> Self {
        self.retry_attempted = retry_attempted;
        self
    }
}

/// The exactly-one-of-two result shape returned per analysis invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Report(Box<AnalysisReport>),
    Error(ErrorReport),
}

impl AnalysisOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Truncate a string to at most `max_chars` characters, respecting UTF-8
/// boundaries. Lossy by design; no ellipsis is appended.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
