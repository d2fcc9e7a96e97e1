/// Conservative per-change compliance task generation.
///
/// Each change record is judged individually: does this change require a
/// human action? The model is instructed to return NULL-equivalent output
/// for editorial, informational, or uncertain changes, so the default
/// answer is "no task". Transport failures propagate typed; anything wrong
/// with the response content simply yields no task.
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::{GenerateError, TextGenerator};
use crate::extract::extract_structured;
use crate::model::{ChangeKind, ChangeRecord};

const TASK_SYSTEM: &str = "You are a conservative Compliance Officer. This is a compliance system, not a creative task generator. Be as conservative as possible.";

/// A follow-up task derived from a single change record.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceTask {
    pub title: String,
    pub description: String,
    pub risk_level: String,
    pub change_type: ChangeKind,
    pub source_clause: String,
}

/// Decide whether `change` requires a compliance task.
///
/// Returns `Ok(None)` when the model declines to create one or its answer
/// cannot be interpreted; returns `Err` only for transport-level failures.
pub async fn generate_compliance_task(
    generator: &dyn TextGenerator,
    model: &str,
    change: &ChangeRecord,
) -> Result<Option<ComplianceTask>, GenerateError> {
    let prompt = build_task_prompt(change);
    let generation = generator.generate(&prompt, TASK_SYSTEM, model).await?;

    let Some(decision) = extract_structured(&generation.text) else {
        warn!(section = %change.section, "task decision was not parsable, skipping");
        return Ok(None);
    };

    if !decision
        .get("requires_task")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        debug!(section = %change.section, "no task required");
        return Ok(None);
    }

    let field = |name: &str, default: &str| {
        decision
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    };

    Ok(Some(ComplianceTask {
        title: field("title", "Review Change"),
        description: field("description", "Please review this regulatory change."),
        risk_level: field("risk_level", "Low"),
        change_type: change.kind,
        source_clause: change.section.clone(),
    }))
}

fn build_task_prompt(change: &ChangeRecord) -> String {
    let kind = match change.kind {
        ChangeKind::Added => "ADDED",
        ChangeKind::Removed => "REMOVED",
        ChangeKind::Modified => "MODIFIED",
    };
    let text = change
        .after
        .as_deref()
        .or(change.text.as_deref())
        .unwrap_or("");

    format!(
        r#"Analyze the following regulatory change to decide if a HUMAN ACTION (at least one compliance task) is REQUIRED.

Rules:
1. ONLY generate a task if the change creates a new obligation, modifies an existing one, or requires explicit review for risk.
2. If the change is EDITORIAL (fixing typos, reformatting, minor wording), INFO-ONLY, or CLARIFICATION -> RETURN NULL.
3. If the change does not require any specific action from a human -> RETURN NULL.
4. If uncertain or the text is vague -> RETURN NULL.
5. Do NOT hallucinate obligations, clauses, or responsibilities. Use only the provided text.

Input Change:
Section: {section}
Type: {kind}
Text/Diff: {text}

Output Format:
Return a JSON object (NO Markdown) with these fields:
{{
  "requires_task": true/false,
  "title": "Short, actionable title (max 10 words)",
  "description": "Clear instruction on what needs to be done. Max 30 words.",
  "risk_level": "Low" | "Medium" | "High"
}}"#,
        section = change.section,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Generation, GenerationMetadata};
    use async_trait::async_trait;

    fn modified_record() -> ChangeRecord {
        ChangeRecord {
            section: "1.1 limits.".to_string(),
            kind: ChangeKind::Modified,
            before: Some("Balance cap is Rs 50,000.".to_string()),
            after: Some("Balance cap is Rs 100,000.".to_string()),
            text: None,
        }
    }

    struct CannedGenerator(String);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _system: &str,
            model: &str,
        ) -> Result<Generation, GenerateError> {
            Ok(Generation {
                text: self.0.clone(),
                metadata: GenerationMetadata {
                    model_used: model.to_string(),
                    token_count_input: None,
                    token_count_output: None,
                    duration_ms: 1,
                },
            })
        }
    }

    #[test]
    fn test_prompt_carries_change_context() {
        let prompt = build_task_prompt(&modified_record());
        assert!(prompt.contains("Section: 1.1 limits."));
        assert!(prompt.contains("Type: MODIFIED"));
        assert!(prompt.contains("Text/Diff: Balance cap is Rs 100,000."));
    }

    #[tokio::test]
    async fn test_affirmative_decision_builds_task() {
        let generator = CannedGenerator(
            r#"{"requires_task": true, "title": "Update balance threshold", "description": "Raise the alert cap.", "risk_level": "Medium"}"#
                .to_string(),
        );
        let task = generate_compliance_task(&generator, "m", &modified_record())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.title, "Update balance threshold");
        assert_eq!(task.risk_level, "Medium");
        assert_eq!(task.change_type, ChangeKind::Modified);
        assert_eq!(task.source_clause, "1.1 limits.");
    }

    #[tokio::test]
    async fn test_negative_decision_yields_none() {
        let generator = CannedGenerator(r#"{"requires_task": false}"#.to_string());
        let task = generate_compliance_task(&generator, "m", &modified_record())
            .await
            .unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_unparsable_decision_yields_none() {
        let generator = CannedGenerator("I don't think so.".to_string());
        let task = generate_compliance_task(&generator, "m", &modified_record())
            .await
            .unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_fenced_decision_still_parses() {
        let generator = CannedGenerator(
            "```json\n{\"requires_task\": true, \"title\": \"T\", \"description\": \"D\", \"risk_level\": \"High\"}\n```".to_string(),
        );
        let task = generate_compliance_task(&generator, "m", &modified_record())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.risk_level, "High");
    }
}
