/// Batched markdown explanation of change records.
///
/// A lighter-weight companion to the full schema-validated analysis: the
/// detected change records are summarized into reviewer-facing markdown,
/// a few records per generation call. Batching keeps each prompt small and
/// bounds total spend; records from the same section stay together. Any
/// batch failure stops further calls and the output notes that remaining
/// changes were deferred to manual review.
use std::time::Duration;

use tracing::{info, warn};

use crate::client::TextGenerator;
use crate::model::ChangeRecord;

const BATCH_SIZE: usize = 3;
const MAX_BATCHES: usize = 5;
const INTER_BATCH_DELAY: Duration = Duration::from_millis(800);

const EXPLAIN_SYSTEM: &str = "You are a senior compliance analyst producing professional markdown summaries of regulatory changes.";

const NO_CHANGES_TEXT: &str = "No actionable regulatory changes detected.";

const UNAVAILABLE_TEXT: &str = "Automated analysis is temporarily unavailable. Please review the detected changes manually for now.";

const DEFERRED_NOTE: &str = "\n\n---\n> [!NOTE]\n> **Additional changes were detected but deferred to manual review to ensure processing stability.**";

/// Produce a markdown explanation of `changes`, or a fixed fallback text
/// when generation is entirely unavailable. Never errors.
pub async fn explain_changes(
    generator: &dyn TextGenerator,
    model: &str,
    changes: &[ChangeRecord],
) -> String {
    if changes.is_empty() {
        return NO_CHANGES_TEXT.to_string();
    }

    let batches = group_changes(changes, BATCH_SIZE);
    let mut results: Vec<String> = Vec::new();
    let mut partial_failure = false;

    for (i, batch) in batches.iter().take(MAX_BATCHES).enumerate() {
        if i > 0 {
            // Rate-limit safety between consecutive calls.
            tokio::time::sleep(INTER_BATCH_DELAY).await;
        }

        let prompt = build_batch_prompt(batch, i == 0);
        info!(batch = i + 1, total = batches.len(), model, "explaining change batch");

        match generator.generate(&prompt, EXPLAIN_SYSTEM, model).await {
            Ok(generation) => results.push(generation.text),
            Err(e) => {
                warn!(batch = i + 1, error = %e, "explanation batch failed");
                partial_failure = true;
                break;
            }
        }
    }

    if results.is_empty() {
        return UNAVAILABLE_TEXT.to_string();
    }

    let mut summary = results.join("\n\n");
    if batches.len() > MAX_BATCHES || partial_failure {
        summary.push_str(DEFERRED_NOTE);
    }

    normalize_headings(&summary)
}

fn build_batch_prompt(batch: &[&ChangeRecord], is_first: bool) -> String {
    let changes_json =
        serde_json::to_string_pretty(batch).unwrap_or_else(|_| "[]".to_string());

    let framing = if is_first {
        "Provide a document-level summary (H1) and overview first.\n\nStructure:\n# Regulatory Change Summary\n## Overview\n(General context)\n## Key Changes\n(Bullets)\n## Detailed Analysis\n(Analysis for this batch)"
    } else {
        "This is a continuation of an analysis. Provide only section-specific details without repeating the document title. Format the output as appended ## section headers with specific analysis bullet points."
    };

    format!(
        "Analyze the following regulatory changes and provide a professional markdown summary.\n\n\
         Rules:\n\
         1. Output MUST be clean, skimmable Markdown.\n\
         2. Use `##` for section headers. Never use `###`.\n\
         3. Keep it professional and concise.\n\n\
         {framing}\n\n\
         Changes for this batch:\n{changes_json}"
    )
}

/// Batch change records, keeping records from the same section together.
pub fn group_changes(changes: &[ChangeRecord], batch_size: usize) -> Vec<Vec<&ChangeRecord>> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_section: std::collections::HashMap<&str, Vec<&ChangeRecord>> =
        std::collections::HashMap::new();
    for change in changes {
        let section = change.section.as_str();
        if !by_section.contains_key(section) {
            order.push(section);
        }
        by_section.entry(section).or_default().push(change);
    }

    let mut batches: Vec<Vec<&ChangeRecord>> = Vec::new();
    let mut current: Vec<&ChangeRecord> = Vec::new();
    for section in order {
        for &change in &by_section[section] {
            current.push(change);
            if current.len() >= batch_size {
                batches.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Convert standalone bold lines (`**Some Title**`) into markdown headings;
/// the first becomes H1, the rest H2. Inline bold is left intact.
pub fn normalize_headings(text: &str) -> String {
    let mut normalized: Vec<String> = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        let is_bold_line = stripped.starts_with("**")
            && stripped.ends_with("**")
            && stripped.matches("**").count() == 2;

        if is_bold_line {
            let title = stripped.trim_matches('*').trim();
            if normalized.is_empty() {
                normalized.push(format!("# {title}"));
            } else {
                normalized.push(format!("## {title}"));
            }
        } else {
            normalized.push(line.to_string());
        }
    }

    normalized.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GenerateError, Generation, GenerationMetadata};
    use crate::model::ChangeKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(section: &str, text: &str) -> ChangeRecord {
        ChangeRecord {
            section: section.to_string(),
            kind: ChangeKind::Added,
            before: None,
            after: None,
            text: Some(text.to_string()),
        }
    }

    struct CannedGenerator {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _system: &str,
            model: &str,
        ) -> Result<Generation, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(Generation {
                    text: text.clone(),
                    metadata: GenerationMetadata {
                        model_used: model.to_string(),
                        token_count_input: None,
                        token_count_output: None,
                        duration_ms: 1,
                    },
                }),
                Err(()) => Err(GenerateError::Connection("refused".to_string())),
            }
        }
    }

    #[test]
    fn test_group_changes_keeps_sections_together() {
        let records = vec![
            record("s1", "a"),
            record("s2", "b"),
            record("s1", "c"),
            record("s2", "d"),
        ];
        let batches = group_changes(&records, 3);
        assert_eq!(batches.len(), 2);
        // Section s1's records are adjacent despite arriving interleaved.
        assert_eq!(batches[0][0].section, "s1");
        assert_eq!(batches[0][1].section, "s1");
        assert_eq!(batches[0][2].section, "s2");
        assert_eq!(batches[1][0].section, "s2");
    }

    #[test]
    fn test_normalize_headings() {
        let input = "**Regulatory Change Summary**\nBody text with **inline bold** kept.\n**Key Changes**";
        let output = normalize_headings(input);
        assert_eq!(
            output,
            "# Regulatory Change Summary\nBody text with **inline bold** kept.\n## Key Changes"
        );
    }

    #[tokio::test]
    async fn test_empty_changes_short_circuit() {
        let generator = CannedGenerator {
            reply: Ok("should not be called".to_string()),
            calls: AtomicUsize::new(0),
        };
        let text = explain_changes(&generator, "m", &[]).await;
        assert_eq!(text, NO_CHANGES_TEXT);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_unavailable_text() {
        let generator = CannedGenerator {
            reply: Err(()),
            calls: AtomicUsize::new(0),
        };
        let text = explain_changes(&generator, "m", &[record("s1", "a change")]).await;
        assert_eq!(text, UNAVAILABLE_TEXT);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_batch_success() {
        let generator = CannedGenerator {
            reply: Ok("**Summary**\nAll good.".to_string()),
            calls: AtomicUsize::new(0),
        };
        let text = explain_changes(&generator, "m", &[record("s1", "a change")]).await;
        assert_eq!(text, "# Summary\nAll good.");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
