/// Change compression and ranking: raw diff lines → typed change records.
///
/// Per anchor, only the first deletion and first insertion survive; a
/// section that has both becomes one MODIFIED record, otherwise one ADDED
/// or REMOVED record. Later lines within the same anchor are dropped — a
/// deliberate lossy policy inherited from the source system, kept as-is.
///
/// After classification the records pass a noise filter, sha-256 dedup,
/// and an importance ranking, and the final list is capped before any
/// expensive downstream call.
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::config::PipelineConfig;
use crate::diff::{DiffLine, DiffOp};
use crate::model::{truncate_chars, ChangeKind, ChangeRecord};

/// Keywords whose presence raises a record's importance score.
const IMPORTANCE_KEYWORDS: &[&str] = &[
    "shall", "must", "limit", "penalty", "effective", "increase", "decrease",
];

/// Records whose text contains one of these markers are page furniture, not
/// regulatory content.
const BOILERPLATE_MARKERS: &[&str] = &["page ", "copyright", "www.", "http"];

/// Minimum display-text length for a record to be worth keeping.
const MIN_RECORD_CHARS: usize = 40;

/// Collapse tagged diff lines into at most `config.max_change_records`
/// ranked, deduplicated change records.
pub fn compress_changes(lines: &[DiffLine], config: &PipelineConfig) -> Vec<ChangeRecord> {
    let records = classify_by_anchor(lines, config.excerpt_budget);

    let mut seen = std::collections::HashSet::new();
    let mut kept: Vec<ChangeRecord> = records
        .into_iter()
        .filter(|r| !is_noise(r))
        .filter(|r| seen.insert(dedup_digest(r)))
        .collect();

    // Stable sort: equal scores keep section order.
    kept.sort_by_key(|r| std::cmp::Reverse(importance_score(r)));
    kept.truncate(config.max_change_records);
    kept
}

/// Bucket diff lines by anchor (first-appearance order) and classify each
/// bucket into a single record.
fn classify_by_anchor(lines: &[DiffLine], excerpt_budget: usize) -> Vec<ChangeRecord> {
    let mut order: Vec<&str> = Vec::new();
    let mut plus: std::collections::HashMap<&str, Vec<&str>> = std::collections::HashMap::new();
    let mut minus: std::collections::HashMap<&str, Vec<&str>> = std::collections::HashMap::new();

    for line in lines {
        let anchor = line.anchor.as_str();
        if !plus.contains_key(anchor) && !minus.contains_key(anchor) {
            order.push(anchor);
        }
        match line.op {
            DiffOp::Insert => plus.entry(anchor).or_default().push(&line.text),
            DiffOp::Delete => minus.entry(anchor).or_default().push(&line.text),
        }
    }

    let mut records = Vec::new();
    for anchor in order {
        let first_plus = plus.get(anchor).and_then(|v| v.first().copied());
        let first_minus = minus.get(anchor).and_then(|v| v.first().copied());

        let record = match (first_minus, first_plus) {
            (Some(before), Some(after)) => ChangeRecord {
                section: anchor.to_string(),
                kind: ChangeKind::Modified,
                before: Some(truncate_chars(before, excerpt_budget)),
                after: Some(truncate_chars(after, excerpt_budget)),
                text: None,
            },
            (None, Some(added)) => ChangeRecord {
                section: anchor.to_string(),
                kind: ChangeKind::Added,
                before: None,
                after: None,
                text: Some(truncate_chars(added, excerpt_budget)),
            },
            (Some(removed), None) => ChangeRecord {
                section: anchor.to_string(),
                kind: ChangeKind::Removed,
                before: None,
                after: None,
                text: Some(truncate_chars(removed, excerpt_budget)),
            },
            // Unreachable given how diff lines are emitted, but an anchor
            // with no surviving lines must simply produce no record.
            (None, None) => continue,
        };
        records.push(record);
    }
    records
}

fn is_noise(record: &ChangeRecord) -> bool {
    let text = record.display_text();
    if text.trim().len() < MIN_RECORD_CHARS {
        return true;
    }
    let lower = text.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Digest of the record's lowercased word characters; textually equivalent
/// records collapse to the first occurrence.
fn dedup_digest(record: &ChangeRecord) -> [u8; 32] {
    let non_word = Regex::new(r"\W+").expect("valid regex");
    let normalized = non_word
        .replace_all(&record.display_text().to_lowercase(), "")
        .into_owned();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.finalize().into()
}

/// Importance: one point per keyword present, plus up to two points for
/// sheer length (one per 200 characters).
fn importance_score(record: &ChangeRecord) -> usize {
    let text = record.display_text().to_lowercase();
    let keyword_hits = IMPORTANCE_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .count();
    keyword_hits + (text.len() / 200).min(2)
}
