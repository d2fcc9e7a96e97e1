/// Field-by-field validation of model output against the analysis contract.
///
/// Validation runs on the raw JSON value, before any typed deserialization,
/// because the producer is an untrusted text generator. It is exhaustive
/// rather than fail-fast: every violation found in one pass is collected,
/// each annotated with the failing field path (e.g. `changes[2].risk_level`)
/// so the retry prompt can tell the model exactly what to fix.
use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

pub const VALID_RISK_LEVELS: &[&str] = &["low", "medium", "high", "critical"];
pub const VALID_CONFIDENCE_LEVELS: &[&str] = &["low", "medium", "high"];
pub const VALID_CHANGE_TYPES: &[&str] = &["addition", "removal", "modification", "clarification"];
pub const VALID_PRIORITY_LEVELS: &[&str] = &["low", "medium", "high", "urgent"];

/// Mint a fresh analysis identifier.
pub fn new_analysis_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validate a complete analysis response. An empty error list means valid.
pub fn validate_analysis(response: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = response.as_object() else {
        return vec!["response must be a JSON object".to_string()];
    };

    for field in ["analysis_id", "summary"] {
        match obj.get(field) {
            None => errors.push(format!("{field}: missing required field")),
            Some(Value::String(s)) => {
                if field == "summary" && s.trim().is_empty() {
                    errors.push(format!("{field}: cannot be empty"));
                }
            }
            Some(other) => errors.push(format!(
                "{field}: expected string, got {}",
                type_name(other)
            )),
        }
    }

    check_enum_field(obj.get("overall_risk_level"), VALID_RISK_LEVELS, "overall_risk_level", &mut errors);
    check_enum_field(obj.get("overall_confidence"), VALID_CONFIDENCE_LEVELS, "overall_confidence", &mut errors);

    // Collect change ids while validating changes; tasks are checked
    // against this set for referential integrity.
    let mut change_ids: HashSet<&str> = HashSet::new();
    match obj.get("changes") {
        None => errors.push("changes: missing required field".to_string()),
        Some(Value::Array(changes)) => {
            for (i, change) in changes.iter().enumerate() {
                match change.as_object() {
                    Some(change) => {
                        validate_change_item(change, i, &mut errors);
                        if let Some(Value::String(id)) = change.get("change_id") {
                            change_ids.insert(id.as_str());
                        }
                    }
                    None => errors.push(format!("changes[{i}]: expected object")),
                }
            }
        }
        Some(_) => errors.push("changes: expected array".to_string()),
    }

    match obj.get("suggested_tasks") {
        None => errors.push("suggested_tasks: missing required field".to_string()),
        Some(Value::Array(tasks)) => {
            for (i, task) in tasks.iter().enumerate() {
                match task.as_object() {
                    Some(task) => validate_task_item(task, i, &change_ids, &mut errors),
                    None => errors.push(format!("suggested_tasks[{i}]: expected object")),
                }
            }
        }
        Some(_) => errors.push("suggested_tasks: expected array".to_string()),
    }

    match obj.get("uncertainty_flags") {
        None => errors.push("uncertainty_flags: missing required field".to_string()),
        Some(Value::Array(flags)) => {
            for (i, flag) in flags.iter().enumerate() {
                if !flag.is_string() {
                    errors.push(format!("uncertainty_flags[{i}]: expected string"));
                }
            }
        }
        Some(_) => errors.push("uncertainty_flags: expected array".to_string()),
    }

    match obj.get("metadata") {
        None => errors.push("metadata: missing required field".to_string()),
        Some(metadata) => validate_metadata(metadata, &mut errors),
    }

    errors
}

fn validate_change_item(
    change: &serde_json::Map<String, Value>,
    index: usize,
    errors: &mut Vec<String>,
) {
    let prefix = format!("changes[{index}]");

    for field in ["change_id", "description", "business_impact"] {
        match change.get(field) {
            None => errors.push(format!("{prefix}.{field}: missing required field")),
            Some(v) if !v.is_string() => {
                errors.push(format!("{prefix}.{field}: expected string"))
            }
            _ => {}
        }
    }

    check_enum_field(change.get("change_type"), VALID_CHANGE_TYPES, &format!("{prefix}.change_type"), errors);
    check_enum_field(change.get("risk_level"), VALID_RISK_LEVELS, &format!("{prefix}.risk_level"), errors);
    check_enum_field(change.get("confidence"), VALID_CONFIDENCE_LEVELS, &format!("{prefix}.confidence"), errors);

    for field in ["old_text_excerpt", "new_text_excerpt"] {
        if let Some(v) = change.get(field) {
            if !v.is_string() && !v.is_null() {
                errors.push(format!("{prefix}.{field}: expected string or null"));
            }
        }
    }
}

fn validate_task_item(
    task: &serde_json::Map<String, Value>,
    index: usize,
    valid_change_ids: &HashSet<&str>,
    errors: &mut Vec<String>,
) {
    let prefix = format!("suggested_tasks[{index}]");

    for field in ["task_id", "title", "description", "suggested_owner_role"] {
        match task.get(field) {
            None => errors.push(format!("{prefix}.{field}: missing required field")),
            Some(v) if !v.is_string() => {
                errors.push(format!("{prefix}.{field}: expected string"))
            }
            _ => {}
        }
    }

    check_enum_field(task.get("priority"), VALID_PRIORITY_LEVELS, &format!("{prefix}.priority"), errors);

    match task.get("related_change_ids") {
        None => errors.push(format!("{prefix}.related_change_ids: missing required field")),
        Some(Value::Array(ids)) => {
            for (i, id) in ids.iter().enumerate() {
                match id.as_str() {
                    None => errors.push(format!(
                        "{prefix}.related_change_ids[{i}]: expected string"
                    )),
                    Some(id) if !valid_change_ids.contains(id) => errors.push(format!(
                        "{prefix}.related_change_ids[{i}]: '{id}' not found in changes"
                    )),
                    _ => {}
                }
            }
        }
        Some(_) => errors.push(format!("{prefix}.related_change_ids: expected array")),
    }
}

fn validate_metadata(metadata: &Value, errors: &mut Vec<String>) {
    let Some(metadata) = metadata.as_object() else {
        errors.push("metadata: expected object".to_string());
        return;
    };

    match metadata.get("model_used") {
        None => errors.push("metadata.model_used: missing required field".to_string()),
        Some(v) if !v.is_string() => {
            errors.push("metadata.model_used: expected string".to_string())
        }
        _ => {}
    }

    for field in ["token_count_input", "token_count_output", "processing_time_ms"] {
        if let Some(v) = metadata.get(field) {
            if !v.is_number() {
                errors.push(format!("metadata.{field}: expected number"));
            }
        }
    }
}

/// Enum values are matched case-insensitively; anything else is an error.
fn check_enum_field(
    value: Option<&Value>,
    valid: &[&str],
    field: &str,
    errors: &mut Vec<String>,
) {
    match value {
        None => errors.push(format!("{field}: missing required field")),
        Some(Value::String(s)) => {
            if !valid.contains(&s.to_lowercase().as_str()) {
                errors.push(format!("{field}: '{s}' not one of {valid:?}"));
            }
        }
        Some(other) => errors.push(format!(
            "{field}: expected string, got {}",
            type_name(other)
        )),
    }
}

/// Lowercase every validated enum field in place so a response that passed
/// case-insensitive validation also deserializes into the typed model.
pub fn normalize_enum_casing(response: &mut Value) {
    lowercase_field(response, "overall_risk_level");
    lowercase_field(response, "overall_confidence");

    if let Some(changes) = response.get_mut("changes").and_then(Value::as_array_mut) {
        for change in changes {
            for field in ["change_type", "risk_level", "confidence"] {
                lowercase_field(change, field);
            }
        }
    }
    if let Some(tasks) = response.get_mut("suggested_tasks").and_then(Value::as_array_mut) {
        for task in tasks {
            lowercase_field(task, "priority");
        }
    }
}

fn lowercase_field(value: &mut Value, field: &str) {
    if let Some(Value::String(s)) = value.get_mut(field) {
        *s = s.to_lowercase();
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_response() -> Value {
        json!({
            "analysis_id": "550e8400-e29b-41d4-a716-446655440000",
            "summary": "Balance cap raised from Rs 50,000 to Rs 100,000.",
            "overall_risk_level": "medium",
            "overall_confidence": "high",
            "changes": [{
                "change_id": "C1",
                "change_type": "modification",
                "description": "Balance cap doubled.",
                "old_text_excerpt": "Balance cap is Rs 50,000.",
                "new_text_excerpt": "Balance cap is Rs 100,000.",
                "business_impact": "Deposit monitoring thresholds must be updated.",
                "risk_level": "medium",
                "confidence": "high"
            }],
            "suggested_tasks": [{
                "task_id": "T1",
                "related_change_ids": ["C1"],
                "title": "Update balance monitoring",
                "description": "Raise the automated alert threshold.",
                "priority": "high",
                "suggested_owner_role": "Compliance Officer"
            }],
            "uncertainty_flags": [],
            "metadata": {
                "model_used": "mistral:latest",
                "token_count_input": 100,
                "token_count_output": 50
            }
        })
    }

    #[test]
    fn test_valid_response_passes() {
        assert!(validate_analysis(&valid_response()).is_empty());
    }

    #[test]
    fn test_non_object_rejected() {
        let errors = validate_analysis(&json!(["not", "an", "object"]));
        assert_eq!(errors, ["response must be a JSON object"]);
    }

    #[test]
    fn test_empty_summary_rejected() {
        let mut response = valid_response();
        response["summary"] = json!("   ");
        let errors = validate_analysis(&response);
        assert!(errors.iter().any(|e| e == "summary: cannot be empty"));
    }

    #[test]
    fn test_all_violations_collected_in_one_pass() {
        let errors = validate_analysis(&json!({}));
        // Every top-level required field should be reported at once.
        for field in [
            "analysis_id",
            "summary",
            "overall_risk_level",
            "overall_confidence",
            "changes",
            "suggested_tasks",
            "uncertainty_flags",
            "metadata",
        ] {
            assert!(
                errors.iter().any(|e| e.starts_with(field)),
                "missing error for {field}: {errors:?}"
            );
        }
    }

    #[test]
    fn test_bad_enum_value_names_field_path() {
        let mut response = valid_response();
        response["changes"][0]["risk_level"] = json!("catastrophic");
        let errors = validate_analysis(&response);
        assert!(errors
            .iter()
            .any(|e| e.starts_with("changes[0].risk_level: 'catastrophic'")));
    }

    #[test]
    fn test_enum_matching_is_case_insensitive() {
        let mut response = valid_response();
        response["overall_risk_level"] = json!("Medium");
        response["changes"][0]["confidence"] = json!("HIGH");
        assert!(validate_analysis(&response).is_empty());
    }

    #[test]
    fn test_referential_integrity_names_exact_index() {
        let mut response = valid_response();
        response["suggested_tasks"][0]["related_change_ids"] = json!(["C1", "C99"]);
        let errors = validate_analysis(&response);
        assert_eq!(
            errors,
            ["suggested_tasks[0].related_change_ids[1]: 'C99' not found in changes"]
        );
    }

    #[test]
    fn test_excerpts_accept_null_but_not_numbers() {
        let mut response = valid_response();
        response["changes"][0]["old_text_excerpt"] = json!(null);
        assert!(validate_analysis(&response).is_empty());

        response["changes"][0]["new_text_excerpt"] = json!(42);
        let errors = validate_analysis(&response);
        assert_eq!(
            errors,
            ["changes[0].new_text_excerpt: expected string or null"]
        );
    }

    #[test]
    fn test_metadata_numeric_fields_typed() {
        let mut response = valid_response();
        response["metadata"]["token_count_input"] = json!("lots");
        let errors = validate_analysis(&response);
        assert_eq!(errors, ["metadata.token_count_input: expected number"]);
    }

    #[test]
    fn test_empty_arrays_are_schema_valid() {
        let mut response = valid_response();
        response["changes"] = json!([]);
        response["suggested_tasks"] = json!([]);
        assert!(validate_analysis(&response).is_empty());
    }

    #[test]
    fn test_normalize_enum_casing_enables_typed_deserialization() {
        let mut response = valid_response();
        response["overall_risk_level"] = json!("Medium");
        response["changes"][0]["change_type"] = json!("Modification");
        response["suggested_tasks"][0]["priority"] = json!("HIGH");
        assert!(validate_analysis(&response).is_empty());

        normalize_enum_casing(&mut response);
        let report: crate::model::AnalysisReport =
            serde_json::from_value(response).unwrap();
        assert_eq!(report.overall_risk_level, crate::model::RiskLevel::Medium);
        assert_eq!(
            report.suggested_tasks[0].priority,
            crate::model::TaskPriority::High
        );
    }

    #[test]
    fn test_new_analysis_id_is_uuid() {
        let id = new_analysis_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
