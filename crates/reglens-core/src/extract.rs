/// Recovery of a single structured object from an untrusted model response.
///
/// Generators wrap JSON in prose or markdown fences despite instructions.
/// Extraction tries an ordered series of fallbacks and returns `None` only
/// when every strategy fails — it never errors and never executes anything
/// from the response text:
///
/// 1. direct parse of the trimmed text
/// 2. each fenced code block (``` or ```json), in order of appearance
/// 3. the substring from the first `{` to the last `}` (inclusive)
/// 4. a relaxed-literal repair of that substring (single-quoted strings,
///    trailing commas, Python-style `True`/`False`/`None`), accepted only
///    when the repaired result parses to a JSON object
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Extract a structured value from a raw response blob.
pub fn extract_structured(raw: &str) -> Option<Value> {
    let text = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let fence_re = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex");
    for caps in fence_re.captures_iter(text) {
        if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Some(value);
        }
    }

    let candidate = brace_substring(text)?;
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }

    // Last resort: repair relaxed literal syntax, then re-parse strictly so
    // the result is normalized JSON. Only a mapping is acceptable here.
    let repaired = repair_relaxed_literal(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) if value.is_object() => {
            debug!("strict parse failed, recovered via relaxed-literal repair");
            Some(value)
        }
        _ => None,
    }
}

/// The substring between the first `{` and the last `}`, if both exist in
/// that order.
fn brace_substring(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}

/// Rewrite common relaxed-literal deviations into strict JSON:
/// single-quoted strings become double-quoted, trailing commas before a
/// closing bracket are dropped, and bare `True`/`False`/`None` become their
/// JSON equivalents. Content inside double-quoted strings is untouched.
fn repair_relaxed_literal(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                // Copy a double-quoted string verbatim, honoring escapes.
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    out.push(d);
                    i += 1;
                    if d == '\\' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    } else if d == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                // Re-emit a single-quoted string as double-quoted.
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    if d == '\\' && i + 1 < chars.len() {
                        let next = chars[i + 1];
                        if next == '\'' {
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(next);
                        }
                        i += 2;
                    } else if d == '\'' {
                        out.push('"');
                        i += 1;
                        break;
                    } else if d == '"' {
                        out.push('\\');
                        out.push('"');
                        i += 1;
                    } else {
                        out.push(d);
                        i += 1;
                    }
                }
            }
            ',' => {
                // Drop the comma if only whitespace separates it from a
                // closing bracket.
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                    i += 1;
                } else {
                    out.push(',');
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    other => out.push_str(other),
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_parse() {
        let value = extract_structured(r#"  {"analysis_id": "x"}  "#).unwrap();
        assert_eq!(value["analysis_id"], "x");
    }

    #[test]
    fn test_fenced_block_with_tag() {
        let raw = "Here is the analysis:\n```json\n{\"analysis_id\":\"x\",\"summary\":\"s\"}\n```\nThanks!";
        let value = extract_structured(raw).unwrap();
        assert_eq!(value["summary"], "s");
    }

    #[test]
    fn test_fenced_block_without_tag_after_invalid_one() {
        let raw = "```\nnot json at all\n```\n```\n{\"ok\": true}\n```";
        let value = extract_structured(raw).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_brace_substring() {
        let raw = "The model says: {\"ok\": 1} — hope that helps.";
        let value = extract_structured(raw).unwrap();
        assert_eq!(value["ok"], 1);
    }

    #[test]
    fn test_relaxed_single_quotes_and_trailing_comma() {
        let raw = "{'analysis_id': 'x', 'changes': ['a', 'b',], }";
        let value = extract_structured(raw).unwrap();
        assert_eq!(value["analysis_id"], "x");
        assert_eq!(value["changes"][1], "b");
    }

    #[test]
    fn test_relaxed_python_literals() {
        let raw = "{'error': True, 'raw_output': None, 'retry_attempted': False}";
        let value = extract_structured(raw).unwrap();
        assert_eq!(value["error"], true);
        assert_eq!(value["raw_output"], Value::Null);
        assert_eq!(value["retry_attempted"], false);
    }

    #[test]
    fn test_relaxed_keeps_quoted_content_intact() {
        let raw = "{'summary': 'it\\'s a \"major\" change, really,'}";
        let value = extract_structured(raw).unwrap();
        assert_eq!(value["summary"], "it's a \"major\" change, really,");
    }

    #[test]
    fn test_relaxed_rejects_non_object() {
        assert!(extract_structured("['just', 'a', 'list',]").is_none());
    }

    #[test]
    fn test_total_failure_returns_none() {
        assert!(extract_structured("no braces here at all").is_none());
        assert!(extract_structured("{ completely } broken {").is_none());
        assert!(extract_structured("").is_none());
    }
}
