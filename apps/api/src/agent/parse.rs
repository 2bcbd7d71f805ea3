//! Lenient decoding of agent completions that are supposed to be JSON.

use serde_json::{json, Value};
use tracing::warn;

/// Strips ```json ... ``` or ``` ... ``` code fences.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}

/// Escapes raw newlines, carriage returns and tabs so a string that was
/// JSON-encoded twice with unescaped control characters parses.
fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Decodes a completion into JSON.
///
/// Handles code fences and double encoding (a JSON string whose content is
/// itself JSON). Anything unparseable comes back as `{"raw_text": ...}`.
pub fn parse_structured(text: &str) -> Value {
    let cleaned = strip_json_fences(text);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::String(inner)) => {
            let inner_clean = strip_json_fences(&inner);
            serde_json::from_str::<Value>(inner_clean)
                .or_else(|_| serde_json::from_str::<Value>(&escape_control_chars(inner_clean)))
                .unwrap_or_else(|e| {
                    warn!("Double-encoded agent response did not parse: {e}");
                    json!({ "raw_text": inner })
                })
        }
        Ok(value) => value,
        Err(e) => {
            warn!("Agent response is not JSON: {e}");
            json!({ "raw_text": text })
        }
    }
}

/// Concierge replies sometimes wrap the text as `{"result": "..."}`.
pub fn unwrap_result_field(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("result") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => text.to_string(),
        },
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_plain_json() {
        let value = parse_structured(r#"{"questions": [{"id": 1}]}"#);
        assert_eq!(value["questions"][0]["id"], 1);
    }

    #[test]
    fn test_double_encoded_json() {
        let inner = r#"{"recommended_jobs": [], "summary": "none"}"#;
        let outer = serde_json::to_string(inner).unwrap();
        let value = parse_structured(&outer);
        assert_eq!(value["summary"], "none");
    }

    #[test]
    fn test_double_encoded_with_raw_newlines() {
        // Inner JSON carries a literal newline inside a string value.
        let outer = "\"{\\\"summary\\\": \\\"line one\\nline two\\\"}\"";
        let value = parse_structured(outer);
        assert_eq!(value["summary"], "line one\nline two");
    }

    #[test]
    fn test_unparseable_text_is_wrapped() {
        let value = parse_structured("Sorry, I cannot help with that.");
        assert_eq!(value["raw_text"], "Sorry, I cannot help with that.");
    }

    #[test]
    fn test_unwrap_result_field() {
        assert_eq!(unwrap_result_field(r#"{"result": "Hello"}"#), "Hello");
        assert_eq!(unwrap_result_field("Hello"), "Hello");
        assert_eq!(unwrap_result_field(r#"{"answer": 1}"#), r#"{"answer": 1}"#);
    }
}
