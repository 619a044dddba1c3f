//! Turning generator output into the plain answer string returned to callers

use serde_json::Value;

/// Keys checked, in order, for the main decision in a generated answer
pub const DECISION_KEYS: [&str; 5] = ["decision", "answer", "response", "content", "text"];

/// Extract the main decision from a generated answer.
///
/// For JSON objects the first truthy value among [`DECISION_KEYS`] wins.
/// Objects without any of them, and all other values, are rendered whole.
pub fn extract_decision(answer: &Value) -> String {
    if let Value::Object(map) = answer {
        for key in DECISION_KEYS {
            match map.get(key) {
                Some(value) if is_truthy(value) => return render(value),
                _ => continue,
            }
        }
    }

    render(answer)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test_log::test]
    fn test_decision_key_wins() {
        let answer = json!({"answer": "second", "decision": "first"});
        assert_eq!(extract_decision(&answer), "first");
    }

    #[test_log::test]
    fn test_empty_values_are_skipped() {
        let answer = json!({"decision": "", "answer": null, "response": "Yes, covered."});
        assert_eq!(extract_decision(&answer), "Yes, covered.");
    }

    #[test_log::test]
    fn test_non_string_values_render_as_json() {
        let answer = json!({"content": ["a", "b"]});
        assert_eq!(extract_decision(&answer), r#"["a","b"]"#);
    }

    #[test_log::test]
    fn test_object_without_known_keys() {
        let answer = json!({"verdict": "covered"});
        assert_eq!(extract_decision(&answer), r#"{"verdict":"covered"}"#);
    }

    #[test_log::test]
    fn test_plain_values() {
        assert_eq!(extract_decision(&json!("just text")), "just text");
        assert_eq!(extract_decision(&json!(42)), "42");
    }
}
