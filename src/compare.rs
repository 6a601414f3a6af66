//! Turning test-case values into stdin text, and judging stdout against an
//! expected value.

use serde_json::Value;

/// Text fed to the program's stdin. Strings pass through untouched, any
/// other value is sent as its JSON encoding.
pub fn serialize_input(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What the program printed, in the form it is compared in: trailing
/// whitespace dropped, and parsed as JSON when it looks like an object or
/// array. Output that looks structured but fails to parse stays text.
pub fn interpret_output(stdout: &str) -> Value {
    let trimmed = stdout.trim_end();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
            return parsed;
        }
    }
    Value::String(trimmed.to_string())
}

/// Structured output compares by deep equality (object key order is
/// irrelevant). Text output only ever equals a string expectation, exactly.
pub fn outputs_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(text), Value::String(want)) => text == want,
        (Value::String(_), _) => false,
        (structured, want) => structured == want,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_strings_pass_through_and_values_are_encoded() {
        assert_eq!(serialize_input(&json!("hello\n")), "hello\n");
        assert_eq!(serialize_input(&json!([1, 2, 3])), "[1,2,3]");
        assert_eq!(serialize_input(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(serialize_input(&json!(42)), "42");
    }

    #[test]
    fn trailing_whitespace_is_dropped_but_leading_kept() {
        assert_eq!(interpret_output("  hi \n\n"), json!("  hi"));
    }

    #[test]
    fn structured_output_ignores_key_order() {
        let actual = interpret_output("{\"b\":2,\"a\":1}\n");
        assert!(outputs_match(&actual, &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn text_output_is_compared_exactly() {
        assert!(outputs_match(&interpret_output("abc\n"), &json!("abc")));
        assert!(!outputs_match(&interpret_output("abd"), &json!("abc")));
    }

    #[test]
    fn unparseable_structure_falls_back_to_text() {
        let actual = interpret_output("[1, 2");
        assert_eq!(actual, json!("[1, 2"));
        assert!(outputs_match(&actual, &json!("[1, 2")));
        assert!(!outputs_match(&actual, &json!([1, 2])));
    }

    #[test]
    fn array_text_is_compared_structurally() {
        // the program printing `[1,2]` matches an array, not the string
        let actual = interpret_output("[1,2]");
        assert!(outputs_match(&actual, &json!([1, 2])));
        assert!(!outputs_match(&actual, &json!("[1,2]")));
    }

    #[test]
    fn text_never_matches_a_non_string_scalar() {
        assert!(!outputs_match(&interpret_output("3\n"), &json!(3)));
        assert!(!outputs_match(&interpret_output("true"), &json!(true)));
        assert!(!outputs_match(&interpret_output("null"), &json!(null)));
        assert!(outputs_match(&interpret_output("3\n"), &json!("3")));
    }
}
