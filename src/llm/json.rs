//! JSON extraction and repair for model responses.
//!
//! Models often wrap the requested JSON array in commentary or markdown, or
//! leave trailing commas behind. These helpers recover the array text so it
//! can be handed to `serde_json`.

use std::sync::LazyLock;

use regex_lite::Regex;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]}])").expect("trailing comma regex is valid"));

/// Extract the first top-level JSON array from `text`.
///
/// Scans from the first `[` and tracks bracket depth until the matching `]`.
/// Brackets inside JSON string literals (including escaped quotes) do not
/// count. Returns `None` when there is no `[` or it is never closed.
pub fn extract_json_from_text(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let candidate = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (idx, ch) in candidate.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&candidate[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Remove trailing commas before a closing `]` or `}`.
///
/// `[{"a": 1,},]` → `[{"a": 1}]`.
pub fn repair_trailing_commas(json: &str) -> String {
    TRAILING_COMMA.replace_all(json, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_array() {
        assert_eq!(extract_json_from_text(r#"[{"a": 1}]"#), Some(r#"[{"a": 1}]"#));
    }

    #[test]
    fn test_extract_with_surrounding_text() {
        let text = "Here are the units:\n[{\"name\": \"x\"}]\nHope this helps!";
        assert_eq!(extract_json_from_text(text), Some(r#"[{"name": "x"}]"#));
    }

    #[test]
    fn test_extract_nested_arrays_returns_outermost() {
        let text = r#"result: [{"files": ["a.rs", "b.rs"]}, {"files": []}] trailing ]"#;
        assert_eq!(
            extract_json_from_text(text),
            Some(r#"[{"files": ["a.rs", "b.rs"]}, {"files": []}]"#)
        );
    }

    #[test]
    fn test_extract_ignores_brackets_in_strings() {
        let text = r#"[{"explanation": "handle ] and [ carefully \" ]"}] after"#;
        assert_eq!(
            extract_json_from_text(text),
            Some(r#"[{"explanation": "handle ] and [ carefully \" ]"}]"#)
        );
    }

    #[test]
    fn test_extract_no_bracket() {
        assert_eq!(extract_json_from_text("no json here {\"a\": 1}"), None);
    }

    #[test]
    fn test_extract_unbalanced() {
        assert_eq!(extract_json_from_text(r#"[{"a": [1, 2}"#), None);
    }

    #[test]
    fn test_repair_trailing_commas() {
        assert_eq!(repair_trailing_commas(r#"[1, 2,]"#), "[1, 2]");
        assert_eq!(repair_trailing_commas(r#"{"a": 1,}"#), r#"{"a": 1}"#);
        assert_eq!(
            repair_trailing_commas("[{\"a\": 1,\n  },\n]"),
            "[{\"a\": 1}]"
        );
    }

    #[test]
    fn test_repair_leaves_valid_json_alone() {
        let json = r#"[{"files": ["a.rs", "b.rs"]}]"#;
        assert_eq!(repair_trailing_commas(json), json);
    }
}
