use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

const MIN_ELIDE_LEN: usize = 1024;

fn base64_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[A-Za-z0-9+/_-]+={0,2}$").unwrap()
    })
}

/// Recursively elides string values that are both long (≥1 KB, §4.10) and
/// base64-shaped, replacing them with a short marker so a raw request/
/// response can be stored in the ledger without ballooning row size.
pub fn sanitize_json(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => {
            if s.len() >= MIN_ELIDE_LEN && base64_pattern().is_match(&s) {
                JsonValue::String(format!("<elided base64, {} bytes>", s.len()))
            } else {
                JsonValue::String(s)
            }
        }
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sanitize_json).collect()),
        JsonValue::Object(map) => {
            JsonValue::Object(map.into_iter().map(|(k, v)| (k, sanitize_json(v))).collect())
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn elides_long_base64_looking_strings() {
        let blob = "A".repeat(2000);
        let input = json!({ "image": blob });
        let output = sanitize_json(input);
        let elided = output["image"].as_str().unwrap();
        assert!(elided.starts_with("<elided base64"));
    }

    #[test]
    fn leaves_short_strings_untouched() {
        let input = json!({ "model": "gpt-5" });
        assert_eq!(sanitize_json(input), json!({ "model": "gpt-5" }));
    }

    #[test]
    fn leaves_long_non_base64_text_untouched() {
        let text = "the quick brown fox jumps over the lazy dog, ".repeat(40);
        let input = json!({ "prompt": text.clone() });
        assert_eq!(sanitize_json(input), json!({ "prompt": text }));
    }

    #[test]
    fn recurses_into_nested_arrays_and_objects() {
        let blob = "B".repeat(1500);
        let input = json!({ "nested": { "items": [blob] } });
        let output = sanitize_json(input);
        let elided = output["nested"]["items"][0].as_str().unwrap();
        assert!(elided.starts_with("<elided base64"));
    }
}
