use reqwest::Url;
use serde_json::Value;

const REDACTION: &str = "***REDACTED***";
const SENSITIVE_KEYS: [&str; 8] = [
    "key",
    "api_key",
    "apikey",
    "token",
    "authorization",
    "secret",
    "x-api-key",
    "x-goog-api-key",
];

pub const MAX_LOGGED_BODY_CHARS: usize = 2_000;

pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if is_sensitive_key(&k) {
                REDACTION.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    redacted.set_query(None);
    if !pairs.is_empty() {
        let mut qp = redacted.query_pairs_mut();
        for (k, v) in pairs {
            qp.append_pair(&k, &v);
        }
    }

    redacted.to_string()
}

/// Masks secret-looking keys anywhere in a JSON body and caps its length.
/// Non-JSON text is only truncated.
pub fn redact_body_for_log(raw: &str) -> String {
    let redacted = match serde_json::from_str::<Value>(raw) {
        Ok(mut json) => {
            redact_json_value(&mut json);
            serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
        }
        Err(_) => raw.to_string(),
    };
    truncate_for_log(&redacted, MAX_LOGGED_BODY_CHARS)
}

pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let count = input.chars().count();
    if count <= max_chars {
        return input.to_string();
    }

    let truncated = input.chars().take(max_chars).collect::<String>();
    format!("{truncated}... <truncated {} chars>", count - max_chars)
}

fn redact_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_sensitive_key(key) {
                    *item = Value::String(REDACTION.to_string());
                } else {
                    redact_json_value(item);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json_value),
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::{redact_body_for_log, redact_url, truncate_for_log};
    use reqwest::Url;

    #[test]
    fn api_key_query_parameter_is_masked() {
        let url = Url::parse(
            "https://example.com/v1beta/models/m:generateContent?key=super-secret&alt=json",
        )
        .expect("url");
        let redacted = redact_url(&url);

        assert!(!redacted.contains("super-secret"));
        assert!(redacted.contains("alt=json"));
        assert!(redacted.contains("REDACTED"));
    }

    #[test]
    fn nested_json_secrets_are_masked() {
        let raw = r#"{"contents":[{"parts":[{"text":"hi"}]}],"auth":{"token":"abc123"}}"#;
        let redacted = redact_body_for_log(raw);

        assert!(redacted.contains("\"token\":\"***REDACTED***\""));
        assert!(redacted.contains("\"text\":\"hi\""));
        assert!(!redacted.contains("abc123"));
    }

    #[test]
    fn plain_text_bodies_pass_through() {
        assert_eq!(redact_body_for_log("service unavailable"), "service unavailable");
    }

    #[test]
    fn long_bodies_are_truncated_with_marker() {
        let out = truncate_for_log("abcdefghijklmnopqrstuvwxyz", 5);
        assert_eq!(out, "abcde... <truncated 21 chars>");
    }
}
