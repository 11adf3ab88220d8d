use serde::Serialize;
use serde_json::Value;

pub const REDACTED: &str = "**REDACTED**";

const REDACTED_KEYS: &[&str] = &["api_key", "password"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub entry: Value,
    pub data: Option<Value>,
    pub last_update_success: bool,
    pub last_success_at: Option<String>,
    pub last_error: Option<String>,
}

/// Replaces the value of every sensitive key, at any depth.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let redacted = if REDACTED_KEYS.contains(&key.as_str()) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
