use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the chat API on non-success statuses.
///
/// `detail` is usually a string, but request validation failures carry a list
/// of structured entries instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ApiErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            Value::Array(entries) => {
                let messages: Vec<String> = entries
                    .iter()
                    .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                if messages.is_empty() {
                    Some(Value::Array(entries.clone()).to_string())
                } else {
                    Some(messages.join("; "))
                }
            }
            other => Some(other.to_string()),
        }
    }
}
