//! Lenient extraction of JSON objects from model output.

use serde_json::Value;

/// Parses `text` as JSON, falling back to the outermost `{...}` span.
pub fn parse_json_from_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}
