use serde_json::Value;

/// Best-effort text extraction from a chat-completion style response.
///
/// Looks at `choices[0]` only, trying in order `message.content`, `text` and
/// the streaming-chunk `delta.content`. Anything else yields an empty string.
pub fn extract_content(response: &Value) -> String {
    let Some(first) = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(Value::as_object)
    else {
        return String::new();
    };

    let text = if let Some(message) = first.get("message").and_then(Value::as_object) {
        message.get("content")
    } else if let Some(text) = first.get("text") {
        Some(text)
    } else if let Some(delta) = first.get("delta").and_then(Value::as_object) {
        delta.get("content")
    } else {
        None
    };

    text.and_then(Value::as_str).unwrap_or_default().to_string()
}
