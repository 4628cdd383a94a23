//! Cleanup of raw LLM replies.

use serde_json::Value;

use super::client::LlmError;

/// Remove a surrounding markdown code fence, with or without a language tag.
/// Text without a leading fence is returned trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(without_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop the info string (`cto`, `json`, ...) on the opening line
    let body = match without_open.find('\n') {
        Some(idx) => &without_open[idx + 1..],
        None => without_open,
    };

    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };

    body.trim().to_string()
}

/// Extract a JSON fragment between matching delimiters
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end { Some(&text[start..=end]) } else { None }
}

/// Parse a JSON object out of a reply that may carry fences or chatter
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let clean = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(&clean) {
        return Ok(value);
    }

    let fragment = extract_json_fragment(&clean, '{', '}')
        .ok_or_else(|| LlmError::InvalidResponse("reply contains no JSON object".to_string()))?;
    Ok(serde_json::from_str(fragment)?)
}
