//! Helpers for reading model output.

use super::AiError;

/// Removes a surrounding markdown code fence (```` ```json ```` or bare
/// ```` ``` ````), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parses model output as JSON, tolerating code fences and chatter around
/// the payload.
pub fn parse_json_payload(raw: &str) -> Result<serde_json::Value, AiError> {
    let cleaned = strip_code_fence(raw);
    if let Ok(value) = serde_json::from_str(cleaned) {
        return Ok(value);
    }

    // Fall back to the outermost array or object embedded in prose.
    let start = cleaned.find(['[', '{']);
    let end = cleaned.rfind([']', '}']);
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(AiError::InvalidResponse(format!(
        "expected JSON, got: {}",
        cleaned.chars().take(200).collect::<String>()
    )))
}
