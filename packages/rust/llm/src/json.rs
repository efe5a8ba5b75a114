//! Pull a JSON object out of free-form model output.

use serde::de::DeserializeOwned;

/// Strip a surrounding Markdown code fence, if any.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `markdown`, ...) on the opening line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the outermost `{ ... }` object found in `text`.
pub(crate) fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let body = strip_code_fence(text);
    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err("response contains no JSON object".into());
    };
    if end < start {
        return Err("response contains no JSON object".into());
    }
    serde_json::from_str(&body[start..=end]).map_err(|e| format!("invalid JSON: {e}"))
}
