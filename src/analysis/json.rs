//! Tolerant JSON extraction from model output
//!
//! Analysis backends frequently wrap their JSON reply in markdown code
//! fences or surround it with prose. Callers parse the extracted slice
//! with `serde_json`.

/// Extract a JSON object from a response that might contain markdown or
/// other text.
///
/// Handles:
/// - ```json code blocks
/// - Plain ``` code blocks
/// - Raw JSON objects embedded in prose
pub fn extract_json_object(text: &str) -> Result<String, String> {
    // Try to find JSON in ```json blocks
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            let content = text[json_start..json_start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Try plain code blocks
    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        let content_start = text[block_start..]
            .find('\n')
            .map(|i| block_start + i + 1)
            .unwrap_or(block_start);
        if let Some(end) = text[content_start..].find("```") {
            let content = text[content_start..content_start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Fall back to the outermost braces
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return Ok(text[start..=end].to_string());
            }
        }
    }

    Err("No JSON object found in response".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_json_code_block() {
        let text = "Here's the analysis:\n```json\n{\"category\": \"travel\"}\n```\nDone.";
        let result = extract_json_object(text).unwrap();
        assert_eq!(result, "{\"category\": \"travel\"}");
    }

    #[test]
    fn extracts_from_plain_code_block() {
        let text = "```\n{\"category\": \"sports\"}\n```";
        let result = extract_json_object(text).unwrap();
        assert_eq!(result, "{\"category\": \"sports\"}");
    }

    #[test]
    fn extracts_raw_object_from_prose() {
        let text = "Result: {\"name\": \"test\"} done";
        assert_eq!(extract_json_object(text).unwrap(), "{\"name\": \"test\"}");
    }

    #[test]
    fn no_json_returns_error() {
        assert!(extract_json_object("No JSON here!").is_err());
    }
}
