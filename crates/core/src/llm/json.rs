use anyhow::Context;
use serde::de::DeserializeOwned;

fn strip_fences(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    // Drop the opening fence line (```json or ```) and the closing fence.
    let mut inner = trimmed.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    Some(inner.trim())
}

fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].trim())
}

/// Best-effort JSON object extraction from model output.
pub fn extract_json(text: &str) -> Option<String> {
    let body = strip_fences(text).unwrap_or(text);
    outer_span(body, '{', '}').map(str::to_string)
}

/// Best-effort JSON array extraction from model output.
pub fn extract_json_array(text: &str) -> Option<String> {
    let body = strip_fences(text).unwrap_or(text);
    outer_span(body, '[', ']').map(str::to_string)
}

/// Decodes an object payload, tolerating fences and surrounding prose.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<T>(&json_str)
        .with_context(|| format!("model output is not valid JSON for the expected object: {json_str}"))
}

/// Decodes an array payload, tolerating fences and surrounding prose.
pub fn parse_array<T: DeserializeOwned>(text: &str) -> anyhow::Result<Vec<T>> {
    let json_str = extract_json_array(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<Vec<T>>(&json_str)
        .with_context(|| format!("model output is not a valid JSON array: {json_str}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Price {
        price: f64,
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "Here you go: {\"a\":1} hope that helps";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn extract_json_array_ignores_prose() {
        let s = "```\n[{\"a\":1},{\"a\":2}]\n```";
        assert_eq!(
            extract_json_array(s),
            Some("[{\"a\":1},{\"a\":2}]".to_string())
        );
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn parse_object_reports_malformed_json() {
        assert_eq!(
            parse_object::<Price>("{\"price\": 12.5}").unwrap(),
            Price { price: 12.5 }
        );
        assert!(parse_object::<Price>("{\"price\": }").is_err());
        assert!(parse_object::<Price>("").is_err());
    }

    #[test]
    fn parse_array_decodes_items() {
        let items = parse_array::<Price>("[{\"price\": 1.0}, {\"price\": 2.0}]").unwrap();
        assert_eq!(items.len(), 2);
        assert!(parse_array::<Price>("{\"price\": 1.0}").is_err());
    }
}
