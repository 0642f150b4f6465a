//! Strict extraction of structured payloads from model responses.
//!
//! A response is either the bare payload or exactly one markdown-fenced block
//! containing it. Anything else is a parse failure; there is no partial or
//! best-effort recovery.

use serde::de::DeserializeOwned;

const FENCE: &str = "```";

/// Fence info strings recognized even when the payload shares their line.
const LANGUAGE_TAGS: [&str; 3] = ["json", "sql", "sqlite"];

/// Return the payload text of a response.
pub(crate) fn unfence(raw: &str) -> Result<&str, String> {
    let trimmed = raw.trim();
    if !trimmed.contains(FENCE) {
        return Ok(trimmed);
    }

    let parts: Vec<&str> = trimmed.split(FENCE).collect();
    if parts.len() != 3 {
        return Err(format!(
            "expected one fenced block, found {} fence markers",
            parts.len() - 1
        ));
    }

    Ok(strip_language_tag(parts[1]).trim())
}

/// Drop the info string after an opening fence: any word alone on the fence
/// line, or a known language tag followed by the payload on the same line.
fn strip_language_tag(inner: &str) -> &str {
    let inner = inner.trim_start_matches([' ', '\t']);
    let tag_end = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    let (tag, rest) = inner.split_at(tag_end);
    if tag.is_empty() || !rest.starts_with(char::is_whitespace) {
        return inner;
    }

    let alone_on_line = rest.split('\n').next().map_or(true, |l| l.trim().is_empty());
    let known = LANGUAGE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag));
    if alone_on_line || known {
        rest
    } else {
        inner
    }
}

/// Parse a response as one JSON document of type `T`.
pub(crate) fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let body = unfence(raw)?;
    if body.is_empty() {
        return Err("response was empty".to_string());
    }
    serde_json::from_str(body).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    #[test]
    fn test_bare_json() {
        let parsed: Verdict = parse_json_response("  {\"ok\": true}\n").unwrap();
        assert_eq!(parsed, Verdict { ok: true });
    }

    #[test]
    fn test_single_fenced_block() {
        let raw = "Here you go:\n```json\n{\"ok\": false}\n```\n";
        let parsed: Verdict = parse_json_response(raw).unwrap();
        assert_eq!(parsed, Verdict { ok: false });
    }

    #[test]
    fn test_untagged_fence() {
        assert_eq!(unfence("```\nSELECT 1\n```").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_one_line_fence_with_tag() {
        let parsed: Verdict = parse_json_response("```json {\"ok\": true}```").unwrap();
        assert_eq!(parsed, Verdict { ok: true });
        assert_eq!(unfence("```sql SELECT 1```").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_one_line_fence_keeps_leading_keyword() {
        assert_eq!(unfence("```SELECT 1```").unwrap(), "SELECT 1");
        assert_eq!(unfence("```\nSELECT 1\n```").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_multiple_blocks_rejected() {
        let raw = "```json\n{\"ok\": true}\n```\n```json\n{\"ok\": false}\n```";
        assert!(parse_json_response::<Verdict>(raw).is_err());
    }

    #[test]
    fn test_prose_around_bare_json_rejected() {
        let raw = "Sure! {\"ok\": true} Hope that helps.";
        assert!(parse_json_response::<Verdict>(raw).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(parse_json_response::<Verdict>("```json\n```").is_err());
    }
}
