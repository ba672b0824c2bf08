use crate::models::chat::{ MessageContent, ParsedOrder };
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const FALLBACK_MESSAGE: &str =
    "⚠️ Sorry, it can't be parsed as a valid trade order, please retry!";

// Matches fence openers and closers alike, with an optional `json` tag and a
// single trailing newline.
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)```(?:json)?\n?").expect("code fence pattern is valid")
});

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("model reply is empty after fence stripping")]
    Empty,
    #[error("model reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

pub fn parse_reply(raw: &str) -> Result<ParsedOrder, NormalizeError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(NormalizeError::Empty);
    }
    let value = serde_json::from_str(&cleaned)?;
    Ok(ParsedOrder::from_value(value))
}

/// Never fails: anything `parse_reply` rejects becomes the fallback warning.
pub fn normalize(raw: &str) -> MessageContent {
    match parse_reply(raw) {
        Ok(parsed) => MessageContent::ParsedOrder(parsed),
        Err(e) => {
            debug!("Falling back on unparseable reply: {}", e);
            MessageContent::RawFallbackMessage {
                text: FALLBACK_MESSAGE.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ OrderAction, OrderType };
    use serde_json::json;

    const INNER: &str =
        r#"{"action":"buy","symbol":"AAPL","quantity":100,"order_type":"market"}"#;

    fn raw_of(content: MessageContent) -> serde_json::Value {
        match content {
            MessageContent::ParsedOrder(parsed) => parsed.raw,
            other => panic!("expected parsed order, got {:?}", other),
        }
    }

    #[test]
    fn fenced_json_parses_to_object() {
        let raw = format!("```json\n{}\n```", INNER);
        let parsed = parse_reply(&raw).unwrap();
        assert_eq!(
            parsed.raw,
            json!({"action": "buy", "symbol": "AAPL", "quantity": 100, "order_type": "market"})
        );
        let intent = parsed.intent.unwrap();
        assert_eq!(intent.action, OrderAction::Buy);
        assert_eq!(intent.order_type, OrderType::Market);
        assert_eq!(intent.symbol, "AAPL");
        assert!(intent.limit_price.is_none());
    }

    #[test]
    fn fence_tag_is_case_insensitive_and_optional() {
        let upper = normalize(&format!("```JSON\n{}\n```", INNER));
        let bare = normalize(&format!("```\n{}\n```", INNER));
        let mixed = normalize(&format!("```Json\n{}```", INNER));
        assert_eq!(upper, bare);
        assert_eq!(raw_of(bare), raw_of(mixed));
    }

    #[test]
    fn prose_reply_yields_exact_fallback() {
        let content = normalize("I cannot process this request.");
        assert_eq!(
            content,
            MessageContent::RawFallbackMessage { text: FALLBACK_MESSAGE.to_string() }
        );
    }

    #[test]
    fn fallback_covers_every_failure_shape() {
        for raw in [
            "",
            "   ",
            "```json\n```",
            "```json\n{\"action\": \"buy\", \"symbol\"",
            "Sure! Here you go: {\"action\": \"buy\"}",
            "{'action': 'buy'}",
        ] {
            assert!(normalize(raw).is_fallback(), "expected fallback for {:?}", raw);
        }
    }

    #[test]
    fn strip_leaves_clean_text_alone_except_trim() {
        assert_eq!(strip_code_fences(INNER), INNER);
        assert_eq!(strip_code_fences(&format!("  \n{}\n\t", INNER)), INNER);
        assert_eq!(strip_code_fences("no fences here"), "no fences here");
    }

    #[test]
    fn strip_removes_fences_anywhere() {
        let raw = format!("```json\n{}\n```\n", INNER);
        assert_eq!(strip_code_fences(&raw), INNER);
        assert_eq!(strip_code_fences("a```b```JSON\nc"), "abc");
    }

    #[test]
    fn any_json_shape_is_accepted() {
        assert_eq!(raw_of(normalize("[1, 2, 3]")), json!([1, 2, 3]));
        assert_eq!(raw_of(normalize("42")), json!(42));
        assert_eq!(raw_of(normalize("\"hello\"")), json!("hello"));

        match normalize(r#"{"action": "hold"}"#) {
            MessageContent::ParsedOrder(parsed) => assert!(parsed.intent.is_none()),
            other => panic!("expected parsed order, got {:?}", other),
        }
    }
}
