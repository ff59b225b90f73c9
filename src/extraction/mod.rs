//! Response extraction
//!
//! Model output is free text that usually, but not reliably, carries a JSON
//! block. Recovery is a short ordered pipeline of pure functions:
//!
//! 1. [`slice_between_delimiters`] keeps only the `<<<JSON>>>` .. `<<<END>>>` region
//! 2. [`locate_balanced_block`] finds a bracket-balanced candidate
//! 3. [`strip_code_fences`] unwraps a fenced region, used first when the fence
//!    wraps the whole region and as a last resort otherwise
//! 4. [`parse_json`] parses, with one [`repair_json`] pass on failure
//!
//! Everything here is best effort. A `None` result means extraction failed and
//! the caller applies its own fallback.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

pub const START_DELIMITER: &str = "<<<JSON>>>";
pub const END_DELIMITER: &str = "<<<END>>>";

/// Confidence used when nothing can be parsed.
pub const NEUTRAL_CONFIDENCE: f64 = 50.0;

/// Upper bound on opening brackets tried before giving up.
const MAX_CANDIDATES: usize = 16;

lazy_static! {
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
    static ref LABELLED_CONFIDENCE: Regex = Regex::new(
        r"(?i)confidence[^0-9\n]{0,40}?(\d+(?:\.\d+)?)\s*(%|/\s*100\b|/\s*10\b)?"
    )
    .unwrap();
    static ref FRACTION_SCORE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*(100|10)\b").unwrap();
    static ref PERCENT_SCORE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap();
}

// ===== Pipeline stages =====

/// Region between the explicit delimiters. An unterminated start delimiter
/// runs to the end of the text.
pub fn slice_between_delimiters(text: &str) -> Option<&str> {
    let start = text.find(START_DELIMITER)? + START_DELIMITER.len();
    let rest = &text[start..];
    match rest.find(END_DELIMITER) {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

/// Remove markdown code fences. When a fenced region exists, its body wins
/// over the surrounding prose.
pub fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.to_string();
    };

    let after_open = &text[open + 3..];
    // skip the info string (```json)
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];

    match body.find("```") {
        Some(close) => body[..close].to_string(),
        None => body.to_string(),
    }
}

/// Byte range `[start, end)` of the first balanced `{..}` or `[..]` block
/// whose opening bracket sits at or after `from`.
///
/// Depth counting ignores brackets inside string literals. A closing bracket
/// of the wrong kind abandons the candidate.
pub fn locate_balanced_block(text: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = from + text.get(from..)?.find(['{', '['])?;

    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }

    None
}

/// The single fixed repair pass: collapse raw line breaks and drop trailing
/// commas before a closing brace or bracket.
pub fn repair_json(text: &str) -> String {
    let collapsed: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    TRAILING_COMMA.replace_all(&collapsed, "$1").into_owned()
}

/// Parse, retrying exactly once after [`repair_json`].
pub fn parse_json(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Some(value),
        Err(first) => {
            debug!(error = %first, "Parse failed, retrying after repair");
            serde_json::from_str::<Value>(&repair_json(text)).ok()
        }
    }
}

// ===== Entry points =====

/// Recover a structured block from raw completion text.
pub fn extract_structured(text: &str) -> Option<Value> {
    let value = scan_blocks(text);
    if value.is_none() {
        warn!(
            preview = %preview(text),
            "No structured block could be extracted from model output"
        );
    }
    value
}

/// Confidence in `[0, 100]`. A structured field whose key contains
/// "confidence" is preferred over text patterns; 50 when nothing parses.
pub fn extract_confidence(text: &str) -> f64 {
    if let Some(score) = scan_blocks(text).as_ref().and_then(confidence_from_value) {
        return score;
    }

    match confidence_from_text(text) {
        Some(score) => score,
        None => {
            debug!(preview = %preview(text), "No confidence found, using neutral score");
            NEUTRAL_CONFIDENCE
        }
    }
}

/// Clamp a raw score into `[0, 100]`. Non-finite input is neutral.
pub fn normalize_confidence(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        NEUTRAL_CONFIDENCE
    }
}

// ===== Helpers =====

fn scan_blocks(text: &str) -> Option<Value> {
    let region = slice_between_delimiters(text).unwrap_or(text);

    // A fence wrapping the whole region is a wrapper, not content.
    if region.trim_start().starts_with("```") {
        if let Some(value) = scan_candidates(&strip_code_fences(region)) {
            return Some(value);
        }
    }

    scan_candidates(region).or_else(|| {
        region
            .contains("```")
            .then(|| scan_candidates(&strip_code_fences(region)))
            .flatten()
    })
}

fn scan_candidates(body: &str) -> Option<Value> {
    let mut cursor = 0;
    for _ in 0..MAX_CANDIDATES {
        let open = cursor + body.get(cursor..)?.find(['{', '['])?;
        match locate_balanced_block(body, open) {
            Some((start, end)) => {
                if let Some(value) = parse_json(&body[start..end]) {
                    return Some(value);
                }
                cursor = end;
            }
            None => cursor = open + 1,
        }
    }
    None
}

fn confidence_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => {
            let direct = map
                .iter()
                .filter(|(k, _)| k.to_lowercase().contains("confidence"))
                .find_map(|(_, v)| scalar_confidence(v));
            direct.or_else(|| map.values().find_map(confidence_from_value))
        }
        Value::Array(items) => items.iter().find_map(confidence_from_value),
        _ => None,
    }
}

fn scalar_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().map(scale_bare),
        Value::String(s) => confidence_from_text(s).or_else(|| {
            s.trim().parse::<f64>().ok().map(scale_bare)
        }),
        _ => None,
    }
}

// Bare numbers up to 10 are read as a 0-10 score.
fn scale_bare(n: f64) -> f64 {
    if n <= 10.0 {
        normalize_confidence(n * 10.0)
    } else {
        normalize_confidence(n)
    }
}

fn confidence_from_text(text: &str) -> Option<f64> {
    if let Some(caps) = LABELLED_CONFIDENCE.captures(text) {
        let n: f64 = caps[1].parse().ok()?;
        let suffix = caps.get(2).map(|m| m.as_str().replace(' ', ""));
        let score = match suffix.as_deref() {
            Some("%") | Some("/100") => normalize_confidence(n),
            Some("/10") => normalize_confidence(n * 10.0),
            _ => scale_bare(n),
        };
        return Some(score);
    }

    if let Some(caps) = FRACTION_SCORE.captures(text) {
        let n: f64 = caps[1].parse().ok()?;
        let scale = if &caps[2] == "10" { 10.0 } else { 1.0 };
        return Some(normalize_confidence(n * scale));
    }

    if let Some(caps) = PERCENT_SCORE.captures(text) {
        let n: f64 = caps[1].parse().ok()?;
        return Some(normalize_confidence(n));
    }

    None
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== extract_structured ====================

    #[test]
    fn test_block_with_preamble_matches_direct_parse() {
        let block = r#"{"Refined Objective": "Cut costs {by 10%}", "items": [1, 2, {"k": "]"}]}"#;
        let text = format!("Sure! Here is the answer you asked for:\n{}\nHope this helps.", block);

        let direct: Value = serde_json::from_str(block).unwrap();
        assert_eq!(extract_structured(&text), Some(direct));
    }

    #[test]
    fn test_trailing_commas_are_repaired() {
        let broken = r#"{"a": [1, 2, 3,], "b": {"c": "d",},}"#;
        let clean = r#"{"a": [1, 2, 3], "b": {"c": "d"}}"#;

        let expected: Value = serde_json::from_str(clean).unwrap();
        assert_eq!(extract_structured(broken), Some(expected));
    }

    #[test]
    fn test_raw_newlines_inside_strings() {
        let text = "{\"result\": \"line one\nline two\"}";
        let value = extract_structured(text).unwrap();
        assert_eq!(value["result"], "line one line two");
    }

    #[test]
    fn test_delimiters_take_priority() {
        let text = r#"Scratch: {"draft": true}
<<<JSON>>>
{"final": true}
<<<END>>>"#;
        assert_eq!(extract_structured(text), Some(json!({"final": true})));
    }

    #[test]
    fn test_code_fences() {
        let text = "Here you go:\n```json\n[\"a\", \"b\"]\n```\n";
        assert_eq!(extract_structured(text), Some(json!(["a", "b"])));
    }

    #[test]
    fn test_fence_inside_string_value_is_kept() {
        let text = "<<<JSON>>>{\"status\": \"completed\", \"quality\": 90, \"result\": \"Run:\\n```bash\\nls\\n```\", \"remarks\": \"ok\"}<<<END>>>";
        let value = extract_structured(text).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["result"], "Run:\n```bash\nls\n```");
    }

    #[test]
    fn test_fenced_snippet_before_block() {
        let text = "Here is the command:\n```bash\nls *.txt\n```\n{\"command_type\": \"shell\", \"command\": \"ls *.txt\"}";
        assert_eq!(
            extract_structured(text),
            Some(json!({"command_type": "shell", "command": "ls *.txt"}))
        );
    }

    #[test]
    fn test_wrapping_fence() {
        let text = "```json\n{\"ok\": true,}\n```";
        assert_eq!(extract_structured(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_later_block_when_first_is_garbage() {
        let text = r#"{not json at all} then {"ok": 1}"#;
        assert_eq!(extract_structured(text), Some(json!({"ok": 1})));
    }

    #[test]
    fn test_multiple_blocks_take_first() {
        let text = r#"{"first": 1} and later {"second": 2}"#;
        assert_eq!(extract_structured(text), Some(json!({"first": 1})));
    }

    #[test]
    fn test_no_block() {
        assert_eq!(extract_structured("nothing structured here"), None);
        assert_eq!(extract_structured("{\"open\": "), None);
    }

    #[test]
    fn test_locate_balanced_block_is_string_aware() {
        let text = r#"x {"a": "}"} y"#;
        let (start, end) = locate_balanced_block(text, 0).unwrap();
        assert_eq!(&text[start..end], r#"{"a": "}"}"#);
    }

    #[test]
    fn test_mismatched_closer_abandons_candidate() {
        assert_eq!(locate_balanced_block("{ ]", 0), None);
    }

    // ==================== extract_confidence ====================

    #[test]
    fn test_confidence_text_patterns() {
        assert_eq!(extract_confidence("Confidence Score: 8/10"), 80.0);
        assert_eq!(extract_confidence("Confidence: 73%"), 73.0);
        assert_eq!(extract_confidence("no info"), 50.0);
        assert_eq!(extract_confidence("I'd rate this 6/10 overall"), 60.0);
        assert_eq!(extract_confidence("roughly 40% sure"), 40.0);
    }

    #[test]
    fn test_structured_confidence_preferred() {
        let text = r#"The draft scored 2/10 last time.
<<<JSON>>>
{"Accuracy": "ok", "Confidence Score": "9/10"}
<<<END>>>"#;
        assert_eq!(extract_confidence(text), 90.0);

        assert_eq!(extract_confidence(r#"{"confidence": 7}"#), 70.0);
        assert_eq!(extract_confidence(r#"{"confidence": 64}"#), 64.0);
        assert_eq!(extract_confidence(r#"{"Confidence Score": "88%"}"#), 88.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(extract_confidence("Confidence: 250%"), 100.0);
        assert_eq!(extract_confidence(r#"{"confidence": 900}"#), 100.0);
        assert_eq!(normalize_confidence(f64::NAN), 50.0);
        assert_eq!(normalize_confidence(-3.0), 0.0);
    }

    #[test]
    fn test_repair_json() {
        assert_eq!(repair_json("[1,\n2,\n]"), "[1, 2]");
    }
}
