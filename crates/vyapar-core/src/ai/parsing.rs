//! Locating JSON inside model output
//!
//! Models wrap JSON in markdown fences, prefix it with chatter, or leave a
//! trailing comma behind. Everything here is pure so it can be tested
//! without a backend.

use serde_json::Value;

use crate::error::{Error, Result};

/// Extract the first JSON object from a completion
///
/// Looks for a ```json fence first, then the first balanced `{...}` block.
/// A failed parse is retried once with trailing commas removed.
pub fn extract_json(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::UpstreamMalformed("empty completion".into()));
    }

    let candidate = fenced_block(text)
        .and_then(balanced_object)
        .or_else(|| balanced_object(text))
        .ok_or_else(|| Error::UpstreamMalformed("no JSON object in completion".into()))?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(first) => {
            let repaired = strip_trailing_commas(candidate);
            serde_json::from_str::<Value>(&repaired).map_err(|_| {
                Error::UpstreamMalformed(format!("completion is not valid JSON: {}", first))
            })
        }
    }
}

/// Contents of the first markdown code fence (```json or bare ```)
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First `{...}` with balanced braces, ignoring braces inside strings
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Drop commas that directly precede `}` or `]` (outside strings)
fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let value = extract_json(r#"{"score": 70}"#).unwrap();
        assert_eq!(value["score"], 70);
    }

    #[test]
    fn test_fenced_with_chatter() {
        let text = "Sure! Here is the analysis:\n```json\n{\"factors\": [{\"name\": \"Demand\"}]}\n```\nHope that helps.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["factors"][0]["name"], "Demand");
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"Result: {"reasoning": "uses {curly} braces \" and quotes", "score": 5} trailing"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["score"], 5);
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let value = extract_json(r#"{"a": [1, 2, ], "b": "x,}", }"#).unwrap();
        assert_eq!(value["a"].as_array().unwrap().len(), 2);
        assert_eq!(value["b"], "x,}");
    }

    #[test]
    fn test_prose_only_is_malformed() {
        let err = extract_json("I cannot analyze this business idea.").unwrap_err();
        assert!(matches!(err, Error::UpstreamMalformed(_)));
        assert!(matches!(extract_json("   ").unwrap_err(), Error::UpstreamMalformed(_)));
    }

    #[test]
    fn test_truncated_object_is_malformed() {
        let err = extract_json(r#"{"factors": [{"name": "Demand""#).unwrap_err();
        assert!(matches!(err, Error::UpstreamMalformed(_)));
    }
}
