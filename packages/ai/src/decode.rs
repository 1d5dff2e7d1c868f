// ABOUTME: Best-effort decoding of structured data from free-form model text
// ABOUTME: Yields either the parsed value or the raw text for a caller-supplied fallback

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Outcome of trying to read a `T` out of model output
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Parsed(T),
    Fallback(String),
}

impl<T: DeserializeOwned> Decoded<T> {
    pub fn decode(raw: &str) -> Self {
        let cleaned = strip_code_fences(raw);

        match serde_json::from_str::<T>(cleaned) {
            Ok(value) => return Decoded::Parsed(value),
            Err(e) => debug!("Direct JSON parse failed: {}", e),
        }

        // Models sometimes wrap the object in prose
        if let Some(candidate) = outermost_object(cleaned) {
            if let Ok(value) = serde_json::from_str::<T>(candidate) {
                return Decoded::Parsed(value);
            }
        }

        warn!(
            "Model response was not valid JSON, using fallback. Snippet: {}",
            &raw.chars().take(200).collect::<String>()
        );
        Decoded::Fallback(raw.trim().to_string())
    }
}

impl<T> Decoded<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }

    /// Collapse into a value, building one from the raw text when parsing failed
    pub fn resolve(self, fallback: impl FnOnce(String) -> T) -> T {
        match self {
            Decoded::Parsed(value) => value,
            Decoded::Fallback(raw) => fallback(raw),
        }
    }
}

/// Strip markdown code fences (```json ... ```) if present
pub fn strip_code_fences(text: &str) -> &str {
    let cleaned = text.trim();
    if !cleaned.starts_with("```") {
        return cleaned;
    }
    // Skip the opening fence line, including any language tag
    let start = cleaned.find('\n').map(|i| i + 1).unwrap_or(cleaned.len());
    let end = cleaned[start..]
        .rfind("```")
        .map(|i| i + start)
        .unwrap_or(cleaned.len());
    cleaned[start..end].trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
