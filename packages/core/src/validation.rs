// ABOUTME: Request field validation shared by the HTTP layer and the client
// ABOUTME: Required-field checks, image payload and prompt limits

use thiserror::Error;

use crate::utils::strip_data_url_prefix;

/// Longest prompt forwarded to the image service
pub const MAX_PROMPT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Require a non-blank string value and return it trimmed
pub fn require_text(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Validate a captured frame and return the bare base64 payload
pub fn validate_image(value: Option<&str>) -> Result<String, ValidationError> {
    let raw = value.ok_or(ValidationError::MissingField("image"))?;
    let payload = strip_data_url_prefix(raw.trim());
    if payload.is_empty() {
        return Err(ValidationError::MissingField("image"));
    }
    if payload.starts_with("data:") {
        return Err(ValidationError::invalid(
            "image",
            "only png and jpeg data URLs are supported",
        ));
    }
    Ok(payload.to_string())
}

pub fn validate_step_number(step: u32) -> Result<u32, ValidationError> {
    if step == 0 {
        return Err(ValidationError::invalid("step", "step numbers start at 1"));
    }
    Ok(step)
}

pub fn validate_prompt(value: Option<&str>) -> Result<String, ValidationError> {
    let prompt = require_text("prompt", value)?;
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ValidationError::invalid(
            "prompt",
            format!("must be at most {} characters", MAX_PROMPT_CHARS),
        ));
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("userId", Some(" u1 ")).unwrap(), "u1");
        assert_eq!(
            require_text("userId", Some("   ")),
            Err(ValidationError::MissingField("userId"))
        );
        assert_eq!(
            require_text("userId", None),
            Err(ValidationError::MissingField("userId"))
        );
    }

    #[test]
    fn test_validate_image_strips_prefix() {
        assert_eq!(
            validate_image(Some("data:image/jpeg;base64,QUJD")).unwrap(),
            "QUJD"
        );
        assert!(validate_image(Some("data:image/png;base64,")).is_err());
        assert!(validate_image(None).is_err());
    }

    #[test]
    fn test_validate_image_rejects_other_media_types() {
        let err = validate_image(Some("data:image/gif;base64,R0lG")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "image", .. }));
    }

    #[test]
    fn test_validate_step_number() {
        assert!(validate_step_number(0).is_err());
        assert_eq!(validate_step_number(4).unwrap(), 4);
    }

    #[test]
    fn test_validate_prompt_length() {
        let long = "x".repeat(MAX_PROMPT_CHARS + 1);
        assert!(validate_prompt(Some(&long)).is_err());
        assert_eq!(validate_prompt(Some("drone frame")).unwrap(), "drone frame");
    }
}
