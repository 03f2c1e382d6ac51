//! Vision model capabilities: element location and screen validation.
//!
//! Two capabilities, each behind a trait the engine consumes:
//!
//! - [`Locator`] maps a textual element description plus a screenshot to a
//!   relative on-screen position.
//! - [`Validator`] maps a textual description plus a screenshot to a
//!   found/not-found verdict.
//!
//! Each capability has two backends, chosen once at startup: a remote
//! OpenAI-compatible chat-completions endpoint, and a local inference
//! command. Inference internals are the backend's concern; this module only
//! owns the prompts, the output parsing, and the trait contracts.

pub mod local;
pub mod remote;

use std::path::Path;

use crate::geometry::RatioPoint;

pub use local::{LocalLocator, LocalValidator};
pub use remote::{RemoteLocator, RemoteValidator};

/// Prompt sent with every locate request.
///
/// Asks the model for a clickable `[x, y]` scaled from 0 to 1.
pub const LOCATE_PROMPT: &str = "Based on the screenshot of the page, I give a text description and you give its corresponding location. The coordinate represents a clickable location [x, y] for an element, which is a relative coordinate on the screenshot, scaled from 0 to 1.";

/// Prompt sent with every validate request.
///
/// The model must answer exactly `found` or `not found`.
pub const VALIDATE_PROMPT: &str = "please check the screenshot and tell me whether you can find the following element or not. if you can find the element in the screenshot, please directly answer 'found'. if you can't find it, answer 'not found'.";

/// Model name used for locate requests
pub const LOCATE_MODEL: &str = "showlab/ShowUI-2B";

/// Model name used for validate requests
pub const VALIDATE_MODEL: &str = "Qwen/Qwen2-VL-2B-Instruct";

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while invoking a locate/validate model
#[derive(Debug)]
pub enum ModelError {
    /// The backend could not be reached or refused the request
    Transport(String),
    /// The model answered with something the caller cannot use
    MalformedOutput(String),
    /// IO error while preparing or handling the request
    Io(std::io::Error),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Transport(msg) => write!(f, "transport failed: {}", msg),
            ModelError::MalformedOutput(msg) => write!(f, "malformed model output: {}", msg),
            ModelError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Io(err)
    }
}

/// Maps an element description and a screenshot to a relative position
pub trait Locator {
    fn locate(&self, query: &str, screenshot: &Path) -> ModelResult<RatioPoint>;
}

/// Maps a validation description and a screenshot to a found/not-found verdict
pub trait Validator {
    fn validate(&self, validation: &str, screenshot: &Path) -> ModelResult<bool>;
}

/// Parse a locate answer of the shape `[0.73, 0.21]` into a ratio point.
///
/// Accepts surrounding prose as long as exactly one bracketed pair is
/// present; anything else is malformed output.
pub fn parse_ratio_pair(text: &str) -> ModelResult<RatioPoint> {
    let malformed = || ModelError::MalformedOutput(text.to_string());

    let start = text.find('[').ok_or_else(malformed)?;
    let end = text[start..].find(']').ok_or_else(malformed)? + start;

    let mut parts = text[start + 1..end].split(',');
    let x: f64 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(malformed)?;
    let y: f64 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(malformed)?;
    if parts.next().is_some() {
        return Err(malformed());
    }

    Ok(RatioPoint::new(x, y))
}

/// Interpret a validate answer.
///
/// Only an exact `found` (case-insensitive, trimmed) counts as true;
/// everything else, including hedged prose, is not-found.
pub fn parse_verdict(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio_pair() {
        let point = parse_ratio_pair("[0.73, 0.21]").unwrap();
        assert_eq!(point, RatioPoint::new(0.73, 0.21));
    }

    #[test]
    fn test_parse_ratio_pair_with_surrounding_text() {
        let point = parse_ratio_pair("The element is at [0.5,0.5] on screen.").unwrap();
        assert_eq!(point, RatioPoint::new(0.5, 0.5));
    }

    #[test]
    fn test_parse_ratio_pair_rejects_garbage() {
        assert!(parse_ratio_pair("no coordinates here").is_err());
        assert!(parse_ratio_pair("[0.5]").is_err());
        assert!(parse_ratio_pair("[0.5, 0.5, 0.5]").is_err());
        assert!(parse_ratio_pair("[left, top]").is_err());
        assert!(parse_ratio_pair("[0.5, 0.5").is_err());
    }

    #[test]
    fn test_parse_ratio_pair_does_not_range_check() {
        // Range enforcement belongs to the coordinate mapper, so a bad model
        // answer fails at the conversion step with a dedicated error.
        let point = parse_ratio_pair("[1.8, -0.2]").unwrap();
        assert_eq!(point, RatioPoint::new(1.8, -0.2));
    }

    #[test]
    fn test_parse_verdict_exact_match_only() {
        assert!(parse_verdict("found"));
        assert!(parse_verdict("Found"));
        assert!(parse_verdict("  FOUND \n"));
        assert!(!parse_verdict("not found"));
        assert!(!parse_verdict("I found the element"));
        assert!(!parse_verdict(""));
    }
}
