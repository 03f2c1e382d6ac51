//! Test case and step model with YAML suite parsing.
//!
//! A suite file holds a `cases` sequence; each entry is a named case with an
//! ordered list of steps. Element descriptions are free text resolved by the
//! locate model at run time, so parsing never checks that they refer to
//! anything real on screen.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Result type for suite parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors that can occur while loading a suite file
#[derive(Debug)]
pub enum ParseError {
    /// Suite file could not be read
    Io(std::io::Error),
    /// Suite document is not valid YAML or misses required structure
    Yaml(serde_yaml_ng::Error),
    /// A required field is missing or empty
    MissingField {
        /// Case the step belongs to
        case: String,
        /// Name of the missing field
        field: &'static str,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io(err) => write!(f, "I/O error: {}", err),
            ParseError::Yaml(err) => write!(f, "YAML error: {}", err),
            ParseError::MissingField { case, field } => {
                write!(f, "case '{}': missing required field '{}'", case, field)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(err) => Some(err),
            ParseError::Yaml(err) => Some(err),
            ParseError::MissingField { .. } => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::Io(err)
    }
}

impl From<serde_yaml_ng::Error> for ParseError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ParseError::Yaml(err)
    }
}

/// A single UI interaction, plus an optional post-action validation query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Tap the element described by `element`
    Click {
        /// Element description, sent verbatim to the locate model
        element: String,
        /// Validation query evaluated against a post-action screenshot
        validation: Option<String>,
    },
    /// Tap the element, then type text into it
    Input {
        element: String,
        /// Text to type; absent text skips the typing sub-step
        text: Option<String>,
        validation: Option<String>,
    },
    /// Drag from one element to another
    Swipe {
        from_element: String,
        to_element: String,
        validation: Option<String>,
    },
    /// Action kind this engine does not know; executes as a logged no-op
    Unknown {
        /// The unrecognized action name
        action: String,
    },
}

impl Step {
    /// The validation query attached to this step, if any
    pub fn validation(&self) -> Option<&str> {
        match self {
            Step::Click { validation, .. }
            | Step::Input { validation, .. }
            | Step::Swipe { validation, .. } => validation.as_deref(),
            Step::Unknown { .. } => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Click { element, validation } => {
                write!(f, "click(element={}, validation={:?})", element, validation)
            }
            Step::Input { element, text, validation } => {
                write!(
                    f,
                    "input(element={}, text={:?}, validation={:?})",
                    element, text, validation
                )
            }
            Step::Swipe { from_element, to_element, validation } => {
                write!(
                    f,
                    "swipe(from={}, to={}, validation={:?})",
                    from_element, to_element, validation
                )
            }
            Step::Unknown { action } => write!(f, "unknown(action={})", action),
        }
    }
}

/// A named, ordered sequence of steps representing one test scenario.
///
/// The name is used for the screen recording filename. It is not required to
/// be unique; a later case with the same name overwrites the earlier
/// recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub name: String,
    pub steps: Vec<Step>,
}

// Raw document shape as it appears in the YAML file.

#[derive(Debug, Deserialize)]
struct RawSuite {
    cases: Vec<RawCaseEntry>,
}

#[derive(Debug, Deserialize)]
struct RawCaseEntry {
    case: RawCase,
}

#[derive(Debug, Deserialize)]
struct RawCase {
    name: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    action: Option<String>,
    element: Option<String>,
    text: Option<String>,
    from_element: Option<String>,
    to_element: Option<String>,
    validation: Option<String>,
}

/// Load and parse a suite file from disk
pub fn load_suite(path: &Path) -> ParseResult<Vec<Case>> {
    let source = fs::read_to_string(path)?;
    parse_suite(&source)
}

/// Parse a suite document into its cases.
///
/// Every case in the document is returned, in declaration order. Unknown
/// action kinds are kept as [`Step::Unknown`] so a suite written for a newer
/// engine still runs its recognized steps.
pub fn parse_suite(source: &str) -> ParseResult<Vec<Case>> {
    let raw: RawSuite = serde_yaml_ng::from_str(source)?;

    let mut cases = Vec::with_capacity(raw.cases.len());
    for entry in raw.cases {
        let name = match entry.case.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ParseError::MissingField {
                    case: String::from("<unnamed>"),
                    field: "case.name",
                });
            }
        };

        let mut steps = Vec::with_capacity(entry.case.steps.len());
        for step in entry.case.steps {
            steps.push(convert_step(&name, step)?);
        }
        cases.push(Case { name, steps });
    }

    Ok(cases)
}

fn convert_step(case_name: &str, raw: RawStep) -> ParseResult<Step> {
    let missing = |field: &'static str| ParseError::MissingField {
        case: case_name.to_string(),
        field,
    };

    let action = raw.action.filter(|a| !a.is_empty()).ok_or_else(|| missing("action"))?;

    let step = match action.as_str() {
        "click" => Step::Click {
            element: require(raw.element, || missing("element"))?,
            validation: raw.validation,
        },
        "input" => Step::Input {
            element: require(raw.element, || missing("element"))?,
            text: raw.text,
            validation: raw.validation,
        },
        "swipe" => Step::Swipe {
            from_element: require(raw.from_element, || missing("from_element"))?,
            to_element: require(raw.to_element, || missing("to_element"))?,
            validation: raw.validation,
        },
        _ => Step::Unknown { action },
    };

    Ok(step)
}

fn require(
    value: Option<String>,
    err: impl FnOnce() -> ParseError,
) -> ParseResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SUITE: &str = r#"
cases:
  - case:
      name: login
      steps:
        - action: click
          element: login_button
          validation: login form is visible
        - action: input
          element: username_field
          text: alice
  - case:
      name: browse
      steps:
        - action: swipe
          from_element: list bottom
          to_element: list top
          validation: next page loaded
"#;

    #[test]
    fn test_parse_suite_returns_every_case() {
        let cases = parse_suite(SUITE).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "login");
        assert_eq!(cases[1].name, "browse");
    }

    #[test]
    fn test_parse_suite_keeps_step_order_and_fields() {
        let cases = parse_suite(SUITE).unwrap();
        assert_eq!(
            cases[0].steps,
            vec![
                Step::Click {
                    element: "login_button".to_string(),
                    validation: Some("login form is visible".to_string()),
                },
                Step::Input {
                    element: "username_field".to_string(),
                    text: Some("alice".to_string()),
                    validation: None,
                },
            ]
        );
        assert_eq!(
            cases[1].steps,
            vec![Step::Swipe {
                from_element: "list bottom".to_string(),
                to_element: "list top".to_string(),
                validation: Some("next page loaded".to_string()),
            }]
        );
    }

    #[test]
    fn test_parse_suite_accepts_unknown_action() {
        let source = r#"
cases:
  - case:
      name: future
      steps:
        - action: long_press
          element: avatar
"#;
        let cases = parse_suite(source).unwrap();
        assert_eq!(
            cases[0].steps,
            vec![Step::Unknown { action: "long_press".to_string() }]
        );
    }

    #[test]
    fn test_parse_suite_missing_name_fails() {
        let source = r#"
cases:
  - case:
      steps:
        - action: click
          element: ok
"#;
        assert!(matches!(
            parse_suite(source),
            Err(ParseError::MissingField { field: "case.name", .. })
        ));
    }

    #[test]
    fn test_parse_suite_missing_action_fails() {
        let source = r#"
cases:
  - case:
      name: broken
      steps:
        - element: ok
"#;
        assert!(matches!(
            parse_suite(source),
            Err(ParseError::MissingField { field: "action", .. })
        ));
    }

    #[test]
    fn test_parse_suite_missing_element_fails() {
        let source = r#"
cases:
  - case:
      name: broken
      steps:
        - action: click
"#;
        assert!(matches!(
            parse_suite(source),
            Err(ParseError::MissingField { field: "element", .. })
        ));
    }

    #[test]
    fn test_parse_suite_swipe_requires_both_endpoints() {
        let source = r#"
cases:
  - case:
      name: broken
      steps:
        - action: swipe
          from_element: start
"#;
        assert!(matches!(
            parse_suite(source),
            Err(ParseError::MissingField { field: "to_element", .. })
        ));
    }

    #[test]
    fn test_parse_suite_malformed_yaml_fails() {
        assert!(matches!(parse_suite("cases: [\n"), Err(ParseError::Yaml(_))));
    }

    #[test]
    fn test_input_without_text_is_accepted() {
        let source = r#"
cases:
  - case:
      name: tap_only
      steps:
        - action: input
          element: search_box
"#;
        let cases = parse_suite(source).unwrap();
        assert_eq!(
            cases[0].steps,
            vec![Step::Input {
                element: "search_box".to_string(),
                text: None,
                validation: None,
            }]
        );
    }

    #[test]
    fn test_step_display_names_action() {
        let step = Step::Click { element: "ok".to_string(), validation: None };
        assert_eq!(step.to_string(), "click(element=ok, validation=None)");
    }
}
