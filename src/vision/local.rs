//! Local model backends that run inference through a spawned command.
//!
//! The command receives three arguments — prompt, screenshot path, query —
//! and prints the model's answer on stdout. The command is resolved at
//! startup so a missing inference setup fails the run before any case
//! executes, not in the middle of a step.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::artifacts;
use crate::geometry::RatioPoint;
use crate::vision::{
    LOCATE_PROMPT, Locator, ModelError, ModelResult, VALIDATE_PROMPT, Validator,
    parse_ratio_pair, parse_verdict,
};

/// Shared spawn-and-read transport for the local backends
#[derive(Debug, Clone)]
pub struct LocalModel {
    program: PathBuf,
    args: Vec<String>,
}

impl LocalModel {
    /// Split the configured command line and verify the program exists.
    ///
    /// A bare program name is left to `PATH` resolution at spawn time; an
    /// explicit path must exist now.
    pub fn new(command: &str) -> ModelResult<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| ModelError::Transport("inference command is empty".to_string()))?;

        if program.components().count() > 1 && !program.exists() {
            return Err(ModelError::Transport(format!(
                "inference command not found: {}",
                program.display()
            )));
        }

        Ok(Self {
            program,
            args: parts.map(|s| s.to_string()).collect(),
        })
    }

    /// Run one inference, returning the trimmed stdout answer
    fn infer(&self, prompt: &str, screenshot: &Path, query: &str) -> ModelResult<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(prompt)
            .arg(screenshot)
            .arg(query)
            .output()?;

        if !output.status.success() {
            return Err(ModelError::Transport(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Locate backend running inference on the local machine
#[derive(Debug, Clone)]
pub struct LocalLocator {
    model: LocalModel,
}

impl LocalLocator {
    pub fn new(command: &str) -> ModelResult<Self> {
        let model = LocalModel::new(command)?;
        info!("locate model initialized in Local mode");
        Ok(Self { model })
    }
}

impl Locator for LocalLocator {
    fn locate(&self, query: &str, screenshot: &Path) -> ModelResult<RatioPoint> {
        let answer = self.model.infer(LOCATE_PROMPT, screenshot, query)?;
        let point = parse_ratio_pair(&answer)?;
        if point.in_range() {
            artifacts::mark_point_best_effort(screenshot, point);
        }
        Ok(point)
    }
}

/// Validate backend running inference on the local machine
#[derive(Debug, Clone)]
pub struct LocalValidator {
    model: LocalModel,
}

impl LocalValidator {
    pub fn new(command: &str) -> ModelResult<Self> {
        let model = LocalModel::new(command)?;
        info!("validate model initialized in Local mode");
        Ok(Self { model })
    }
}

impl Validator for LocalValidator {
    fn validate(&self, validation: &str, screenshot: &Path) -> ModelResult<bool> {
        let answer = self.model.infer(VALIDATE_PROMPT, screenshot, validation)?;
        info!("the validation result is: {}", answer);
        Ok(parse_verdict(&answer))
    }
}
