//! The test execution engine.
//!
//! Turns a declarative sequence of steps into the capture → locate → map →
//! act → validate protocol against the three collaborators: device client,
//! locate model, validate model. Execution is strictly sequential — one case
//! at a time, one step at a time, every collaborator call completing before
//! the next — matching the single physical device under test.
//!
//! Failure policy: the first failed validation or collaborator error aborts
//! the remaining steps of the current case only; the suite continues with the
//! next case. Cases are never retried.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::artifacts;
use crate::case::{self, Case, Step};
use crate::device::DeviceClient;
use crate::geometry::{GeometryError, PixelPoint};
use crate::vision::{Locator, ModelError, Validator};

/// Timing contracts of the step protocol.
///
/// The settle delay waits out UI animation between a mutating action and the
/// next capture; the drag duration is how long a swipe gesture takes on
/// screen. Both are part of test correctness against a real device, not
/// incidental sleeps. Tests set them to zero.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Wait before each step, and again before a validation capture
    pub settle_delay: Duration,
    /// Duration of the swipe gesture in milliseconds
    pub drag_duration_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            drag_duration_ms: 500,
        }
    }
}

/// Outcome of one executed case
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    /// Case name
    pub name: String,
    /// Whether every step completed with its validations passing
    pub passed: bool,
    /// The step the case failed at, if any
    pub failed_step: Option<Step>,
}

/// Outcome of a whole run, persisted as `records/report.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run finished
    pub generated_at: DateTime<Utc>,
    /// Per-case outcomes in execution order
    pub cases: Vec<CaseResult>,
}

impl RunReport {
    fn new(cases: Vec<CaseResult>) -> Self {
        Self { generated_at: Utc::now(), cases }
    }

    /// Whether every case in the run passed
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    /// Write the report under the run path
    pub fn write(&self, run_path: &Path) -> io::Result<()> {
        let path = run_path.join("records").join("report.json");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Why a step failed, aborting its case
#[derive(Debug)]
enum StepFailure {
    Locate(ModelError),
    Map(GeometryError),
    Validate(ModelError),
    /// The validate model answered not-found
    ValidationNegative,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepFailure::Locate(err) => write!(f, "locate failed: {}", err),
            StepFailure::Map(err) => write!(f, "coordinate mapping failed: {}", err),
            StepFailure::Validate(err) => write!(f, "validate failed: {}", err),
            StepFailure::ValidationNegative => write!(f, "validation returned not found"),
        }
    }
}

/// Orchestrates suite discovery and case execution for one run
#[derive(Debug)]
pub struct Engine {
    run_path: PathBuf,
    options: EngineOptions,
}

impl Engine {
    pub fn new(run_path: impl Into<PathBuf>) -> Self {
        Self { run_path: run_path.into(), options: EngineOptions::default() }
    }

    pub fn with_options(run_path: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self { run_path: run_path.into(), options }
    }

    /// Find the suite files for this run.
    ///
    /// A single file is used iff it matches the `test_*.yml` naming
    /// convention. A directory yields every matching file in listing order,
    /// with a warning per skipped file — and clears the artifacts of
    /// previous runs first, so the `records/` tree on disk always belongs to
    /// this run.
    pub fn discover_cases(&self, case_path: &Path) -> io::Result<Vec<PathBuf>> {
        if case_path.is_file() {
            let name = file_name(case_path);
            if matches_convention(&name) {
                info!("execute case: {}", case_path.display());
                return Ok(vec![case_path.to_path_buf()]);
            }
            error!("case file is not start with test_ or not a yml file: {}", name);
            return Ok(Vec::new());
        }

        info!("execute all cases in {}", case_path.display());
        artifacts::clear_artifacts(&self.run_path)?;

        let mut files = Vec::new();
        for entry in fs::read_dir(case_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if matches_convention(&name) {
                files.push(entry.path());
            } else {
                warn!("case file is not start with test_ or not a yml file: {}", name);
            }
        }
        Ok(files)
    }

    /// Execute everything under `case_path` and persist the run report.
    ///
    /// A malformed suite file is skipped with an error log; a failed case
    /// never stops the cases after it.
    pub fn run(
        &self,
        case_path: &Path,
        client: &mut dyn DeviceClient,
        locator: &dyn Locator,
        validator: &dyn Validator,
    ) -> io::Result<RunReport> {
        let files = self.discover_cases(case_path)?;

        let mut results = Vec::new();
        for file in &files {
            match case::load_suite(file) {
                Ok(cases) => {
                    for case in &cases {
                        results.push(self.run_case(case, client, locator, validator));
                    }
                }
                Err(err) => {
                    error!("skip malformed case file {}: {}", file.display(), err);
                }
            }
        }

        let report = RunReport::new(results);
        if let Err(err) = report.write(&self.run_path) {
            warn!("failed to write run report: {}", err);
        }
        Ok(report)
    }

    /// Execute one case's steps in declaration order, fail-fast.
    ///
    /// Recording is best effort on both ends: a recording that fails to
    /// start or stop is logged and the case still runs.
    pub fn run_case(
        &self,
        case: &Case,
        client: &mut dyn DeviceClient,
        locator: &dyn Locator,
        validator: &dyn Validator,
    ) -> CaseResult {
        client.start_recording();
        info!("- execute case: {}", case.name);

        let mut failed_step = None;
        for step in &case.steps {
            thread::sleep(self.options.settle_delay);
            info!("-- execute step: {}", step);

            if let Err(failure) = self.run_step(step, client, locator, validator) {
                error!("case [{}] failed at step [{}]: {}", case.name, step, failure);
                failed_step = Some(step.clone());
                break;
            }
        }

        client.stop_recording(&case.name);
        CaseResult {
            name: case.name.clone(),
            passed: failed_step.is_none(),
            failed_step,
        }
    }

    fn run_step(
        &self,
        step: &Step,
        client: &mut dyn DeviceClient,
        locator: &dyn Locator,
        validator: &dyn Validator,
    ) -> Result<(), StepFailure> {
        match step {
            Step::Click { element, validation } => {
                let pixel = self.locate_element(element, client, locator)?;
                if !client.tap(pixel) {
                    warn!("tap on '{}' reported failure", element);
                }
                self.check_validation(element, validation.as_deref(), client, validator)
            }
            Step::Input { element, text, validation } => {
                let pixel = self.locate_element(element, client, locator)?;
                if !client.tap(pixel) {
                    warn!("tap on '{}' reported failure", element);
                }
                // Absent text means the step only focuses the field.
                if let Some(text) = text {
                    if !client.type_text(pixel, text) {
                        warn!("typing into '{}' reported failure", element);
                    }
                }
                self.check_validation(element, validation.as_deref(), client, validator)
            }
            Step::Swipe { from_element, to_element, validation } => {
                let from = self.locate_element(from_element, client, locator)?;
                let to = self.locate_element(to_element, client, locator)?;
                if !client.drag(from, to, self.options.drag_duration_ms) {
                    warn!("drag from '{}' to '{}' reported failure", from_element, to_element);
                }
                self.check_validation(to_element, validation.as_deref(), client, validator)
            }
            Step::Unknown { action } => {
                warn!("unknown action: {}", action);
                Ok(())
            }
        }
    }

    /// Capture a fresh screenshot of the screen and resolve an element
    /// description to device pixels
    fn locate_element(
        &self,
        element: &str,
        client: &mut dyn DeviceClient,
        locator: &dyn Locator,
    ) -> Result<PixelPoint, StepFailure> {
        if !client.take_screenshot(element) {
            // Locating against a stale or missing capture is a known risk,
            // preferable to crashing the case over an artifact problem.
            warn!("proceeding without a fresh screenshot for '{}'", element);
        }
        let screenshot = artifacts::screenshot_path(&self.run_path, element);

        let ratio = locator.locate(element, &screenshot).map_err(StepFailure::Locate)?;
        let (width, height) = client.screen_size();
        let pixel = ratio.to_pixel(width, height).map_err(StepFailure::Map)?;
        info!("the location pixel is: {}", pixel);
        Ok(pixel)
    }

    /// Evaluate a step's validation against a second, post-action screenshot
    fn check_validation(
        &self,
        element: &str,
        validation: Option<&str>,
        client: &mut dyn DeviceClient,
        validator: &dyn Validator,
    ) -> Result<(), StepFailure> {
        let Some(validation) = validation else {
            return Ok(());
        };

        // Let the action's effect finish rendering before judging it.
        thread::sleep(self.options.settle_delay);

        let capture_name = format!("{}_validation", element);
        if !client.take_screenshot(&capture_name) {
            warn!("proceeding without a fresh screenshot for '{}'", capture_name);
        }
        let screenshot = artifacts::screenshot_path(&self.run_path, &capture_name);

        let found = validator
            .validate(validation, &screenshot)
            .map_err(StepFailure::Validate)?;
        if found { Ok(()) } else { Err(StepFailure::ValidationNegative) }
    }
}

fn matches_convention(file_name: &str) -> bool {
    file_name.starts_with("test_") && file_name.ends_with(".yml")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
