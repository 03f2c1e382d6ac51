//! Integration tests for the execution engine, driven by fake collaborators
//! that record every call in order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use app_vision::case::{Case, Step, parse_suite};
use app_vision::device::DeviceClient;
use app_vision::engine::{Engine, EngineOptions};
use app_vision::geometry::{PixelPoint, RatioPoint};
use app_vision::vision::{Locator, ModelError, ModelResult, Validator};

type CallLog = Rc<RefCell<Vec<String>>>;

struct FakeDevice {
    log: CallLog,
    width: u32,
    height: u32,
    recording_ok: bool,
}

impl FakeDevice {
    fn new(log: CallLog) -> Self {
        Self { log, width: 1000, height: 2000, recording_ok: true }
    }
}

impl DeviceClient for FakeDevice {
    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn take_screenshot(&mut self, name: &str) -> bool {
        self.log.borrow_mut().push(format!("screenshot:{}", name));
        true
    }

    fn start_recording(&mut self) -> bool {
        self.log.borrow_mut().push("start_recording".to_string());
        self.recording_ok
    }

    fn stop_recording(&mut self, case_name: &str) -> bool {
        self.log.borrow_mut().push(format!("stop_recording:{}", case_name));
        self.recording_ok
    }

    fn tap(&mut self, at: PixelPoint) -> bool {
        self.log.borrow_mut().push(format!("tap:{}", at));
        true
    }

    fn type_text(&mut self, at: PixelPoint, text: &str) -> bool {
        self.log.borrow_mut().push(format!("type:{}:{}", at, text));
        true
    }

    fn drag(&mut self, from: PixelPoint, to: PixelPoint, duration_ms: u64) -> bool {
        self.log
            .borrow_mut()
            .push(format!("drag:{}->{}@{}", from, to, duration_ms));
        true
    }
}

struct FakeLocator {
    log: CallLog,
    point: RatioPoint,
    fail_on: Option<String>,
}

impl FakeLocator {
    fn new(log: CallLog) -> Self {
        Self { log, point: RatioPoint::new(0.5, 0.5), fail_on: None }
    }
}

impl Locator for FakeLocator {
    fn locate(&self, query: &str, _screenshot: &Path) -> ModelResult<RatioPoint> {
        self.log.borrow_mut().push(format!("locate:{}", query));
        if self.fail_on.as_deref() == Some(query) {
            return Err(ModelError::Transport("inference timeout".to_string()));
        }
        Ok(self.point)
    }
}

struct FakeValidator {
    log: CallLog,
    /// Verdict per validation text; anything missing passes
    verdicts: HashMap<String, bool>,
}

impl FakeValidator {
    fn new(log: CallLog) -> Self {
        Self { log, verdicts: HashMap::new() }
    }
}

impl Validator for FakeValidator {
    fn validate(&self, validation: &str, screenshot: &Path) -> ModelResult<bool> {
        let capture = screenshot
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.log
            .borrow_mut()
            .push(format!("validate:{}:{}", capture, validation));
        Ok(*self.verdicts.get(validation).unwrap_or(&true))
    }
}

fn fast_engine(run_path: &Path) -> Engine {
    Engine::with_options(
        run_path,
        EngineOptions { settle_delay: Duration::ZERO, drag_duration_ms: 500 },
    )
}

fn click(element: &str, validation: Option<&str>) -> Step {
    Step::Click {
        element: element.to_string(),
        validation: validation.map(|v| v.to_string()),
    }
}

#[test]
fn test_click_case_without_validation() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "login".to_string(),
        steps: vec![click("login_button", None)],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(result.passed);
    assert!(result.failed_step.is_none());
    assert_eq!(
        *log.borrow(),
        vec![
            "start_recording".to_string(),
            "screenshot:login_button".to_string(),
            "locate:login_button".to_string(),
            "tap:(500, 1000)".to_string(),
            "stop_recording:login".to_string(),
        ]
    );
}

#[test]
fn test_input_without_text_skips_typing() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "focus_only".to_string(),
        steps: vec![Step::Input {
            element: "search_box".to_string(),
            text: None,
            validation: None,
        }],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(result.passed);
    assert!(log.borrow().iter().any(|c| c.starts_with("tap:")));
    assert!(!log.borrow().iter().any(|c| c.starts_with("type:")));
}

#[test]
fn test_input_with_text_taps_then_types() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "fill".to_string(),
        steps: vec![Step::Input {
            element: "username_field".to_string(),
            text: Some("alice".to_string()),
            validation: None,
        }],
    };

    fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    let calls = log.borrow();
    let tap = calls.iter().position(|c| c == "tap:(500, 1000)").unwrap();
    let typed = calls.iter().position(|c| c == "type:(500, 1000):alice").unwrap();
    assert!(tap < typed);
}

#[test]
fn test_swipe_locates_both_endpoints_before_drag() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "scroll".to_string(),
        steps: vec![Step::Swipe {
            from_element: "list bottom".to_string(),
            to_element: "list top".to_string(),
            validation: Some("next page loaded".to_string()),
        }],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(result.passed);
    assert_eq!(
        *log.borrow(),
        vec![
            "start_recording".to_string(),
            "screenshot:list bottom".to_string(),
            "locate:list bottom".to_string(),
            "screenshot:list top".to_string(),
            "locate:list top".to_string(),
            "drag:(500, 1000)->(500, 1000)@500".to_string(),
            "screenshot:list top_validation".to_string(),
            "validate:list top_validation:next page loaded".to_string(),
            "stop_recording:scroll".to_string(),
        ]
    );
}

#[test]
fn test_step_without_validation_never_calls_validator() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "plain".to_string(),
        steps: vec![click("ok_button", None)],
    };

    fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    let calls = log.borrow();
    let screenshots = calls.iter().filter(|c| c.starts_with("screenshot:")).count();
    assert_eq!(screenshots, 1);
    assert!(!calls.iter().any(|c| c.starts_with("validate:")));
}

#[test]
fn test_failed_validation_skips_remaining_steps() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let mut validator = FakeValidator::new(log.clone());
    validator
        .verdicts
        .insert("dialog opened".to_string(), false);

    let first = click("open_dialog", Some("dialog opened"));
    let case = Case {
        name: "dialog".to_string(),
        steps: vec![first.clone(), click("confirm_button", None)],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(!result.passed);
    assert_eq!(result.failed_step, Some(first));

    let calls = log.borrow();
    assert!(!calls.iter().any(|c| c.contains("confirm_button")));
    // Recording still stops after the abort.
    assert_eq!(calls.last().unwrap(), "stop_recording:dialog");
}

#[test]
fn test_locator_error_fails_case() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let mut locator = FakeLocator::new(log.clone());
    locator.fail_on = Some("ghost_button".to_string());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "haunted".to_string(),
        steps: vec![click("ghost_button", None), click("next_button", None)],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(!result.passed);
    assert!(!log.borrow().iter().any(|c| c.contains("next_button")));
}

#[test]
fn test_out_of_range_ratio_fails_case() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let mut locator = FakeLocator::new(log.clone());
    locator.point = RatioPoint::new(1.5, 0.5);
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "bad_model".to_string(),
        steps: vec![click("somewhere", None)],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(!result.passed);
    // The out-of-range answer never turns into a device action.
    assert!(!log.borrow().iter().any(|c| c.starts_with("tap:")));
}

#[test]
fn test_unknown_action_is_a_noop() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "forward_compat".to_string(),
        steps: vec![
            Step::Unknown { action: "long_press".to_string() },
            click("ok_button", None),
        ],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);

    assert!(result.passed);
    assert!(log.borrow().iter().any(|c| c == "tap:(500, 1000)"));
}

#[test]
fn test_recording_failure_does_not_abort_case() {
    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    device.recording_ok = false;
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let case = Case {
        name: "no_video".to_string(),
        steps: vec![click("ok_button", None)],
    };

    let result = fast_engine(tmp.path()).run_case(&case, &mut device, &locator, &validator);
    assert!(result.passed);
}

#[test]
fn test_failed_case_does_not_stop_the_suite() {
    let tmp = TempDir::new().unwrap();
    let cases_dir = tmp.path().join("cases");
    fs::create_dir(&cases_dir).unwrap();
    fs::write(
        cases_dir.join("test_two_cases.yml"),
        "\
cases:
  - case:
      name: first
      steps:
        - action: click
          element: ghost_button
  - case:
      name: second
      steps:
        - action: click
          element: ok_button
",
    )
    .unwrap();

    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let mut locator = FakeLocator::new(log.clone());
    locator.fail_on = Some("ghost_button".to_string());
    let validator = FakeValidator::new(log.clone());

    let report = fast_engine(tmp.path())
        .run(&cases_dir, &mut device, &locator, &validator)
        .unwrap();

    assert_eq!(report.cases.len(), 2);
    assert!(!report.cases[0].passed);
    assert!(report.cases[1].passed);
    assert!(!report.passed());
}

#[test]
fn test_malformed_suite_is_skipped_in_directory_mode() {
    let tmp = TempDir::new().unwrap();
    let cases_dir = tmp.path().join("cases");
    fs::create_dir(&cases_dir).unwrap();
    fs::write(cases_dir.join("test_broken.yml"), "cases: [\n").unwrap();
    fs::write(
        cases_dir.join("test_good.yml"),
        "\
cases:
  - case:
      name: good
      steps:
        - action: click
          element: ok_button
",
    )
    .unwrap();

    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let report = fast_engine(tmp.path())
        .run(&cases_dir, &mut device, &locator, &validator)
        .unwrap();

    assert_eq!(report.cases.len(), 1);
    assert_eq!(report.cases[0].name, "good");
    assert!(report.passed());
}

#[test]
fn test_run_writes_report_json() {
    let tmp = TempDir::new().unwrap();
    let cases_dir = tmp.path().join("cases");
    fs::create_dir(&cases_dir).unwrap();
    fs::write(
        cases_dir.join("test_smoke.yml"),
        "\
cases:
  - case:
      name: smoke
      steps:
        - action: click
          element: ok_button
",
    )
    .unwrap();

    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    fast_engine(tmp.path())
        .run(&cases_dir, &mut device, &locator, &validator)
        .unwrap();

    let report_path = tmp.path().join("records/report.json");
    assert!(report_path.exists());
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(value["cases"][0]["name"], "smoke");
    assert_eq!(value["cases"][0]["passed"], true);
}

#[test]
fn test_multi_case_suite_executes_every_case() {
    // Every case in a file runs, not only the last-parsed one.
    let suite = "\
cases:
  - case:
      name: one
      steps: []
  - case:
      name: two
      steps: []
  - case:
      name: three
      steps: []
";
    let cases = parse_suite(suite).unwrap();

    let tmp = TempDir::new().unwrap();
    let log: CallLog = Rc::default();
    let mut device = FakeDevice::new(log.clone());
    let locator = FakeLocator::new(log.clone());
    let validator = FakeValidator::new(log.clone());

    let engine = fast_engine(tmp.path());
    let results: Vec<_> = cases
        .iter()
        .map(|c| engine.run_case(c, &mut device, &locator, &validator))
        .collect();

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
    let recordings = log
        .borrow()
        .iter()
        .filter(|c| c.starts_with("stop_recording:"))
        .count();
    assert_eq!(recordings, 3);
}
