//! App Vision - Automated mobile UI testing with vision model element location.
//!
//! This crate provides:
//! - A test execution engine turning YAML-declared cases into device actions
//! - Coordinate mapping between model-space ratios and device pixels
//! - An Appium-backed device client (screenshots, taps, swipes, recording)
//! - Locate/validate vision model backends, local and remote
//! - Per-case screen recording and a structured run report
//!
//! # Example
//!
//! ```rust,no_run
//! use app_vision::case::parse_suite;
//! use app_vision::engine::Engine;
//!
//! let cases = parse_suite("cases:\n  - case:\n      name: smoke\n      steps: []").unwrap();
//! let engine = Engine::new(std::env::current_dir().unwrap());
//! let _ = (cases, engine);
//! ```

pub mod artifacts;
pub mod case;
pub mod config;
pub mod device;
pub mod engine;
pub mod geometry;
pub mod vision;

// Re-export the case model
pub use case::{Case, ParseError, ParseResult, Step, load_suite, parse_suite};

// Re-export configuration
pub use config::{BackendKind, Config, ConfigError, ConfigResult, DeviceKind};

// Re-export device client types
pub use device::{AppiumClient, DeviceClient, DeviceError, DeviceResult};

// Re-export the engine
pub use engine::{CaseResult, Engine, EngineOptions, RunReport};

// Re-export geometry types
pub use geometry::{GeometryError, GeometryResult, PixelPoint, RatioPoint};

// Re-export vision model capabilities
pub use vision::{
    LocalLocator, LocalValidator, Locator, ModelError, ModelResult, RemoteLocator,
    RemoteValidator, Validator,
};
