//! Device automation client interface.
//!
//! The engine drives a single physical device through this trait. Every
//! operation is best-effort and boolean-returning: driver hiccups are logged
//! by the implementation and never raised into the engine, which keeps
//! artifact problems (a failed screenshot, a lost recording) from crashing a
//! run. The screen size is queried from the driver once at connect time and
//! treated as immutable for the whole run.

pub mod appium;

use crate::geometry::PixelPoint;

pub use appium::AppiumClient;

/// Result type for device connection
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors that can occur while establishing a device session
#[derive(Debug)]
pub enum DeviceError {
    /// Session could not be created
    ConnectFailed(String),
    /// The driver rejected or garbled a request
    Driver(String),
    /// IO error while talking to the driver or writing artifacts
    Io(std::io::Error),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::ConnectFailed(msg) => write!(f, "connect failed: {}", msg),
            DeviceError::Driver(msg) => write!(f, "driver error: {}", msg),
            DeviceError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Io(err)
    }
}

/// A connected device-under-test session
pub trait DeviceClient {
    /// Device pixel dimensions, cached at connect time
    fn screen_size(&self) -> (u32, u32);

    /// Capture a screenshot to `records/screencaps/{name}.png`
    fn take_screenshot(&mut self, name: &str) -> bool;

    /// Start screen recording for the current case
    fn start_recording(&mut self) -> bool;

    /// Stop recording and persist it to `records/screenrecords/{case_name}.mp4`
    fn stop_recording(&mut self, case_name: &str) -> bool;

    /// Tap at an absolute pixel position
    fn tap(&mut self, at: PixelPoint) -> bool;

    /// Tap a text field and type into it
    fn type_text(&mut self, at: PixelPoint, text: &str) -> bool;

    /// Drag from one pixel position to another over the given duration
    fn drag(&mut self, from: PixelPoint, to: PixelPoint, duration_ms: u64) -> bool;
}
