//! Appium-backed device client over the W3C WebDriver wire protocol.
//!
//! Connection is an explicit two-phase contract: [`AppiumClient::connect`]
//! creates the remote session and queries the window size, then returns the
//! handle. The HTTP transport is a spawned `curl`, one blocking call per
//! request.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use base64::Engine;
use tracing::{info, warn};

use crate::artifacts;
use crate::config::{Config, DeviceKind};
use crate::device::{DeviceClient, DeviceError, DeviceResult};
use crate::geometry::PixelPoint;

/// Wait after recording starts so the capture pipeline is rolling before the
/// first step acts
const RECORDING_WARMUP: Duration = Duration::from_secs(3);

/// Wait between tapping a text field and typing into it
const PRE_TYPE_DELAY: Duration = Duration::from_secs(1);

/// Connection timeout for driver requests (seconds)
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Milliseconds a tap holds the pointer down
const TAP_HOLD_MS: u64 = 100;

/// A WebDriver session against an Appium server
#[derive(Debug)]
pub struct AppiumClient {
    host: String,
    session_id: String,
    run_path: PathBuf,
    device_width: u32,
    device_height: u32,
}

impl AppiumClient {
    /// Create a device session and query the screen size.
    ///
    /// All blocking I/O of session setup happens here, not in a constructor.
    pub fn connect(kind: DeviceKind, config: &Config, run_path: &Path) -> DeviceResult<Self> {
        let caps = match kind {
            DeviceKind::Android => {
                info!(
                    "initialize Android client: app_package: {}, app_activity: {}",
                    config.app_package, config.app_activity
                );
                serde_json::json!({
                    "platformName": "Android",
                    "appium:appPackage": config.app_package,
                    "appium:appActivity": config.app_activity,
                    "appium:noReset": true,
                    "appium:automationName": "UiAutomator2",
                    "appium:newCommandTimeout": 3600,
                    "appium:sessionOverride": true,
                    "appium:dontStopAppOnReset": false
                })
            }
            DeviceKind::Ios => {
                info!("initialize iOS client");
                serde_json::json!({ "platformName": "iOS" })
            }
        };

        let body = serde_json::json!({ "capabilities": { "alwaysMatch": caps } });
        let value = http_json(&config.appium_server_host, "POST", "/session", Some(&body))?;

        let session_id = value["sessionId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DeviceError::ConnectFailed(format!("no session id in: {}", value)))?;

        let mut client = Self {
            host: config.appium_server_host.clone(),
            session_id,
            run_path: run_path.to_path_buf(),
            device_width: 0,
            device_height: 0,
        };

        let rect = client.request("GET", "/window/rect", None)?;
        client.device_width = rect["width"].as_u64().unwrap_or(0) as u32;
        client.device_height = rect["height"].as_u64().unwrap_or(0) as u32;
        if client.device_width == 0 || client.device_height == 0 {
            return Err(DeviceError::ConnectFailed(format!(
                "driver reported unusable window size: {}",
                rect
            )));
        }
        info!(
            "device width: {}, device height: {}",
            client.device_width, client.device_height
        );

        Ok(client)
    }

    /// End the device session
    pub fn quit(&mut self) {
        if let Err(err) = self.request("DELETE", "", None) {
            warn!("failed to end device session: {}", err);
        }
    }

    /// Issue one session-scoped WebDriver request
    fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> DeviceResult<serde_json::Value> {
        http_json(
            &self.host,
            method,
            &format!("/session/{}{}", self.session_id, path),
            body,
        )
    }

    fn perform_actions(&self, actions: serde_json::Value) -> DeviceResult<()> {
        self.request("POST", "/actions", Some(&serde_json::json!({ "actions": [actions] })))?;
        Ok(())
    }

    /// A W3C pointer action sequence built from the given item list
    fn pointer_sequence(items: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "type": "pointer",
            "id": "finger1",
            "parameters": { "pointerType": "touch" },
            "actions": items
        })
    }
}

impl DeviceClient for AppiumClient {
    fn screen_size(&self) -> (u32, u32) {
        (self.device_width, self.device_height)
    }

    fn take_screenshot(&mut self, name: &str) -> bool {
        let result = (|| -> DeviceResult<PathBuf> {
            let value = self.request("GET", "/screenshot", None)?;
            let encoded = value
                .as_str()
                .ok_or_else(|| DeviceError::Driver(format!("screenshot not a string: {}", value)))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| DeviceError::Driver(e.to_string()))?;

            let path = artifacts::screenshot_path(&self.run_path, name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
            Ok(path)
        })();

        match result {
            Ok(path) => {
                info!("screenshot saved successfully, path: {}", path.display());
                true
            }
            Err(err) => {
                warn!("screenshot error: {}", err);
                false
            }
        }
    }

    fn start_recording(&mut self) -> bool {
        match self.request(
            "POST",
            "/appium/start_recording_screen",
            Some(&serde_json::json!({})),
        ) {
            Ok(_) => {
                thread::sleep(RECORDING_WARMUP);
                true
            }
            Err(err) => {
                warn!("start screenrecord error: {}", err);
                false
            }
        }
    }

    fn stop_recording(&mut self, case_name: &str) -> bool {
        let result = (|| -> DeviceResult<PathBuf> {
            let value = self.request(
                "POST",
                "/appium/stop_recording_screen",
                Some(&serde_json::json!({})),
            )?;
            let encoded = value
                .as_str()
                .ok_or_else(|| DeviceError::Driver(format!("recording not a string: {}", value)))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| DeviceError::Driver(e.to_string()))?;

            let path = artifacts::recording_path(&self.run_path, case_name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
            Ok(path)
        })();

        match result {
            Ok(path) => {
                info!("screenrecord saved successfully, path: {}", path.display());
                true
            }
            Err(err) => {
                warn!("stop screenrecord error: {}", err);
                false
            }
        }
    }

    fn tap(&mut self, at: PixelPoint) -> bool {
        let sequence = Self::pointer_sequence(serde_json::json!([
            { "type": "pointerMove", "duration": 0, "x": at.x, "y": at.y },
            { "type": "pointerDown", "button": 0 },
            { "type": "pause", "duration": TAP_HOLD_MS },
            { "type": "pointerUp", "button": 0 }
        ]));

        match self.perform_actions(sequence) {
            Ok(()) => true,
            Err(err) => {
                warn!("tap at coordinate failed: {}", err);
                false
            }
        }
    }

    fn type_text(&mut self, at: PixelPoint, text: &str) -> bool {
        // Focus the field first, then give the keyboard time to come up.
        if !self.tap(at) {
            return false;
        }
        thread::sleep(PRE_TYPE_DELAY);

        let key_items: Vec<serde_json::Value> = text
            .chars()
            .flat_map(|c| {
                let value = c.to_string();
                [
                    serde_json::json!({ "type": "keyDown", "value": value }),
                    serde_json::json!({ "type": "keyUp", "value": value }),
                ]
            })
            .collect();

        let sequence = serde_json::json!({
            "type": "key",
            "id": "keyboard",
            "actions": key_items
        });

        match self.perform_actions(sequence) {
            Ok(()) => true,
            Err(err) => {
                warn!("send keys failed: {}", err);
                false
            }
        }
    }

    fn drag(&mut self, from: PixelPoint, to: PixelPoint, duration_ms: u64) -> bool {
        let sequence = Self::pointer_sequence(serde_json::json!([
            { "type": "pointerMove", "duration": 0, "x": from.x, "y": from.y },
            { "type": "pointerDown", "button": 0 },
            { "type": "pause", "duration": duration_ms },
            { "type": "pointerMove", "duration": duration_ms, "x": to.x, "y": to.y },
            { "type": "pointerUp", "button": 0 }
        ]));

        match self.perform_actions(sequence) {
            Ok(()) => true,
            Err(err) => {
                warn!("drag from coordinate failed: {}", err);
                false
            }
        }
    }
}

/// Issue one WebDriver request and unwrap its `value` payload
fn http_json(
    host: &str,
    method: &str,
    path: &str,
    body: Option<&serde_json::Value>,
) -> DeviceResult<serde_json::Value> {
    let url = format!("{}{}", host.trim_end_matches('/'), path);

    let mut args = vec![
        "-s".to_string(),
        "-X".to_string(),
        method.to_string(),
        url,
        "-H".to_string(),
        "Content-Type: application/json".to_string(),
        "--connect-timeout".to_string(),
        CONNECT_TIMEOUT_SECS.to_string(),
    ];
    if let Some(body) = body {
        let body_json = serde_json::to_string(body)
            .map_err(|e| DeviceError::Driver(e.to_string()))?;
        args.push("-d".to_string());
        args.push(body_json);
    }

    let output = Command::new("curl").args(&args).output()?;
    if !output.status.success() {
        return Err(DeviceError::ConnectFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let response: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| DeviceError::Driver(format!("invalid driver response: {}", e)))?;

    let value = response["value"].clone();
    if let Some(error) = value["error"].as_str() {
        let message = value["message"].as_str().unwrap_or("");
        return Err(DeviceError::Driver(format!("{}: {}", error, message)));
    }

    Ok(value)
}
