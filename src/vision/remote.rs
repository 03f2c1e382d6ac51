//! Remote model backends over an OpenAI-compatible chat-completions API.
//!
//! Requests POST to `{host}/v1/chat/completions` with the screenshot embedded
//! as a base64 data URL. The transport is a spawned `curl` with a connect
//! timeout; a hung server past connection setup hangs the step, by design —
//! timeout policy lives here, not in the engine.

use std::path::Path;
use std::process::Command;

use base64::Engine;
use tracing::{debug, info};

use crate::artifacts;
use crate::geometry::RatioPoint;
use crate::vision::{
    LOCATE_MODEL, LOCATE_PROMPT, Locator, ModelError, ModelResult, VALIDATE_MODEL,
    VALIDATE_PROMPT, Validator, parse_ratio_pair, parse_verdict,
};

/// Connection timeout for model requests (seconds)
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Shared chat-completions transport for the remote backends
#[derive(Debug, Clone)]
pub struct RemoteModel {
    host: String,
    model: String,
}

impl RemoteModel {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self { host: host.into(), model: model.into() }
    }

    /// Send one prompt + screenshot + query message, returning the answer text
    fn chat(&self, prompt: &str, screenshot: &Path, query: &str) -> ModelResult<String> {
        let image_data = std::fs::read(screenshot)?;
        let img_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:image/png;base64,{}", img_base64)
                        }
                    },
                    { "type": "text", "text": query }
                ]
            }]
        });

        let request_json = serde_json::to_string(&request)
            .map_err(|e| ModelError::MalformedOutput(e.to_string()))?;

        let endpoint = format!("{}/v1/chat/completions", self.host);
        debug!("model request to {}", endpoint);

        let output = Command::new("curl")
            .args([
                "-s",
                "-X", "POST",
                &endpoint,
                "-H", "Content-Type: application/json",
                "-d", &request_json,
                "--connect-timeout", &CONNECT_TIMEOUT_SECS.to_string(),
            ])
            .output()?;

        if !output.status.success() {
            return Err(ModelError::Transport(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let response: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ModelError::MalformedOutput(e.to_string()))?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ModelError::MalformedOutput(response.to_string()))
    }
}

/// Locate backend served by a remote model endpoint
#[derive(Debug, Clone)]
pub struct RemoteLocator {
    model: RemoteModel,
}

impl RemoteLocator {
    pub fn new(host: impl Into<String>) -> Self {
        info!("locate model initialized in Remote mode");
        Self { model: RemoteModel::new(host, LOCATE_MODEL) }
    }
}

impl Locator for RemoteLocator {
    fn locate(&self, query: &str, screenshot: &Path) -> ModelResult<RatioPoint> {
        let answer = self.model.chat(LOCATE_PROMPT, screenshot, query)?;
        let point = parse_ratio_pair(&answer)?;
        if point.in_range() {
            artifacts::mark_point_best_effort(screenshot, point);
        }
        Ok(point)
    }
}

/// Validate backend served by a remote model endpoint
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    model: RemoteModel,
}

impl RemoteValidator {
    pub fn new(host: impl Into<String>) -> Self {
        info!("validate model initialized in Remote mode");
        Self { model: RemoteModel::new(host, VALIDATE_MODEL) }
    }
}

impl Validator for RemoteValidator {
    fn validate(&self, validation: &str, screenshot: &Path) -> ModelResult<bool> {
        let answer = self.model.chat(VALIDATE_PROMPT, screenshot, validation)?;
        info!("the validation result is: {}", answer.trim());
        Ok(parse_verdict(&answer))
    }
}
