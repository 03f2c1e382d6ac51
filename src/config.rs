//! Run configuration loaded from `config.yml`.
//!
//! Keys use the kebab-case convention of the config file:
//!
//! | Key | Description | Default |
//! |-----|-------------|---------|
//! | `appium-server-host` | Device automation server URL | `http://127.0.0.1:4723` |
//! | `locate-model-type` | `local` or `remote` | `local` |
//! | `locate-model-host` | Remote locate model base URL | empty |
//! | `locate-model-cmd` | Local locate inference command | empty |
//! | `validate-model-type` | `local` or `remote` | `local` |
//! | `validate-model-host` | Remote validate model base URL | empty |
//! | `validate-model-cmd` | Local validate inference command | empty |
//! | `device-type` | `android` or `ios` | empty (must be set) |
//! | `app-package` | Application package name (Android) | empty |
//! | `app-activity` | Application activity name (Android) | empty |
//!
//! CLI flags override the file; configuration problems are fatal and surface
//! before any case runs.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

/// Default device automation server host
pub const DEFAULT_APPIUM_HOST: &str = "http://127.0.0.1:4723";

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that make a run impossible before any case executes
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io(std::io::Error),
    /// Config file is not valid YAML
    Yaml(serde_yaml_ng::Error),
    /// `device-type` is missing or not one of the supported platforms
    UnsupportedDevice(String),
    /// A model backend type is not one of `local`/`remote`
    UnsupportedBackend(String),
    /// A backend needs a setting that is empty
    MissingSetting(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "I/O error: {}", err),
            ConfigError::Yaml(err) => write!(f, "YAML error: {}", err),
            ConfigError::UnsupportedDevice(value) => {
                write!(f, "device type is not supported: {}", value)
            }
            ConfigError::UnsupportedBackend(value) => {
                write!(f, "model backend is not supported: {}", value)
            }
            ConfigError::MissingSetting(key) => {
                write!(f, "required setting is empty: {}", key)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

/// Supported device platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Android,
    Ios,
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "android" => Ok(DeviceKind::Android),
            "ios" => Ok(DeviceKind::Ios),
            other => Err(ConfigError::UnsupportedDevice(other.to_string())),
        }
    }
}

/// Where a locate/validate model runs.
///
/// This is a startup-time strategy choice; once selected, the engine only
/// sees the [`crate::vision::Locator`] and [`crate::vision::Validator`]
/// traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Inference runs on the local machine
    Local,
    /// Inference is served by a remote OpenAI-compatible endpoint
    Remote,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            other => Err(ConfigError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Parsed run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Device automation server URL
    pub appium_server_host: String,

    /// Locate model backend type (`local`/`remote`)
    pub locate_model_type: String,
    /// Remote locate model base URL
    pub locate_model_host: String,
    /// Local locate inference command
    pub locate_model_cmd: String,

    /// Validate model backend type (`local`/`remote`)
    pub validate_model_type: String,
    /// Remote validate model base URL
    pub validate_model_host: String,
    /// Local validate inference command
    pub validate_model_cmd: String,

    /// Device platform (`android`/`ios`)
    pub device_type: String,

    /// Application package name
    pub app_package: String,
    /// Application activity name
    pub app_activity: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            appium_server_host: DEFAULT_APPIUM_HOST.to_string(),
            locate_model_type: "local".to_string(),
            locate_model_host: String::new(),
            locate_model_cmd: String::new(),
            validate_model_type: "local".to_string(),
            validate_model_host: String::new(),
            validate_model_cmd: String::new(),
            device_type: String::new(),
            app_package: String::new(),
            app_activity: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file, or from `config.yml` inside a directory
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let file = if path.is_dir() { path.join("config.yml") } else { path.to_path_buf() };
        info!("load config from path: {}", file.display());

        let source = fs::read_to_string(&file)?;
        Ok(serde_yaml_ng::from_str(&source)?)
    }

    /// The device platform, validated
    pub fn device_kind(&self) -> ConfigResult<DeviceKind> {
        self.device_type.parse()
    }

    /// The locate backend, validated
    pub fn locate_backend(&self) -> ConfigResult<BackendKind> {
        self.locate_model_type.parse()
    }

    /// The validate backend, validated
    pub fn validate_backend(&self) -> ConfigResult<BackendKind> {
        self.validate_model_type.parse()
    }
}
