use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use app_vision::config::{BackendKind, Config, ConfigError};
use app_vision::device::AppiumClient;
use app_vision::engine::Engine;
use app_vision::vision::{LocalLocator, LocalValidator, Locator, RemoteLocator, RemoteValidator, Validator};

/// App Vision - Automated mobile UI testing with vision model element location
#[derive(Parser, Debug)]
#[command(
    name = "app-vision",
    about = "Automated mobile UI testing with device automation and vision model element location",
    after_help = "ENVIRONMENT VARIABLES:\n\
        APP_VISION_CONFIG_FILE      Configuration file path\n\
        APP_VISION_CASE_PATH        Case file or directory path\n\
        APP_VISION_APPIUM_HOST      Device automation server host"
)]
struct Args {
    /// Configuration file path (default: ./config.yml)
    #[arg(long, env = "APP_VISION_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Case file or directory path (default: ./cases/)
    #[arg(long, env = "APP_VISION_CASE_PATH")]
    case_path: Option<PathBuf>,

    /// Device automation server host
    #[arg(long, env = "APP_VISION_APPIUM_HOST")]
    appium_server_host: Option<String>,

    /// Locate model type, support: local, remote
    #[arg(long)]
    locate_model_type: Option<String>,

    /// Locate model remote host
    #[arg(long)]
    locate_model_host: Option<String>,

    /// Validate model type, support: local, remote
    #[arg(long)]
    validate_model_type: Option<String>,

    /// Validate model remote host
    #[arg(long)]
    validate_model_host: Option<String>,

    /// Device type, support: android, ios
    #[arg(long)]
    device_type: Option<String>,

    /// Application package name
    #[arg(long)]
    app_package: Option<String>,

    /// Application activity name
    #[arg(long)]
    app_activity: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let run_path = std::env::current_dir()?;
    tracing::info!("the running path is: {}", run_path.display());

    let config_path = args
        .config_file
        .map(|p| if p.is_absolute() { p } else { run_path.join(p) })
        .unwrap_or_else(|| run_path.join("config.yml"));
    let mut config = Config::load(&config_path)?;

    // CLI overrides take precedence over the file.
    if let Some(host) = args.appium_server_host {
        config.appium_server_host = host;
    }
    if let Some(kind) = args.locate_model_type {
        config.locate_model_type = kind;
    }
    if let Some(host) = args.locate_model_host {
        config.locate_model_host = host;
    }
    if let Some(kind) = args.validate_model_type {
        config.validate_model_type = kind;
    }
    if let Some(host) = args.validate_model_host {
        config.validate_model_host = host;
    }
    if let Some(kind) = args.device_type {
        config.device_type = kind;
    }
    if let Some(package) = args.app_package {
        config.app_package = package;
    }
    if let Some(activity) = args.app_activity {
        config.app_activity = activity;
    }

    let case_path = args.case_path.unwrap_or_else(|| run_path.join("cases"));

    let device_kind = config.device_kind()?;
    let locator = build_locator(&config)?;
    let validator = build_validator(&config)?;

    let mut client = AppiumClient::connect(device_kind, &config, &run_path)?;

    let engine = Engine::new(&run_path);
    let report = engine.run(&case_path, &mut client, locator.as_ref(), validator.as_ref())?;
    client.quit();

    let passed = report.cases.iter().filter(|c| c.passed).count();
    tracing::info!("run finished: {}/{} cases passed", passed, report.cases.len());

    Ok(())
}

fn build_locator(config: &Config) -> Result<Box<dyn Locator>, Box<dyn Error>> {
    match config.locate_backend()? {
        BackendKind::Remote => {
            if config.locate_model_host.is_empty() {
                return Err(ConfigError::MissingSetting("locate-model-host").into());
            }
            Ok(Box::new(RemoteLocator::new(&config.locate_model_host)))
        }
        BackendKind::Local => {
            if config.locate_model_cmd.is_empty() {
                return Err(ConfigError::MissingSetting("locate-model-cmd").into());
            }
            Ok(Box::new(LocalLocator::new(&config.locate_model_cmd)?))
        }
    }
}

fn build_validator(config: &Config) -> Result<Box<dyn Validator>, Box<dyn Error>> {
    match config.validate_backend()? {
        BackendKind::Remote => {
            if config.validate_model_host.is_empty() {
                return Err(ConfigError::MissingSetting("validate-model-host").into());
            }
            Ok(Box::new(RemoteValidator::new(&config.validate_model_host)))
        }
        BackendKind::Local => {
            if config.validate_model_cmd.is_empty() {
                return Err(ConfigError::MissingSetting("validate-model-cmd").into());
            }
            Ok(Box::new(LocalValidator::new(&config.validate_model_cmd)?))
        }
    }
}
