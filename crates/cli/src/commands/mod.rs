pub mod ask;
pub mod chat;
pub mod config;
pub mod doctor;
pub mod tools;

use std::io;
use std::sync::Arc;

use serde::Serialize;
use tracing::Level;
use trailhead_agent::Engine;
use trailhead_core::catalog::Catalog;
use trailhead_core::config::{AppConfig, ConfigError, LoadOptions, LogFormat};

use crate::RuntimeArgs;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    })
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub(crate) fn load_config(runtime: &RuntimeArgs) -> Result<AppConfig, ConfigError> {
    AppConfig::load(LoadOptions { overrides: runtime.overrides(), ..LoadOptions::default() })
}

/// Loads configuration and catalog data and wires the engine, or explains why not.
pub(crate) fn build_engine(command: &str, runtime: &RuntimeArgs) -> Result<Engine, CommandResult> {
    let config = load_config(runtime).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let catalog = Catalog::load(&config.catalog).map_err(|error| {
        CommandResult::failure(command, "catalog_load", error.to_string(), 3)
    })?;

    Engine::from_config(&config, Arc::new(catalog))
        .map_err(|error| CommandResult::failure(command, "engine_bootstrap", error.to_string(), 4))
}

pub(crate) fn async_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            5,
        )
    })
}

/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(runtime: &RuntimeArgs) {
    let (level, format) = match load_config(runtime) {
        Ok(config) => (config.logging.level, config.logging.format),
        Err(_) => ("warn".to_string(), LogFormat::Compact),
    };
    let level = level.parse::<Level>().unwrap_or(Level::WARN);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr);
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
