use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use trailhead_core::config::AppConfig;

use crate::commands::load_config;
use crate::RuntimeArgs;

pub fn run(runtime: &RuntimeArgs) -> String {
    let config = match load_config(runtime) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for (key, value, env_keys, flagged) in entries(&config, runtime) {
        let source = if flagged {
            "flag".to_string()
        } else {
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
        };
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

type Entry = (&'static str, String, &'static [&'static str], bool);

fn entries(config: &AppConfig, runtime: &RuntimeArgs) -> Vec<Entry> {
    let api_key = match &config.llm.api_key {
        Some(key) => redact_secret(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        entry(
            "catalog.data_dir",
            config.catalog.data_dir.display().to_string(),
            &["TRAILHEAD_CATALOG_DATA_DIR"],
            runtime.data_dir.is_some(),
        ),
        entry(
            "catalog.orders_file",
            config.catalog.orders_file.clone(),
            &["TRAILHEAD_CATALOG_ORDERS_FILE"],
            false,
        ),
        entry(
            "catalog.products_file",
            config.catalog.products_file.clone(),
            &["TRAILHEAD_CATALOG_PRODUCTS_FILE"],
            false,
        ),
        entry(
            "llm.enabled",
            config.llm.enabled.to_string(),
            &["TRAILHEAD_LLM_ENABLED"],
            runtime.model_override,
        ),
        entry("llm.provider", config.llm.provider.as_str().to_string(), &["TRAILHEAD_LLM_PROVIDER"], false),
        entry("llm.api_key", api_key, &["TRAILHEAD_LLM_API_KEY"], false),
        entry(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<provider default>".to_string()),
            &["TRAILHEAD_LLM_BASE_URL"],
            false,
        ),
        entry("llm.model", config.llm.model.clone(), &["TRAILHEAD_LLM_MODEL"], false),
        entry(
            "llm.thinking_model",
            config.llm.thinking_model.clone(),
            &["TRAILHEAD_LLM_THINKING_MODEL"],
            false,
        ),
        entry(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["TRAILHEAD_LLM_TIMEOUT_SECS"],
            false,
        ),
        entry(
            "selector.model_override",
            config.selector.model_override.to_string(),
            &["TRAILHEAD_SELECTOR_MODEL_OVERRIDE"],
            runtime.model_override,
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["TRAILHEAD_SERVER_BIND_ADDRESS"],
            false,
        ),
        entry("server.port", config.server.port.to_string(), &["TRAILHEAD_SERVER_PORT"], false),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["TRAILHEAD_LOGGING_LEVEL", "TRAILHEAD_LOG_LEVEL"],
            runtime.log_level.is_some(),
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["TRAILHEAD_LOGGING_FORMAT", "TRAILHEAD_LOG_FORMAT"],
            false,
        ),
    ]
}

fn entry(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    flagged: bool,
) -> Entry {
    (key, value, env_keys, flagged)
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("trailhead.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/trailhead.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
