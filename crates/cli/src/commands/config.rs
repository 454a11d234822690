use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use careline_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: Option<&str>| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", Some("CARELINE_LLM_MODEL"))));
    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", Some("CARELINE_LLM_BASE_URL")),
    ));
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "llm.api_key",
        api_key,
        source("llm.api_key", Some("CARELINE_LLM_API_KEY")),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", None),
    ));
    lines.push(render_line(
        "llm.retry_backoff_ms",
        &config.llm.retry_backoff_ms.to_string(),
        source("llm.retry_backoff_ms", None),
    ));

    lines.push(render_line(
        "resources.customers_path",
        &config.resources.customers_path.display().to_string(),
        source("resources.customers_path", Some("CARELINE_RESOURCES_DIR")),
    ));
    lines.push(render_line(
        "resources.rules_path",
        &config.resources.rules_path.display().to_string(),
        source("resources.rules_path", Some("CARELINE_RESOURCES_DIR")),
    ));
    lines.push(render_line(
        "resources.policy_docs_dir",
        &config.resources.policy_docs_dir.display().to_string(),
        source("resources.policy_docs_dir", Some("CARELINE_RESOURCES_DIR")),
    ));
    lines.push(render_line(
        "resources.status_log_path",
        &config.resources.status_log_path.display().to_string(),
        source("resources.status_log_path", Some("CARELINE_STATUS_LOG_PATH")),
    ));

    lines.push(render_line(
        "agent.max_tool_rounds",
        &config.agent.max_tool_rounds.to_string(),
        source("agent.max_tool_rounds", None),
    ));
    lines.push(render_line(
        "agent.chunk_size",
        &config.agent.chunk_size.to_string(),
        source("agent.chunk_size", None),
    ));
    lines.push(render_line(
        "agent.chunk_overlap",
        &config.agent.chunk_overlap.to_string(),
        source("agent.chunk_overlap", None),
    ));
    lines.push(render_line(
        "agent.search_top_k",
        &config.agent.search_top_k.to_string(),
        source("agent.search_top_k", None),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", Some("CARELINE_LOG_LEVEL")),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", None),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("careline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/careline.toml");
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
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
