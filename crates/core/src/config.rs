use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub resources: ResourcesConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Fixed backoff before the single retry of a failed LLM call.
    pub retry_backoff_ms: u64,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct ResourcesConfig {
    pub customers_path: PathBuf,
    pub rules_path: PathBuf,
    pub policy_docs_dir: PathBuf,
    pub status_log_path: PathBuf,
}

/// Tuned agent-loop constants. Defaults come from the production tuning;
/// they are configuration, not invariants.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_tool_rounds: u32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub search_top_k: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub log_level: Option<String>,
    pub resources_dir: Option<PathBuf>,
    pub status_log_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                retry_backoff_ms: 1_000,
                // keep replies short; the prompts ask for 2-3 sentences
                max_output_tokens: 400,
                temperature: 0.0,
            },
            resources: ResourcesConfig::rooted_at(Path::new("resources")),
            agent: AgentConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_tool_rounds: 6, chunk_size: 800, chunk_overlap: 150, search_top_k: 3 }
    }
}

impl ResourcesConfig {
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            customers_path: dir.join("customers.csv"),
            rules_path: dir.join("retention_rules.json"),
            policy_docs_dir: dir.join("policy_documents"),
            status_log_path: PathBuf::from("status_logs/actions.log"),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("careline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides();
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(retry_backoff_ms) = llm.retry_backoff_ms {
                self.llm.retry_backoff_ms = retry_backoff_ms;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(resources) = patch.resources {
            if let Some(customers_path) = resources.customers_path {
                self.resources.customers_path = customers_path;
            }
            if let Some(rules_path) = resources.rules_path {
                self.resources.rules_path = rules_path;
            }
            if let Some(policy_docs_dir) = resources.policy_docs_dir {
                self.resources.policy_docs_dir = policy_docs_dir;
            }
            if let Some(status_log_path) = resources.status_log_path {
                self.resources.status_log_path = status_log_path;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_tool_rounds) = agent.max_tool_rounds {
                self.agent.max_tool_rounds = max_tool_rounds;
            }
            if let Some(chunk_size) = agent.chunk_size {
                self.agent.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = agent.chunk_overlap {
                self.agent.chunk_overlap = chunk_overlap;
            }
            if let Some(search_top_k) = agent.search_top_k {
                self.agent.search_top_k = search_top_k;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = env::var("CARELINE_LLM_API_KEY") {
            if !api_key.is_empty() {
                self.llm.api_key = Some(api_key.into());
            }
        }
        if let Ok(model) = env::var("CARELINE_LLM_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }
        if let Ok(base_url) = env::var("CARELINE_LLM_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = base_url;
            }
        }
        if let Ok(level) = env::var("CARELINE_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(dir) = env::var("CARELINE_RESOURCES_DIR") {
            if !dir.is_empty() {
                let status_log = self.resources.status_log_path.clone();
                self.resources = ResourcesConfig::rooted_at(Path::new(&dir));
                self.resources.status_log_path = status_log;
            }
        }
        if let Ok(path) = env::var("CARELINE_STATUS_LOG_PATH") {
            if !path.is_empty() {
                self.resources.status_log_path = PathBuf::from(path);
            }
        }
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.base_url {
            self.llm.base_url = base_url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(dir) = overrides.resources_dir {
            let status_log = self.resources.status_log_path.clone();
            self.resources = ResourcesConfig::rooted_at(&dir);
            self.resources.status_log_path = status_log;
        }
        if let Some(path) = overrides.status_log_path {
            self.resources.status_log_path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url must not be empty".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be in range 1..=300".to_string(),
            ));
        }
        if self.agent.max_tool_rounds == 0 || self.agent.max_tool_rounds > 32 {
            return Err(ConfigError::Validation(
                "agent.max_tool_rounds must be in range 1..=32".to_string(),
            ));
        }
        if self.agent.chunk_size == 0 || self.agent.chunk_overlap >= self.agent.chunk_size {
            return Err(ConfigError::Validation(
                "agent.chunk_overlap must be smaller than agent.chunk_size".to_string(),
            ));
        }
        if self.agent.search_top_k == 0 {
            return Err(ConfigError::Validation(
                "agent.search_top_k must be greater than zero".to_string(),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Validation(format!(
                "logging.level `{}` is not a valid tracing level",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    resources: Option<ResourcesPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    retry_backoff_ms: Option<u64>,
    max_output_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourcesPatch {
    customers_path: Option<PathBuf>,
    rules_path: Option<PathBuf>,
    policy_docs_dir: Option<PathBuf>,
    status_log_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_tool_rounds: Option<u32>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    search_top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }
    [PathBuf::from("careline.toml"), PathBuf::from("config/careline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }
            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }
        output.push(ch);
    }
    Ok(output)
}
