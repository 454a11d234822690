pub mod chat;
pub mod config;
pub mod doctor;
pub mod scenarios;

use std::path::PathBuf;

use careline_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn silent() -> Self {
        Self { exit_code: 0, output: String::new() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { exit_code: 1, output: message.into() }
    }
}

/// Shared config loading for the interactive commands.
pub(crate) fn load_config(
    config_path: Option<PathBuf>,
    resources_dir: Option<PathBuf>,
    model: Option<String>,
) -> Result<AppConfig, careline_core::ConfigError> {
    AppConfig::load(LoadOptions {
        require_file: config_path.is_some(),
        config_path,
        overrides: ConfigOverrides { resources_dir, model, ..ConfigOverrides::default() },
    })
}

/// Install the global tracing subscriber from the logging section.
pub(crate) fn init_logging(config: &AppConfig) {
    let log_level =
        config.logging.level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
