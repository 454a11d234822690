pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "careline",
    about = "Careline support agent CLI",
    long_about = "Run the Aurora Electronics Care+ support agent interactively, replay canned \
                  scenarios, and inspect runtime readiness and configuration.",
    after_help = "Examples:\n  careline chat\n  careline scenarios\n  careline doctor --json\n  careline config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive support conversation on stdin/stdout")]
    Chat {
        #[arg(long, help = "Path to a careline.toml config file")]
        config: Option<PathBuf>,
        #[arg(long, help = "Directory holding customers.csv, retention_rules.json, and policy_documents/")]
        resources: Option<PathBuf>,
        #[arg(long, help = "Override the configured LLM model")]
        model: Option<String>,
    },
    #[command(about = "Replay the canned multi-turn demo scenarios against the live model")]
    Scenarios {
        #[arg(long, help = "Path to a careline.toml config file")]
        config: Option<PathBuf>,
    },
    #[command(about = "Validate config, resource files, and LLM credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { config, resources, model } => commands::chat::run(config, resources, model),
        Command::Scenarios { config } => commands::scenarios::run(config),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
