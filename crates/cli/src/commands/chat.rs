use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use careline_agent::AgentRuntime;
use careline_core::errors::AgentError;
use careline_core::state::ConversationState;

use super::CommandResult;

pub fn run(
    config_path: Option<PathBuf>,
    resources_dir: Option<PathBuf>,
    model: Option<String>,
) -> CommandResult {
    let config = match super::load_config(config_path, resources_dir, model) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure(format!("config validation failed: {error}")),
    };
    super::init_logging(&config);

    let runtime = match AgentRuntime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure(error.operator_message()),
    };

    let tokio_runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => {
            return CommandResult::failure(format!("failed to initialize async runtime: {error}"))
        }
    };

    print_banner(&runtime);

    let stdin = io::stdin();
    let mut state = ConversationState::new();
    let mut turns = 0u32;
    let session_started = Instant::now();

    loop {
        print!("You: ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => return CommandResult::failure(format!("stdin read failed: {error}")),
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if matches!(utterance.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        let api_before = state.api_time;
        let turn_started = Instant::now();
        match tokio_runtime.block_on(runtime.step(std::mem::take(&mut state), utterance)) {
            Ok(next_state) => {
                state = next_state;
                turns += 1;
                println!("\nAgent: {}", runtime.reply(&state));
                println!(
                    "  ({:.1}s total, {:.1}s model)\n",
                    turn_started.elapsed().as_secs_f64(),
                    (state.api_time - api_before).as_secs_f64()
                );
            }
            Err(error @ AgentError::MissingCredentials(_)) => {
                return CommandResult::failure(error.operator_message());
            }
            Err(error) => {
                println!("\n{}\n", error.operator_message());
            }
        }
    }

    println!(
        "\nGoodbye! {turns} turn(s), {:.1}s session, {:.1}s model time.",
        session_started.elapsed().as_secs_f64(),
        state.api_time.as_secs_f64()
    );
    CommandResult::silent()
}

fn print_banner(runtime: &AgentRuntime) {
    println!("Aurora Electronics Care+ support (type 'quit' to exit)");
    let examples = runtime.store().customers().example_identifiers();
    if !examples.is_empty() {
        println!("Try identifying yourself with e.g. {}", examples.join(", "));
    }
    println!();
}
