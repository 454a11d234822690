use std::path::PathBuf;
use std::time::Instant;

use careline_agent::AgentRuntime;
use careline_core::state::ConversationState;

use super::CommandResult;

struct Scenario {
    name: &'static str,
    turns: &'static [&'static str],
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "Premium customer, financial hardship",
        turns: &[
            "I want to cancel my Care+ subscription, I just can't afford it anymore. My email is sarah.chen@email.com",
            "What does the payment pause involve exactly?",
            "OK, let's do the pause then. Thanks!",
        ],
    },
    Scenario {
        name: "Overheating device with return intent",
        turns: &[
            "My phone keeps overheating and I want to return it and cancel. I'm mike.t@email.com",
            "A free replacement sounds good, yes.",
        ],
    },
    Scenario {
        name: "Determined cancellation",
        turns: &[
            "Just cancel my subscription. No offers please. My id is CUST_001",
            "Yes, I'm sure. Cancel it.",
        ],
    },
    Scenario {
        name: "Technical question only",
        turns: &["My screen started flickering after the last update. How do I fix it?"],
    },
    Scenario {
        name: "Billing inquiry without identification",
        turns: &["Why was I charged $15.99 twice this month?"],
    },
];

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let config = match super::load_config(config_path, None, None) {
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

    let mut failures = 0u32;
    for (number, scenario) in SCENARIOS.iter().enumerate() {
        println!("=== Scenario {}: {} ===", number + 1, scenario.name);
        let mut state = ConversationState::new();
        for utterance in scenario.turns {
            println!("You: {utterance}");
            let started = Instant::now();
            match tokio_runtime.block_on(runtime.step(std::mem::take(&mut state), utterance)) {
                Ok(next_state) => {
                    state = next_state;
                    println!(
                        "Agent: {}  ({:.1}s)",
                        runtime.reply(&state),
                        started.elapsed().as_secs_f64()
                    );
                }
                Err(error) => {
                    failures += 1;
                    println!("{}", error.operator_message());
                    break;
                }
            }
        }
        println!(
            "(resolved route: {})\n",
            state.pending_route.map(|route| route.as_str()).unwrap_or("none")
        );
    }

    if failures > 0 {
        CommandResult::failure(format!("{failures} scenario(s) aborted on errors"))
    } else {
        CommandResult { exit_code: 0, output: "all scenarios completed".to_string() }
    }
}
