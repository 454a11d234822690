//! Stage graph: Greeter, Problem Solver, Processor, chained by the route
//! the model sets. One `run_turn` call drives the whole traversal for a
//! single user utterance.

use careline_core::errors::AgentError;
use careline_core::keywords;
use careline_core::sanitize::present;
use careline_core::state::{ConversationState, Route};

use crate::engine::AgentStep;
use crate::fallback;
use crate::llm::LlmClient;
use crate::tools::Toolset;

/// The three LLM-driven nodes of the conversation graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Greeter,
    ProblemSolver,
    Processor,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeter => "greeter",
            Self::ProblemSolver => "problem_solver",
            Self::Processor => "processor",
        }
    }
}

/// Holds the pieces one turn needs and walks the stages until the route
/// terminates.
pub struct StageGraph<'a> {
    llm: &'a dyn LlmClient,
    toolset: &'a Toolset,
    max_tool_rounds: u32,
    retry_backoff: std::time::Duration,
}

impl<'a> StageGraph<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        toolset: &'a Toolset,
        max_tool_rounds: u32,
        retry_backoff: std::time::Duration,
    ) -> Self {
        Self { llm, toolset, max_tool_rounds, retry_backoff }
    }

    /// Process one user utterance to completion. The returned state holds
    /// the full history including the final assistant reply.
    pub async fn run_turn(
        &self,
        mut state: ConversationState,
        utterance: &str,
    ) -> Result<ConversationState, AgentError> {
        let turn_id = uuid::Uuid::new_v4();
        state.push_user(utterance);
        state.pending_route = None;

        let mut stage = Stage::Greeter;
        loop {
            tracing::info!(
                event_name = "graph.stage.enter",
                %turn_id,
                stage = stage.as_str(),
                "entering stage"
            );
            let step = AgentStep::new(self.llm, self.toolset, self.max_tool_rounds, self.retry_backoff);
            state = step.run(state, stage).await?;
            if stage == Stage::Greeter {
                apply_route_override(&mut state);
            }

            match next_stage(stage, state.pending_route) {
                Some(next) => stage = next,
                None => break,
            }
        }

        tracing::info!(
            event_name = "graph.turn.complete",
            %turn_id,
            route = state.pending_route.map(|r| r.as_str()).unwrap_or("none"),
            api_ms = state.api_time.as_millis() as u64,
            "turn complete"
        );
        Ok(state)
    }
}

/// A device fault plus cancel intent must always get a retention attempt,
/// whatever the model decided. Applies to the Greeter transition only: a
/// customer who insists on cancelling after the retention pitch proceeds
/// to the Processor unimpeded.
fn apply_route_override(state: &mut ConversationState) {
    if state.pending_route == Some(Route::Retention) {
        return;
    }
    let last_user = state.last_user_text();
    if keywords::contains_any(&last_user, keywords::DEVICE_FAULT_WORDS)
        && keywords::contains_any(&last_user, keywords::CANCEL_INTENT_WORDS)
    {
        tracing::info!(
            event_name = "graph.route.override",
            from = state.pending_route.map(|r| r.as_str()).unwrap_or("none"),
            "device fault with cancel intent, forcing retention"
        );
        state.pending_route = Some(Route::Retention);
    }
}

fn next_stage(current: Stage, route: Option<Route>) -> Option<Stage> {
    match (current, route) {
        (Stage::Greeter, Some(Route::Retention)) => Some(Stage::ProblemSolver),
        (Stage::Greeter, Some(Route::Cancel)) => Some(Stage::Processor),
        (Stage::ProblemSolver, Some(Route::Cancel)) => Some(Stage::Processor),
        _ => None,
    }
}

/// The reply a caller should show for the turn: the sanitized last
/// assistant message, or the per-route fallback when there is none.
pub fn visible_reply(state: &ConversationState) -> String {
    match state.last_assistant_text() {
        Some(text) if !text.trim().is_empty() => present(text),
        _ => fallback::reply_for_route(state.pending_route).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use careline_core::state::{ChatMessage, ConversationState, Route};

    use super::{apply_route_override, next_stage, visible_reply, Stage};

    fn state_with_user(text: &str) -> ConversationState {
        let mut state = ConversationState::new();
        state.push_user(text);
        state
    }

    #[test]
    fn transitions_follow_the_route() {
        assert_eq!(next_stage(Stage::Greeter, Some(Route::Retention)), Some(Stage::ProblemSolver));
        assert_eq!(next_stage(Stage::Greeter, Some(Route::Cancel)), Some(Stage::Processor));
        assert_eq!(next_stage(Stage::ProblemSolver, Some(Route::Cancel)), Some(Stage::Processor));

        assert_eq!(next_stage(Stage::Greeter, Some(Route::Tech)), None);
        assert_eq!(next_stage(Stage::Greeter, Some(Route::Billing)), None);
        assert_eq!(next_stage(Stage::Greeter, Some(Route::End)), None);
        assert_eq!(next_stage(Stage::ProblemSolver, Some(Route::End)), None);
        assert_eq!(next_stage(Stage::Processor, Some(Route::End)), None);
        assert_eq!(next_stage(Stage::Processor, Some(Route::Cancel)), None);
        assert_eq!(next_stage(Stage::Greeter, None), None);
    }

    #[test]
    fn device_fault_with_cancel_intent_forces_retention() {
        let mut state = state_with_user("my phone is overheating, I want to return it");
        state.pending_route = Some(Route::Cancel);
        apply_route_override(&mut state);
        assert_eq!(state.pending_route, Some(Route::Retention));

        // missing route is overridden too
        let mut state = state_with_user("screen is broken, just cancel the plan");
        apply_route_override(&mut state);
        assert_eq!(state.pending_route, Some(Route::Retention));
    }

    #[test]
    fn override_needs_both_signals() {
        let mut state = state_with_user("my phone keeps overheating");
        state.pending_route = Some(Route::Tech);
        apply_route_override(&mut state);
        assert_eq!(state.pending_route, Some(Route::Tech));

        let mut state = state_with_user("please cancel my subscription");
        state.pending_route = Some(Route::Cancel);
        apply_route_override(&mut state);
        assert_eq!(state.pending_route, Some(Route::Cancel));
    }

    #[test]
    fn visible_reply_sanitizes_route_leaks() {
        let mut state = state_with_user("hi");
        state.messages.push(ChatMessage::assistant("Your route has been set to retention."));
        assert_eq!(visible_reply(&state), "Is there anything else I can help you with?");
    }

    #[test]
    fn visible_reply_falls_back_when_no_assistant_text_exists() {
        let mut state = state_with_user("cancel please");
        state.pending_route = Some(Route::Retention);
        let reply = visible_reply(&state);
        assert!(reply.contains("options that might work better"));
    }
}
