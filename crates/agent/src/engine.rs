//! The agent step engine: drives one LLM-mediated exchange to completion
//! for a single stage, executing requested tools until the model produces
//! a user-facing reply or the engine synthesizes one out-of-band.
//!
//! Control flow is an explicit state machine with one authoritative exit
//! condition per state:
//!
//! ```text
//! Dispatch -> AwaitModel -> ExecuteTools -> { AwaitModel | SynthesizeFinal | Done }
//! ```

use std::time::{Duration, Instant};

use careline_core::customer::CustomerRecord;
use careline_core::errors::AgentError;
use careline_core::keywords;
use careline_core::state::{ChatMessage, ConversationState, CustomerProfile, Route, ToolInvocation};
use careline_core::tools::{extract_identifier, lookup_customer};

use crate::fallback;
use crate::graph::Stage;
use crate::llm::{LlmClient, LlmError, LlmReply, ToolSpec};
use crate::prompts;
use crate::tools::{Toolset, SET_ROUTE, UPDATE_CUSTOMER_STATUS};

enum LoopState {
    Dispatch,
    AwaitModel,
    ExecuteTools(LlmReply),
    SynthesizeFinal,
    Done,
}

/// One stage invocation of the LLM-with-tools loop.
pub struct AgentStep<'a> {
    llm: &'a dyn LlmClient,
    toolset: &'a Toolset,
    max_tool_rounds: u32,
    retry_backoff: Duration,
}

impl<'a> AgentStep<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        toolset: &'a Toolset,
        max_tool_rounds: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self { llm, toolset, max_tool_rounds, retry_backoff }
    }

    /// Run the loop for `stage`, returning the updated state. Fatal only
    /// when the LLM fails twice in a row; everything else degrades.
    pub async fn run(
        &self,
        mut state: ConversationState,
        stage: Stage,
    ) -> Result<ConversationState, AgentError> {
        let system_prompt = prompts::system_prompt(stage);
        let tools = self.toolset.specs_for(stage);
        let mut api_time = Duration::ZERO;
        let mut rounds = 0u32;
        let mut status_changed = false;
        let mut machine = LoopState::Dispatch;

        tracing::debug!(
            event_name = "engine.step.start",
            stage = stage.as_str(),
            messages = state.messages.len(),
            profile_found = state.customer_profile.is_found(),
            "agent step starting"
        );

        loop {
            machine = match machine {
                LoopState::Dispatch => {
                    self.prefetch_profile(&mut state);
                    inject_profile_context(&mut state);
                    LoopState::AwaitModel
                }
                LoopState::AwaitModel => {
                    let reply =
                        self.call_model(&system_prompt, &state.messages, &tools, &mut api_time).await?;
                    if reply.tool_calls.is_empty() {
                        let text = reply.trimmed_text().unwrap_or_default().to_string();
                        tracing::info!(
                            event_name = "engine.reply.direct",
                            stage = stage.as_str(),
                            chars = text.len(),
                            "model produced a direct reply"
                        );
                        state.messages.push(ChatMessage::assistant(text));
                        LoopState::Done
                    } else {
                        LoopState::ExecuteTools(reply)
                    }
                }
                LoopState::ExecuteTools(reply) => {
                    rounds += 1;
                    let only_routing =
                        reply.tool_calls.iter().all(|call| call.name == SET_ROUTE);
                    self.execute_round(&mut state, stage, reply, &mut status_changed);
                    tracing::debug!(
                        event_name = "engine.round.complete",
                        round = rounds,
                        only_routing,
                        route = state.pending_route.map(|r| r.as_str()).unwrap_or("none"),
                        "tool round executed"
                    );
                    if only_routing {
                        LoopState::SynthesizeFinal
                    } else if rounds >= self.max_tool_rounds {
                        // degraded but terminating: accept the tool-only tail
                        tracing::warn!(
                            event_name = "engine.round.cap_reached",
                            rounds,
                            "tool round cap reached without a final reply"
                        );
                        LoopState::Done
                    } else {
                        LoopState::AwaitModel
                    }
                }
                LoopState::SynthesizeFinal => {
                    self.synthesize_reply(&mut state, status_changed, &mut api_time).await;
                    LoopState::Done
                }
                LoopState::Done => break,
            };
        }

        self.repair_billing_contact(&mut state, &mut api_time).await;
        state.api_time += api_time;
        Ok(state)
    }

    /// Pre-fetch: if no resolved profile exists, scan user messages for
    /// an extractable identifier and look it up once, so the model does
    /// not need a tool round just to learn the customer's tier. Reads the
    /// store directly; this is not a model-requested tool call, so the
    /// stage binding does not apply.
    fn prefetch_profile(&self, state: &mut ConversationState) {
        if state.customer_profile.is_found() {
            return;
        }
        let user_texts: Vec<String> = state
            .messages
            .iter()
            .filter(|m| m.role == careline_core::state::ChatRole::User)
            .map(|m| m.content.clone())
            .collect();
        for text in user_texts {
            let Some(identifier) = extract_identifier(&text) else { continue };
            let result = lookup_customer(self.toolset.store(), &identifier);
            if let Some(record) = CustomerRecord::from_tool_result(&result) {
                tracing::debug!(
                    event_name = "engine.prefetch.hit",
                    identifier,
                    "customer profile pre-fetched from history"
                );
                state.absorb_profile(CustomerProfile::Found(record));
                return;
            }
        }
    }

    /// Execute every requested tool, appending the assistant message and
    /// all tool results to history. Captures the route, flags status
    /// changes, and persists the first found profile of the round.
    fn execute_round(
        &self,
        state: &mut ConversationState,
        stage: Stage,
        reply: LlmReply,
        status_changed: &mut bool,
    ) {
        let calls: Vec<ToolInvocation> = reply
            .tool_calls
            .iter()
            .map(|call| ToolInvocation {
                id: if call.id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    call.id.clone()
                },
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .collect();

        for call in &calls {
            if call.name == SET_ROUTE {
                let raw = call.arguments.get("route").and_then(|v| v.as_str()).unwrap_or("end");
                state.pending_route = Some(Route::parse(raw));
            }
            if call.name == UPDATE_CUSTOMER_STATUS && self.toolset.is_bound(stage, &call.name) {
                *status_changed = true;
            }
        }

        state
            .messages
            .push(ChatMessage::assistant_with_calls(reply.text.unwrap_or_default(), calls.clone()));

        let mut absorbed_this_round = false;
        for call in &calls {
            let result = self.toolset.execute(stage, &call.name, &call.arguments);
            tracing::info!(
                event_name = "engine.tool.result",
                tool = call.name.as_str(),
                arguments = %truncate_for_log(&call.arguments.to_string()),
                result = %truncate_for_log(&result.to_string()),
                "tool executed"
            );
            if !absorbed_this_round {
                if let Some(record) = CustomerRecord::from_tool_result(&result) {
                    state.absorb_profile(CustomerProfile::Found(record));
                    absorbed_this_round = true;
                }
            }
            state.messages.push(ChatMessage::tool_result(call.id.clone(), call.name.clone(), &result));
        }
        inject_profile_context(state);
    }

    /// The model routed but said nothing useful. Produce the user-facing
    /// reply out-of-band; left to itself the model tends to keep calling
    /// tools every round and never emit plain text again.
    async fn synthesize_reply(
        &self,
        state: &mut ConversationState,
        status_changed: bool,
        api_time: &mut Duration,
    ) {
        let route = state.pending_route.unwrap_or(Route::End);
        let last_user = state.last_user_text();

        let (system_prompt, fallback_text, forced_route): (String, String, Option<Route>) =
            match route {
                Route::End if status_changed => (
                    prompts::CONFIRM_STATUS_SYSTEM.to_string(),
                    fallback::PROCESSED_CONFIRMATION.to_string(),
                    None,
                ),
                Route::End
                    if keywords::contains_any(&last_user, keywords::RETENTION_FOLLOW_UP_PHRASES) =>
                {
                    (
                        prompts::RETENTION_FOLLOWUP_SYSTEM.to_string(),
                        fallback::reply_for_route(Some(Route::Retention)).to_string(),
                        None,
                    )
                }
                Route::End
                    if keywords::contains_any(&last_user, keywords::CANCEL_RECOVERY_WORDS) =>
                {
                    // the model should not have routed to end here; recover
                    // with a natural reply instead of the canned closing
                    tracing::warn!(
                        event_name = "engine.synthesis.end_override",
                        "cancel intent routed to end, recovering with a natural reply"
                    );
                    (
                        prompts::PLAIN_REPLY_SYSTEM.to_string(),
                        fallback::reply_for_route(Some(Route::End)).to_string(),
                        None,
                    )
                }
                Route::End => {
                    state
                        .messages
                        .push(ChatMessage::assistant(fallback::reply_for_route(Some(Route::End))));
                    return;
                }
                Route::Billing => {
                    if keywords::contains_any(&last_user, keywords::BILLING_FOLLOW_UP_PHRASES) {
                        // misclassification: a plan-option follow-up, not a dispute
                        (
                            prompts::BILLING_FOLLOWUP_SYSTEM.to_string(),
                            fallback::reply_for_route(Some(Route::Billing)).to_string(),
                            Some(Route::End),
                        )
                    } else if state.customer_profile.is_found() {
                        (
                            prompts::BILLING_WITH_PROFILE_SYSTEM.to_string(),
                            fallback::reply_for_route(Some(Route::Billing)).to_string(),
                            None,
                        )
                    } else {
                        (
                            prompts::BILLING_NO_PROFILE_SYSTEM.to_string(),
                            fallback::reply_for_route(Some(Route::Billing)).to_string(),
                            None,
                        )
                    }
                }
                other => (
                    prompts::PLAIN_REPLY_SYSTEM.to_string(),
                    fallback::reply_for_route(Some(other)).to_string(),
                    None,
                ),
            };

        let text = self
            .constrained_reply(
                &system_prompt,
                &state.messages,
                &fallback_text,
                &|candidate| !candidate.trim().is_empty(),
                api_time,
            )
            .await;
        tracing::info!(
            event_name = "engine.reply.synthesized",
            route = route.as_str(),
            "reply synthesized out-of-band"
        );
        state.messages.push(ChatMessage::assistant(text));
        if let Some(forced) = forced_route {
            state.pending_route = Some(forced);
        }
    }

    /// Reusable constrained single-shot completion: no tools, one retry,
    /// and a guaranteed non-empty result via the supplied fallback.
    async fn constrained_reply(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        fallback_text: &str,
        accept: &dyn Fn(&str) -> bool,
        api_time: &mut Duration,
    ) -> String {
        for attempt in 0..2u8 {
            if attempt > 0 {
                tokio::time::sleep(self.retry_backoff).await;
            }
            let started = Instant::now();
            let outcome = self.llm.generate(system_prompt, history, &[]).await;
            *api_time += started.elapsed();
            match outcome {
                Ok(reply) => {
                    if let Some(text) = reply.trimmed_text() {
                        if accept(text) {
                            return text.to_string();
                        }
                    }
                    break; // empty or rejected text: no point retrying
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "engine.constrained.failed",
                        attempt,
                        error = %error,
                        "constrained completion failed"
                    );
                }
            }
        }
        fallback_text.to_string()
    }

    /// A billing turn without a known profile must end by asking for
    /// contact identification. Rewrite the last reply, or append a fixed
    /// suffix when the rewrite fails.
    async fn repair_billing_contact(&self, state: &mut ConversationState, api_time: &mut Duration) {
        if state.pending_route != Some(Route::Billing) || state.customer_profile.is_found() {
            return;
        }
        let Some(index) = state.last_assistant_index() else { return };
        let existing = state.messages[index].content.clone();
        if existing.to_lowercase().contains("email") {
            return;
        }

        let system_prompt = prompts::email_rewrite_system(&existing);
        let fallback_text =
            format!("{existing} Could you share your email so I can look up your account?");
        let rewritten = self
            .constrained_reply(
                &system_prompt,
                &[],
                &fallback_text,
                &|candidate| candidate.to_lowercase().contains("email"),
                api_time,
            )
            .await;
        tracing::info!(
            event_name = "engine.billing.contact_repair",
            rewritten = rewritten != fallback_text,
            "billing reply repaired to request contact identification"
        );
        state.messages[index].content = rewritten;
    }

    /// Invoke the model with the node's bound tool set. One retry after a
    /// fixed backoff; a second failure is fatal to the turn.
    async fn call_model(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolSpec],
        api_time: &mut Duration,
    ) -> Result<LlmReply, AgentError> {
        let started = Instant::now();
        let first = match self.llm.generate(system_prompt, history, tools).await {
            Ok(reply) => {
                *api_time += started.elapsed();
                return Ok(reply);
            }
            Err(error) => {
                *api_time += started.elapsed();
                error
            }
        };
        if matches!(first, LlmError::MissingCredentials) {
            return Err(AgentError::MissingCredentials(first.to_string()));
        }
        tracing::warn!(
            event_name = "engine.llm.retry",
            error = %first,
            "LLM call failed, retrying once"
        );

        tokio::time::sleep(self.retry_backoff).await;
        let started = Instant::now();
        match self.llm.generate(system_prompt, history, tools).await {
            Ok(reply) => {
                *api_time += started.elapsed();
                Ok(reply)
            }
            Err(second) => {
                *api_time += started.elapsed();
                Err(match (&first, &second) {
                    (_, LlmError::MissingCredentials) => {
                        AgentError::MissingCredentials(second.to_string())
                    }
                    (LlmError::Transport(_), LlmError::Transport(detail)) => {
                        AgentError::Network(detail.clone())
                    }
                    _ => AgentError::LlmExhausted {
                        first: first.to_string(),
                        second: second.to_string(),
                    },
                })
            }
        }
    }
}

fn truncate_for_log(raw: &str) -> String {
    if raw.chars().count() <= 200 {
        return raw.to_string();
    }
    let head: String = raw.chars().take(200).collect();
    format!("{head}...")
}

/// Keep the synthetic profile context at the front of the message list
/// whenever a profile is known.
fn inject_profile_context(state: &mut ConversationState) {
    let Some(record) = state.customer_profile.record() else { return };
    if state.messages.first().is_some_and(ChatMessage::is_profile_context) {
        return;
    }
    let context = format!("Customer profile: {}", record.context_line());
    state.messages.insert(0, ChatMessage::system(context));
}
