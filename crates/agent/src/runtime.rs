//! Long-lived wiring: load the knowledge store once, hold the LLM client
//! and toolset, and hand out per-turn stage graphs.

use std::sync::Arc;
use std::time::Duration;

use careline_core::config::AppConfig;
use careline_core::errors::AgentError;
use careline_core::state::ConversationState;
use careline_core::status_log::StatusLog;
use careline_core::store::KnowledgeStore;

use crate::graph::{visible_reply, StageGraph};
use crate::llm::{ChatClient, LlmClient};
use crate::tools::Toolset;

pub struct AgentRuntime {
    llm: Box<dyn LlmClient>,
    toolset: Toolset,
    max_tool_rounds: u32,
    retry_backoff: Duration,
}

impl AgentRuntime {
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        let store = Arc::new(KnowledgeStore::load(&config.resources, &config.agent));
        let status_log = Arc::new(StatusLog::new(config.resources.status_log_path.clone()));
        let toolset = Toolset::new(store, status_log, config.agent.search_top_k);
        let llm = ChatClient::from_config(&config.llm)
            .map_err(|error| AgentError::Internal(error.to_string()))?;

        tracing::info!(
            event_name = "runtime.ready",
            model = config.llm.model.as_str(),
            max_tool_rounds = config.agent.max_tool_rounds,
            "agent runtime initialized"
        );
        Ok(Self {
            llm: Box::new(llm),
            toolset,
            max_tool_rounds: config.agent.max_tool_rounds,
            retry_backoff: Duration::from_millis(config.llm.retry_backoff_ms),
        })
    }

    /// Swap in a different model client. Used by scenario runs and tests.
    pub fn with_client(mut self, llm: Box<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    pub fn store(&self) -> &KnowledgeStore {
        self.toolset.store()
    }

    /// Run one user utterance through the stage graph.
    pub async fn step(
        &self,
        state: ConversationState,
        utterance: &str,
    ) -> Result<ConversationState, AgentError> {
        let graph = StageGraph::new(
            self.llm.as_ref(),
            &self.toolset,
            self.max_tool_rounds,
            self.retry_backoff,
        );
        graph.run_turn(state, utterance).await
    }

    /// The sanitized reply to display for the turn.
    pub fn reply(&self, state: &ConversationState) -> String {
        visible_reply(state)
    }
}
