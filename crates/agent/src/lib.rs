//! Careline agent runtime - the LLM-driven orchestration core
//!
//! This crate turns an unreliable text-generation call into a reliable,
//! state-machine-governed multi-turn interaction:
//!
//! 1. **Stage graph** (`graph`) - the fixed Greeter -> Problem Solver ->
//!    Processor routing graph with keyword overrides of model decisions
//! 2. **Step engine** (`engine`) - the bounded LLM-with-tools loop,
//!    including retries, reply synthesis, and the billing contact repair
//! 3. **Tool binding** (`tools`) - per-stage tool sets executed against
//!    the knowledge store; only the later stages may record status changes
//! 4. **LLM transport** (`llm`) - the `LlmClient` seam plus an
//!    OpenAI-compatible chat-completions client
//!
//! # Safety principle
//!
//! The model classifies and phrases; it never decides business outcomes
//! alone. Routing is overridden by hand-authored rules where they
//! conflict, tool sets are bound asymmetrically per stage, and every
//! displayed string passes the core sanitizer.

pub mod engine;
pub mod fallback;
pub mod graph;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod tools;

pub use engine::AgentStep;
pub use graph::{visible_reply, Stage, StageGraph};
pub use llm::{ChatClient, LlmClient, LlmError, LlmReply, ToolCallRequest, ToolSpec};
pub use runtime::AgentRuntime;
pub use tools::Toolset;
