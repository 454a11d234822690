//! Careline core - deterministic foundations for the support agent
//!
//! Everything in this crate is synchronous and LLM-free: the knowledge
//! store (customer directory, retention rules, policy search index), the
//! three capability tools, the conversation state record threaded through
//! a turn, the display sanitizer, and the status-change log.
//!
//! # Safety principle
//!
//! The LLM never touches business data directly. Tools validate their own
//! arguments and return structured results instead of raising, so the
//! agent loop can always keep the conversation alive.

pub mod config;
pub mod customer;
pub mod errors;
pub mod keywords;
pub mod retention;
pub mod sanitize;
pub mod search;
pub mod state;
pub mod status_log;
pub mod store;
pub mod tools;

pub use config::{AgentConfig, AppConfig, ConfigError, LlmConfig, LoadOptions, ResourcesConfig};
pub use customer::{CustomerDirectory, CustomerRecord, Tier};
pub use errors::AgentError;
pub use retention::{ReasonCategory, ResolvedReason, RetentionRuleSet};
pub use sanitize::present;
pub use search::{EmptyIndex, PolicyHit, PolicySearch, TfIdfIndex};
pub use state::{ChatMessage, ChatRole, ConversationState, CustomerProfile, Route, ToolInvocation};
pub use status_log::StatusLog;
pub use store::KnowledgeStore;
