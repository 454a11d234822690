use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::customer::CustomerRecord;

/// The categorical routing decision the model signals through its routing
/// tool. Selects the next stage-graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Retention,
    Cancel,
    Tech,
    Billing,
    End,
}

impl Route {
    /// Lenient parse: trims and lowercases. Anything unrecognized is
    /// treated as `End` so a malformed routing call can never wedge a turn.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "retention" => Self::Retention,
            "cancel" => Self::Cancel,
            "tech" => Self::Tech,
            "billing" => Self::Billing,
            _ => Self::End,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retention => "retention",
            Self::Cancel => "cancel",
            Self::Tech => "tech",
            Self::Billing => "billing",
            Self::End => "end",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call the model attached to an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in the ordered turn history. Insertion order is semantically
/// meaningful: it defines the LLM context and "last user utterance" lookups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content)
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self { tool_calls, ..Self::plain(ChatRole::Assistant, content) }
    }

    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, result: &Value) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            tool_name: Some(name.into()),
            ..Self::plain(ChatRole::Tool, result.to_string())
        }
    }

    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None, tool_name: None }
    }

    pub fn is_profile_context(&self) -> bool {
        self.role == ChatRole::System && self.content.starts_with("Customer profile:")
    }
}

/// Resolution status of the customer profile for this conversation.
///
/// Merge rule: `Found` wins and never regresses. A later `NotFound` tool
/// result must not clobber an already-resolved record.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CustomerProfile {
    #[default]
    Unknown,
    NotFound,
    Found(CustomerRecord),
}

impl CustomerProfile {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn record(&self) -> Option<&CustomerRecord> {
        match self {
            Self::Found(record) => Some(record),
            _ => None,
        }
    }
}

/// The single mutable record threaded through one stage-graph traversal.
/// Owned by exactly one in-flight turn.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub customer_profile: CustomerProfile,
    pub pending_route: Option<Route>,
    /// Accumulated LLM API latency this turn. Observability only.
    pub api_time: Duration,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, utterance: impl Into<String>) {
        self.messages.push(ChatMessage::user(utterance));
    }

    /// Lowercased text of the most recent user message, or empty.
    pub fn last_user_text(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User && !m.content.is_empty())
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default()
    }

    /// Index of the most recent assistant message carrying visible text.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role == ChatRole::Assistant && !m.content.trim().is_empty())
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.last_assistant_index().map(|i| self.messages[i].content.as_str())
    }

    /// Apply the profile merge rule: a found record always wins, a
    /// not-found result only fills in an unknown slot.
    pub fn absorb_profile(&mut self, incoming: CustomerProfile) {
        match (&self.customer_profile, &incoming) {
            (_, CustomerProfile::Found(_)) => self.customer_profile = incoming,
            (CustomerProfile::Unknown, CustomerProfile::NotFound) => {
                self.customer_profile = CustomerProfile::NotFound;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatMessage, ConversationState, CustomerProfile, Route};
    use crate::customer::CustomerRecord;

    fn found_record(id: &str) -> CustomerProfile {
        CustomerProfile::Found(CustomerRecord::from_pairs(vec![
            ("customer_id".to_string(), id.to_string()),
            ("email".to_string(), format!("{}@example.com", id.to_lowercase())),
            ("tier".to_string(), "premium".to_string()),
        ]))
    }

    #[test]
    fn route_parse_is_lenient() {
        assert_eq!(Route::parse("  Retention "), Route::Retention);
        assert_eq!(Route::parse("BILLING"), Route::Billing);
        assert_eq!(Route::parse("no-such-route"), Route::End);
        assert_eq!(Route::parse(""), Route::End);
    }

    #[test]
    fn found_profile_never_regresses() {
        let mut state = ConversationState::new();
        state.absorb_profile(found_record("CUST_001"));
        assert!(state.customer_profile.is_found());

        state.absorb_profile(CustomerProfile::NotFound);
        assert!(state.customer_profile.is_found());

        state.absorb_profile(CustomerProfile::Unknown);
        assert!(state.customer_profile.is_found());
    }

    #[test]
    fn later_found_record_replaces_earlier_one() {
        let mut state = ConversationState::new();
        state.absorb_profile(found_record("CUST_001"));
        state.absorb_profile(found_record("CUST_002"));
        let record = state.customer_profile.record().unwrap();
        assert_eq!(record.customer_id(), Some("CUST_002"));
    }

    #[test]
    fn not_found_fills_unknown_slot_only() {
        let mut state = ConversationState::new();
        state.absorb_profile(CustomerProfile::NotFound);
        assert_eq!(state.customer_profile, CustomerProfile::NotFound);
    }

    #[test]
    fn last_user_text_skips_assistant_replies() {
        let mut state = ConversationState::new();
        state.push_user("My phone keeps Overheating");
        state.messages.push(ChatMessage::assistant("Sorry to hear that."));
        assert_eq!(state.last_user_text(), "my phone keeps overheating");
    }

    #[test]
    fn profile_context_detection() {
        assert!(ChatMessage::system("Customer profile: tier=premium").is_profile_context());
        assert!(!ChatMessage::system("You are a support agent.").is_profile_context());
        assert!(!ChatMessage::user("Customer profile: fake").is_profile_context());
    }
}
