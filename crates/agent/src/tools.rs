//! Per-stage tool binding and execution against the knowledge store.
//!
//! The binding asymmetry is a safety property: only the Problem Solver
//! and Processor stages may ever record a status change, and only the
//! Greeter and Problem Solver may search policy documents. The binding
//! is enforced twice: `specs_for` controls what a stage advertises, and
//! `execute` refuses names the stage is not bound to, so a model that
//! hallucinates an unadvertised tool cannot reach its side effects.

use std::sync::Arc;

use careline_core::status_log::StatusLog;
use careline_core::store::KnowledgeStore;
use careline_core::tools as capability;
use serde_json::{json, Value};

use crate::fallback::NO_POLICY_INFORMATION;
use crate::graph::Stage;
use crate::llm::ToolSpec;

pub const GET_CUSTOMER_DATA: &str = "get_customer_data";
pub const CALCULATE_RETENTION_OFFER: &str = "calculate_retention_offer";
pub const UPDATE_CUSTOMER_STATUS: &str = "update_customer_status";
pub const SET_ROUTE: &str = "set_route";
pub const POLICY_SEARCH: &str = "policy_search";

/// All capability tools, bound to the shared read-only store and the
/// append-only status log. Cheap to share across conversations.
pub struct Toolset {
    store: Arc<KnowledgeStore>,
    status_log: Arc<StatusLog>,
    search_top_k: usize,
}

impl Toolset {
    pub fn new(store: Arc<KnowledgeStore>, status_log: Arc<StatusLog>, search_top_k: usize) -> Self {
        Self { store, status_log, search_top_k }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// The tool set a stage is allowed to expose to the model.
    pub fn specs_for(&self, stage: Stage) -> Vec<ToolSpec> {
        let mut specs = match stage {
            Stage::Greeter => vec![lookup_spec(), route_spec()],
            Stage::ProblemSolver => {
                vec![lookup_spec(), offer_spec(), route_spec(), status_spec()]
            }
            Stage::Processor => vec![status_spec(), route_spec()],
        };
        if stage != Stage::Processor && self.store.has_policy_docs() {
            specs.push(search_spec());
        }
        specs
    }

    /// Whether `name` may execute during `stage`. Wider than `specs_for`
    /// only for `policy_search`, which stays executable without documents
    /// and degrades to a stock string.
    pub fn is_bound(&self, stage: Stage, name: &str) -> bool {
        let allowed: &[&str] = match stage {
            Stage::Greeter => &[GET_CUSTOMER_DATA, SET_ROUTE, POLICY_SEARCH],
            Stage::ProblemSolver => &[
                GET_CUSTOMER_DATA,
                CALCULATE_RETENTION_OFFER,
                SET_ROUTE,
                UPDATE_CUSTOMER_STATUS,
                POLICY_SEARCH,
            ],
            Stage::Processor => &[UPDATE_CUSTOMER_STATUS, SET_ROUTE],
        };
        allowed.contains(&name)
    }

    /// Execute one named tool call on behalf of `stage`. Unbound names,
    /// unknown names, and missing arguments come back as structured
    /// results so the loop never dies here.
    pub fn execute(&self, stage: Stage, name: &str, arguments: &Value) -> Value {
        if !self.is_bound(stage, name) {
            tracing::warn!(
                event_name = "tools.unbound",
                tool = name,
                stage = stage.as_str(),
                "tool requested outside its stage binding"
            );
            return json!({"error": format!("Tool {name} is not available at this step.")});
        }
        let text_arg = |key: &str| {
            arguments.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
        };
        match name {
            GET_CUSTOMER_DATA => capability::lookup_customer(&self.store, &text_arg("email")),
            CALCULATE_RETENTION_OFFER => capability::calculate_retention_offer(
                &self.store,
                &text_arg("customer_tier"),
                &text_arg("reason"),
            ),
            UPDATE_CUSTOMER_STATUS => capability::record_status_change(
                &self.status_log,
                &text_arg("customer_id"),
                &text_arg("action"),
            ),
            SET_ROUTE => Value::String(format!("Route set to: {}", text_arg("route"))),
            POLICY_SEARCH => self.run_policy_search(&text_arg("query")),
            other => {
                tracing::warn!(event_name = "tools.unknown", tool = other, "unknown tool requested");
                json!({"error": format!("Unknown tool: {other}.")})
            }
        }
    }

    fn run_policy_search(&self, query: &str) -> Value {
        if query.trim().is_empty() {
            return Value::String("No query provided.".to_string());
        }
        let hits = self.store.policy_index().search(query, self.search_top_k);
        tracing::debug!(
            event_name = "tools.policy_search",
            query,
            hits = hits.len(),
            "policy search executed"
        );
        if hits.is_empty() {
            return Value::String(NO_POLICY_INFORMATION.to_string());
        }
        let mut combined =
            hits.into_iter().map(|hit| hit.text).collect::<Vec<_>>().join("\n\n");
        // stay well below the model's context budget
        if combined.chars().count() > 3_000 {
            combined = combined.chars().take(3_000).collect();
        }
        Value::String(combined)
    }
}

fn lookup_spec() -> ToolSpec {
    ToolSpec {
        name: GET_CUSTOMER_DATA,
        description: "Load the customer profile. Pass ONLY the customer's email (e.g. \
                      sarah.chen@email.com) OR customer_id (e.g. CUST_001). If the user's message \
                      contains an email or CUST_ id, extract that value and use it - do not ask \
                      again. Returns customer_id, name, tier, plan_type, device, etc. If not \
                      found returns found=false.",
        parameters: json!({
            "type": "object",
            "properties": {
                "email": {"type": "string", "description": "Email address or CUST_ customer id."},
            },
            "required": ["email"],
        }),
    }
}

fn offer_spec() -> ToolSpec {
    ToolSpec {
        name: CALCULATE_RETENTION_OFFER,
        description: "Generate retention offers from the business rules. customer_tier must be \
                      one of: premium, regular, new. reason describes why they want to cancel, \
                      e.g. financial_hardship, overheating, battery_issues, service_value.",
        parameters: json!({
            "type": "object",
            "properties": {
                "customer_tier": {"type": "string", "enum": ["premium", "regular", "new"]},
                "reason": {"type": "string"},
            },
            "required": ["customer_tier", "reason"],
        }),
    }
}

fn status_spec() -> ToolSpec {
    ToolSpec {
        name: UPDATE_CUSTOMER_STATUS,
        description: "Record a cancellation or plan change. Call when the customer confirms a \
                      cancellation or status change. customer_id e.g. CUST_001; action e.g. \
                      'cancellation', 'pause', 'downgrade'.",
        parameters: json!({
            "type": "object",
            "properties": {
                "customer_id": {"type": "string"},
                "action": {"type": "string"},
            },
            "required": ["customer_id", "action"],
        }),
    }
}

fn route_spec() -> ToolSpec {
    ToolSpec {
        name: SET_ROUTE,
        description: "Set the next step in the conversation. Call with one of: retention, cancel, \
                      tech, billing, end.",
        parameters: json!({
            "type": "object",
            "properties": {
                "route": {
                    "type": "string",
                    "enum": ["retention", "cancel", "tech", "billing", "end"],
                },
            },
            "required": ["route"],
        }),
    }
}

fn search_spec() -> ToolSpec {
    ToolSpec {
        name: POLICY_SEARCH,
        description: "Search company policy documents (return policy, Care+ benefits, tech \
                      support, billing and charges). Use for accurate answers about refunds, \
                      coverage, troubleshooting, or charge adjustments.",
        parameters: json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"],
        }),
    }
}
