//! The three capability tools the LLM can invoke. All argument problems
//! are reported as structured results, never as errors, so the agent loop
//! can react and keep the conversation alive.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::customer::Tier;
use crate::retention::resolve_reason;
use crate::status_log::StatusLog;
use crate::store::KnowledgeStore;

fn customer_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bcust_\w+\b").expect("static pattern"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[[:word:].+-]+@[[:word:].-]+\.[A-Za-z]{2,}\b").expect("static pattern")
    })
}

/// Pull a single well-formed identifier (CUST_ id or email) out of free
/// text. The model often passes a whole sentence; this tolerates that.
pub fn extract_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(hit) = customer_id_pattern().find(trimmed) {
        return Some(hit.as_str().to_string());
    }
    email_pattern().find(trimmed).map(|hit| hit.as_str().to_string())
}

/// Customer lookup. Extracts an identifier first; anything that still
/// lacks both an `@` and the `CUST_` prefix is rejected without touching
/// the directory.
pub fn lookup_customer(store: &KnowledgeStore, raw_identifier: &str) -> Value {
    let raw = raw_identifier.trim();
    if raw.is_empty() {
        return json!({"found": false, "message": "No email or customer_id provided."});
    }
    let candidate = extract_identifier(raw).unwrap_or_else(|| raw.to_string());
    let lowered = candidate.to_lowercase();
    if !candidate.contains('@') && !lowered.starts_with("cust_") {
        return json!({
            "found": false,
            "message": "Invalid input: pass only an email (e.g. name@email.com) or customer_id \
                        (e.g. CUST_001). Do not pass the customer's request text. If the customer \
                        has not given an email or ID yet, ask them for it.",
        });
    }

    let record = if lowered.starts_with("cust_") {
        store.customers().find_by_id(&candidate)
    } else {
        store.customers().find_by_email(&candidate)
    };

    match record {
        Some(record) => record.to_tool_result(),
        None => {
            let examples = store.customers().example_identifiers();
            let hint = if examples.is_empty() {
                String::new()
            } else {
                format!(" Valid examples: {}.", examples.join(", "))
            };
            json!({
                "found": false,
                "message": format!("No customer found with identifier {candidate}.{hint}"),
            })
        }
    }
}

/// Retention-offer calculation. Invalid tier yields an empty offer list
/// plus a diagnostic; an unconfigured (tier, reason) combination yields
/// an empty list silently. The resolved tier and reason are always echoed.
pub fn calculate_retention_offer(store: &KnowledgeStore, tier_raw: &str, reason_raw: &str) -> Value {
    let Some(tier) = Tier::parse(tier_raw) else {
        return json!({
            "offers": [],
            "message": format!("Invalid customer_tier: {tier_raw}. Use premium, regular, or new."),
        });
    };
    if store.rules().is_empty() {
        return json!({"offers": [], "message": "Retention rules not available."});
    }

    let reason = resolve_reason(reason_raw);
    let offers = store.rules().offers_for(&reason, tier);
    json!({
        "offers": offers,
        "customer_tier": tier.as_str(),
        "reason": reason.normalized,
    })
}

/// Record a status change to the append-only log. A write failure is a
/// structured result, never fatal to the conversation.
pub fn record_status_change(log: &StatusLog, customer_id: &str, action: &str) -> Value {
    let customer_id = customer_id.trim();
    let action = action.trim();
    if customer_id.is_empty() || action.is_empty() {
        return json!({"success": false, "message": "customer_id and action are required."});
    }
    match log.append(customer_id, action) {
        Ok(()) => json!({
            "success": true,
            "message": format!("Logged {action} for {customer_id}."),
        }),
        Err(error) => {
            tracing::warn!(
                event_name = "tools.status_change.write_failed",
                customer_id,
                action,
                error = %error,
                "status log append failed"
            );
            json!({
                "success": false,
                "message": format!("Failed to write log: {error}. Please contact support."),
            })
        }
    }
}
