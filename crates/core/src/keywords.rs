//! Named keyword tables backing the hand-authored routing heuristics.
//!
//! These are literal substring tables on purpose: the override rules must
//! stay auditable and testable in isolation from the LLM loop. Keep them
//! lowercase; callers match against lowercased user text.

/// Device-fault complaints that trigger the retention-before-cancel rule.
pub const DEVICE_FAULT_WORDS: &[&str] = &[
    "overheat",
    "broken",
    "crack",
    "won't charge",
    "not charging",
    "screen flicker",
    "battery drain",
];

/// Cancellation intent as used by the stage-graph override.
pub const CANCEL_INTENT_WORDS: &[&str] = &["cancel", "return", "get rid"];

/// Broader cancellation phrasing used to recover from a model that routed
/// to "end" while the customer was still asking to cancel.
pub const CANCEL_RECOVERY_WORDS: &[&str] =
    &["cancel", "return", "get rid", "can't afford", "cant afford"];

/// Follow-up questions about retention options already on the table.
pub const RETENTION_FOLLOW_UP_PHRASES: &[&str] = &[
    "payment pause",
    "cheaper option",
    "cheaper plan",
    "basic plan",
    "replacement involve",
    "upgrade",
];

/// Subset used when repairing a billing misclassification: these phrases
/// mean the customer is asking about plan options, not disputing a charge.
pub const BILLING_FOLLOW_UP_PHRASES: &[&str] =
    &["payment pause", "cheaper option", "cheaper plan", "basic plan"];

/// Phrases a billing-routed reply must never contain: the agent has no
/// billing-system access and cannot claim corrections or refunds.
pub const FORBIDDEN_BILLING_CLAIMS: &[&str] = &[
    "corrected the charge",
    "charge has been corrected",
    "difference is refunded",
    "refund has been processed",
    "applied a credit",
    "i've refunded",
];

pub fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}
