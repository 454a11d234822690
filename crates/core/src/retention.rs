use std::collections::BTreeMap;
use std::path::Path;

use crate::customer::Tier;

/// Top-level reason category in the retention rule tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReasonCategory {
    FinancialHardship,
    ProductIssues,
    ServiceValue,
}

impl ReasonCategory {
    pub fn rule_key(&self) -> &'static str {
        match self {
            Self::FinancialHardship => "financial_hardship",
            Self::ProductIssues => "product_issues",
            Self::ServiceValue => "service_value",
        }
    }
}

/// A free-text cancellation reason resolved against the synonym table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedReason {
    pub category: ReasonCategory,
    pub sub_reason: Option<&'static str>,
    /// The normalized input, echoed back for caller transparency.
    pub normalized: String,
}

/// Synonym table mapping reason phrasing to a canonical (category,
/// sub-reason) pair. Matching is longest-key-first so a short key can
/// never shadow a more specific one.
const REASON_SYNONYMS: &[(&str, ReasonCategory, Option<&str>)] = &[
    ("financial_hardship", ReasonCategory::FinancialHardship, None),
    ("financial", ReasonCategory::FinancialHardship, None),
    ("money", ReasonCategory::FinancialHardship, None),
    ("afford", ReasonCategory::FinancialHardship, None),
    ("overheating", ReasonCategory::ProductIssues, Some("overheating")),
    ("battery_issues", ReasonCategory::ProductIssues, Some("battery_issues")),
    ("battery", ReasonCategory::ProductIssues, Some("battery_issues")),
    ("product_issues", ReasonCategory::ProductIssues, Some("overheating")),
    ("service_value", ReasonCategory::ServiceValue, Some("care_plus_premium")),
    ("value", ReasonCategory::ServiceValue, Some("care_plus_premium")),
];

/// Normalize a raw reason and resolve it. Unmatched reasons default to
/// financial hardship with no sub-reason.
pub fn resolve_reason(raw: &str) -> ResolvedReason {
    let normalized = raw.trim().to_lowercase().replace(' ', "_");
    let squashed = normalized.replace('_', "");

    let mut candidates: Vec<&(&str, ReasonCategory, Option<&str>)> = REASON_SYNONYMS.iter().collect();
    candidates.sort_by_key(|(key, _, _)| std::cmp::Reverse(key.len()));

    for (key, category, sub_reason) in candidates {
        if normalized.contains(key) || squashed.contains(&key.replace('_', "")) {
            return ResolvedReason { category: *category, sub_reason: *sub_reason, normalized };
        }
    }
    ResolvedReason { category: ReasonCategory::FinancialHardship, sub_reason: None, normalized }
}

/// Nested retention-offer tables: category -> (tier key | sub-reason key)
/// -> ordered offer descriptions. Never mutated at runtime.
#[derive(Clone, Debug, Default)]
pub struct RetentionRuleSet {
    tables: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl RetentionRuleSet {
    /// Load from nested JSON. A missing or unparseable file yields an
    /// empty rule set rather than an error.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                tracing::warn!(
                    event_name = "resources.rules.missing",
                    path = %path.display(),
                    "retention rules not found, starting empty"
                );
                return Self::default();
            }
        };
        match serde_json::from_str::<BTreeMap<String, BTreeMap<String, Vec<String>>>>(&raw) {
            Ok(tables) => Self { tables },
            Err(error) => {
                tracing::warn!(
                    event_name = "resources.rules.unparseable",
                    path = %path.display(),
                    error = %error,
                    "retention rules unparseable, starting empty"
                );
                Self::default()
            }
        }
    }

    pub fn from_tables(tables: BTreeMap<String, BTreeMap<String, Vec<String>>>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Offers for a resolved (reason, tier) pair. Financial hardship is
    /// keyed by tier; the other categories by sub-reason. An unconfigured
    /// combination yields an empty list, never an error.
    pub fn offers_for(&self, reason: &ResolvedReason, tier: Tier) -> Vec<String> {
        let entry_key = match reason.category {
            ReasonCategory::FinancialHardship => tier.rule_key(),
            ReasonCategory::ProductIssues => reason.sub_reason.unwrap_or("overheating"),
            ReasonCategory::ServiceValue => reason.sub_reason.unwrap_or("care_plus_premium"),
        };
        self.tables
            .get(reason.category.rule_key())
            .and_then(|table| table.get(entry_key))
            .cloned()
            .unwrap_or_default()
    }
}
