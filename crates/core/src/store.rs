use std::path::Path;

use crate::config::{AgentConfig, ResourcesConfig};
use crate::customer::CustomerDirectory;
use crate::retention::RetentionRuleSet;
use crate::search::{EmptyIndex, PolicySearch, TfIdfIndex};

/// Explicitly constructed knowledge context: customer directory,
/// retention rules, and the policy search index. Built once at process
/// start and shared read-only by every conversation.
pub struct KnowledgeStore {
    customers: CustomerDirectory,
    rules: RetentionRuleSet,
    policy_index: Box<dyn PolicySearch>,
    has_policy_docs: bool,
}

impl KnowledgeStore {
    /// Load all three datasets. Each source loads independently: a
    /// missing customer file means an empty directory, a missing rule
    /// file an empty rule set, and no policy docs an always-empty index.
    pub fn load(resources: &ResourcesConfig, agent: &AgentConfig) -> Self {
        let customers = CustomerDirectory::load(&resources.customers_path);
        let rules = RetentionRuleSet::load(&resources.rules_path);
        let index =
            TfIdfIndex::build(&resources.policy_docs_dir, agent.chunk_size, agent.chunk_overlap);

        tracing::info!(
            event_name = "knowledge_store.loaded",
            customers = customers.len(),
            rules_empty = rules.is_empty(),
            policy_chunks = index.as_ref().map(TfIdfIndex::chunk_count).unwrap_or(0),
            "knowledge store initialized"
        );

        match index {
            Some(index) => Self {
                customers,
                rules,
                policy_index: Box::new(index),
                has_policy_docs: true,
            },
            None => Self { customers, rules, policy_index: Box::new(EmptyIndex), has_policy_docs: false },
        }
    }

    /// Fixture constructor for tests and demos.
    pub fn from_parts(
        customers: CustomerDirectory,
        rules: RetentionRuleSet,
        policy_index: Box<dyn PolicySearch>,
        has_policy_docs: bool,
    ) -> Self {
        Self { customers, rules, policy_index, has_policy_docs }
    }

    pub fn customers(&self) -> &CustomerDirectory {
        &self.customers
    }

    pub fn rules(&self) -> &RetentionRuleSet {
        &self.rules
    }

    pub fn policy_index(&self) -> &dyn PolicySearch {
        self.policy_index.as_ref()
    }

    /// Whether a policy-search tool should be bound at all.
    pub fn has_policy_docs(&self) -> bool {
        self.has_policy_docs
    }
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("customers", &self.customers.len())
            .field("rules_empty", &self.rules.is_empty())
            .field("has_policy_docs", &self.has_policy_docs)
            .finish()
    }
}
