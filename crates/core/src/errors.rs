use thiserror::Error;

use crate::config::ConfigError;

/// Fatal turn-level failures. Everything recoverable (bad tool arguments,
/// empty model text, a failed log write) is handled in-band and never
/// reaches this type.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("missing LLM credentials: {0}")]
    MissingCredentials(String),
    #[error("network failure reaching the LLM service: {0}")]
    Network(String),
    #[error("LLM call failed after retry: {first}; retry: {second}")]
    LlmExhausted { first: String, second: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl AgentError {
    /// Operator-facing message. Distinguishes the three self-diagnosable
    /// classes: missing credentials, network trouble, and everything else.
    pub fn operator_message(&self) -> String {
        match self {
            Self::MissingCredentials(detail) => format!(
                "Missing or invalid API key ({detail}).\n  Fix: set CARELINE_LLM_API_KEY or add \
                 llm.api_key to careline.toml."
            ),
            Self::Network(detail) => format!(
                "Network or LLM API unreachable.\n  Details: {detail}\n  Check your connection \
                 and try again."
            ),
            Self::LlmExhausted { first, second } => format!(
                "LLM request failed twice.\n  First: {first}\n  Retry: {second}\n  Check the \
                 model name and base URL in careline.toml."
            ),
            Self::Config(error) => format!("Configuration problem: {error}"),
            Self::Internal(detail) => format!("Unexpected internal failure: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AgentError;

    #[test]
    fn operator_messages_distinguish_failure_classes() {
        let creds = AgentError::MissingCredentials("no api key configured".to_string());
        assert!(creds.operator_message().contains("CARELINE_LLM_API_KEY"));

        let network = AgentError::Network("connection refused".to_string());
        assert!(network.operator_message().contains("unreachable"));

        let internal = AgentError::Internal("poisoned state".to_string());
        assert!(internal.operator_message().contains("internal"));
    }
}
