use tradewatch_common::types::RuleValidationError;

/// A rule rejected at registration time.
///
/// This is the only error surfaced to operators synchronously; evaluation
/// and dispatch failures are recovered locally and exposed through logs,
/// audit records and the alert summary counters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config: invalid rule: {0}")]
    InvalidRule(#[from] RuleValidationError),

    #[error("Config: unknown condition operator '{0}'")]
    UnknownOperator(String),

    #[error("Config: unknown severity '{0}'")]
    UnknownSeverity(String),

    #[error("Config: rule '{rule_id}': negative {field} ({value}s)")]
    NegativeInterval {
        rule_id: String,
        field: &'static str,
        value: i64,
    },

    #[error("Config: failed to persist rule: {0}")]
    Persistence(#[from] tradewatch_storage::StorageError),
}

/// Failures inside the evaluation path.
///
/// Caught per rule; one rule's failure never suppresses evaluation of
/// sibling rules in the same batch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine: non-finite sample value for {service}/{metric}")]
    NonFiniteValue { service: String, metric: String },

    #[error("Engine: unknown alert '{0}'")]
    UnknownAlert(String),
}
