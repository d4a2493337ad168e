use thiserror::Error;

/// Failures raised for structurally invalid input.
///
/// Business conditions (no prior baseline, empty peer set, no reconciliation
/// match) are modeled as values, never as errors. Anything here means the
/// input shape itself is wrong and downstream scores would be corrupt.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid comparison windows for `{entity}`: {detail}")]
    InvalidWindows { entity: String, detail: String },
    #[error("non-finite value supplied for `{field}`")]
    NonFiniteMetric { field: &'static str },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
