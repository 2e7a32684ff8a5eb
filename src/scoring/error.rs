//! Error types for the catalog and the scoring pipeline.

use thiserror::Error;

/// Errors raised by the catalog and the scoring engine.
///
/// Empty inputs are not errors: an empty catalog or an empty ledger produce
/// zero-valued reports. Only missing references and broken invariants land here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoringError {
    /// A referenced session or catalog entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Catalog or ledger data violates an invariant (seeding/programming error).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScoringError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config_error",
        }
    }
}
