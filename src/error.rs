//! All error types for the bundlesync crate.
//!
//! Every operation, from the change-set merge up to the service client, reports
//! failures through the single [`Error`] enum below.

use thiserror::Error;

use crate::{access::Role, reconciler::SyncOutcome};

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{role} is not authorized: {reason}")]
    Authorization { role: Role, reason: String },

    #[error("language `{language}` is not configured for bundle `{bundle_id}`")]
    NotConfigured { bundle_id: String, language: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient service failure: {0}")]
    Transient(String),

    #[error("service error: {message}")]
    Service {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// What a committed write did before the failure, if any.
        outcome: Option<Box<SyncOutcome>>,
    },

    #[error("message parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Creates a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    /// Creates a new service error with optional source error
    pub fn service_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Service {
            message: message.into(),
            source,
            outcome: None,
        }
    }

    /// Attaches the outcome of an already committed write to a service error.
    /// Other errors are returned unchanged.
    pub fn with_outcome(self, committed: SyncOutcome) -> Self {
        match self {
            Error::Service { message, source, .. } => Error::Service {
                message,
                source,
                outcome: Some(Box::new(committed)),
            },
            other => other,
        }
    }

    /// The committed write behind a service error, if one was attached.
    pub fn committed_outcome(&self) -> Option<&SyncOutcome> {
        match self {
            Error::Service { outcome, .. } => outcome.as_deref(),
            _ => None,
        }
    }

    /// Whether retrying the failed step may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}
