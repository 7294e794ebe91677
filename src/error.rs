//! Unified error handling for the billet crate
//!
//! This module provides a unified error type that consolidates the
//! domain-specific errors into a single `Error` enum, while keeping the
//! domain errors available where callers need the detail.
//!
//! # Architecture
//!
//! - [`BilletErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use billet::error::{BilletErrorTrait, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retry later: {}", err.operator_message());
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::allocation::PolicyError;
pub use crate::reconcile::ReconcileError;
pub use crate::storage::StoreError;

/// Common trait for all billet error types
pub trait BilletErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Short message suitable for an operator console
    fn operator_message(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Document store errors
    Storage,
    /// Reconciliation pass errors
    Reconcile,
    /// Configuration and validation errors
    Config,
    /// Input parsing errors
    Parsing,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Storage => "storage error",
            Self::Reconcile => "reconciliation error",
            Self::Config => "configuration error",
            Self::Parsing => "parsing error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the billet crate
#[derive(Error, Debug)]
pub enum Error {
    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Reconciliation errors
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BilletErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        StoreError::is_recoverable(self)
    }

    fn operator_message(&self) -> String {
        match self {
            Self::Timeout { .. } | Self::Unavailable(_) => {
                "document store did not respond, try again".to_string()
            }
            other => other.to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidDocument { .. } | Self::Json(_) => ErrorCategory::Parsing,
            _ => ErrorCategory::Storage,
        }
    }
}

impl BilletErrorTrait for ReconcileError {
    fn is_recoverable(&self) -> bool {
        ReconcileError::is_recoverable(self)
    }

    fn operator_message(&self) -> String {
        match self {
            Self::PassInProgress => "another synchronization is running, wait for it to finish".to_string(),
            Self::Snapshot { source, .. } | Self::Store(source) => source.operator_message(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::PassInProgress => ErrorCategory::Reconcile,
            Self::Snapshot { source, .. } | Self::Store(source) => source.category(),
        }
    }
}

impl BilletErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(e) => BilletErrorTrait::is_recoverable(e),
            Self::Reconcile(e) => BilletErrorTrait::is_recoverable(e),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn operator_message(&self) -> String {
        match self {
            Self::Store(e) => e.operator_message(),
            Self::Reconcile(e) => e.operator_message(),
            Self::Io(e) => format!("{}: {e}", ErrorCategory::Storage.description()),
            Self::Json(e) => format!("{}: {e}", ErrorCategory::Parsing.description()),
            Self::Config(msg) => format!("{}: {msg}", ErrorCategory::Config.description()),
            Self::Other { context, .. } => context.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(e) => e.category(),
            Self::Reconcile(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<PolicyError> for Error {
    fn from(err: PolicyError) -> Self {
        Self::Config(err.to_string())
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
