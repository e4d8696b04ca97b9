//! Error types for the cache
//!
//! Two families: `MediumError` for failures of the persistent key-value
//! medium (always recovered inside the store), and `CacheError` for failures
//! a binder surfaces to its consumer.

use std::fmt;

use thiserror::Error;

// == Medium Error Enum ==
/// Failure reported by a `KvMedium` implementation.
///
/// The store never propagates these; they are logged and degrade to a miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediumError {
    /// The medium refused a write because it is full
    #[error("Quota exceeded writing {key} ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },

    /// The medium cannot be reached at all
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Any other read/write failure
    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MediumError {
    fn from(err: std::io::Error) -> Self {
        MediumError::Io(err.to_string())
    }
}

// == Operation ==
/// The binder operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Error Enum ==
/// Error surfaced by a binder through its state or its `on_error` observer.
///
/// Cloneable so that a state snapshot can carry it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The fetch function rejected
    #[error("{0}")]
    Fetch(String),

    /// A create/update/delete function rejected
    #[error("{operation} failed: {message}")]
    Mutation { operation: Operation, message: String },
}

impl CacheError {
    /// Normalizes a fetch failure into a message-carrying error.
    pub fn fetch(err: &anyhow::Error) -> Self {
        CacheError::Fetch(format!("{err:#}"))
    }

    /// Normalizes a mutation failure, tagging it with the operation.
    pub fn mutation(operation: Operation, err: &anyhow::Error) -> Self {
        CacheError::Mutation {
            operation,
            message: format!("{err:#}"),
        }
    }

    /// The operation this error belongs to.
    pub fn operation(&self) -> Operation {
        match self {
            CacheError::Fetch(_) => Operation::Fetch,
            CacheError::Mutation { operation, .. } => *operation,
        }
    }

    /// The bare message, without the operation prefix.
    pub fn message(&self) -> &str {
        match self {
            CacheError::Fetch(message) => message,
            CacheError::Mutation { message, .. } => message,
        }
    }
}
