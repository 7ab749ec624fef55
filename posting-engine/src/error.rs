//! Error types for the posting engine

use crate::types::Operation;
use crate::validator::ValidationErrors;
use thiserror::Error;

/// Result type for posting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Posting engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Candidate transaction failed validation (all violations listed)
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Hash or sequence collision on create
    #[error("Duplicate transaction: {0}")]
    Duplicate(String),

    /// Dangling reference to an account or currency
    #[error("Foreign key violation: {0}")]
    Foreign(String),

    /// Unknown transaction, counter, account or currency
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the transaction's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Store error tagged with the operation that produced it
    #[error("{operation} failed: {source}")]
    Operation {
        /// Originating operation
        operation: Operation,
        /// Underlying store error
        #[source]
        source: Box<Error>,
    },

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (worker mailbox closed, reply dropped)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Caller-side deadline expired before the worker replied
    #[error("Timed out after {0} ms waiting for posting reply")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Strip operation tags and return the underlying error
    pub fn root(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Tag a store error with the operation it came from
    pub(crate) fn during(self, operation: Operation) -> Self {
        match self {
            // Caller-input errors are reported as-is
            Error::Validation(_) | Error::InvalidState(_) | Error::Operation { .. } => self,
            other => Error::Operation {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// Whether the error was caused by the submitted payload rather than the engine
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.root(),
            Error::Validation(_)
                | Error::Duplicate(_)
                | Error::Foreign(_)
                | Error::NotFound(_)
                | Error::InvalidState(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_strips_operation_tag() {
        let err = Error::Duplicate("hash 00ff".to_string()).during(Operation::CreateJournal);
        assert!(matches!(err, Error::Operation { .. }));
        assert!(matches!(err.root(), Error::Duplicate(_)));
        assert!(err.to_string().starts_with("create-journal failed"));
    }

    #[test]
    fn test_invalid_state_is_not_tagged() {
        let err = Error::InvalidState("already approved".to_string())
            .during(Operation::ApproveVoucher);
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_storage_error_is_internal() {
        let err = Error::Storage("disk gone".to_string()).during(Operation::UpdateJournal);
        assert!(!err.is_caller_error());
    }
}
