//! Error types for hostdb.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the inventory core.
#[derive(Debug, Error)]
pub enum Error {
    /// A storage operation failed.
    #[error("storage error during {operation}: {reason}")]
    Storage {
        /// What was being attempted.
        operation: String,
        /// Underlying cause.
        reason: String,
    },

    /// No machine with the given fqdn exists.
    #[error("machine not found: {0}")]
    MachineNotFound(String),

    /// The machine exists but lacks the requested sub-resource.
    #[error("{kind} not found for machine {fqdn}")]
    RecordNotFound {
        /// Kind of the missing record.
        kind: String,
        /// Owning machine.
        fqdn: String,
    },

    /// A record failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read or parsed.
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// A virtualization backend failed to decommission a machine.
    #[error("virtualization backend '{backend}' failed: {reason}")]
    Backend {
        /// Backend kind.
        backend: String,
        /// Underlying cause.
        reason: String,
    },

    /// A command was refused; carries the client-facing message.
    #[error("{0}")]
    Rejected(String),

    /// Record (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a storage error.
    pub fn storage(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Storage {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Build a backend error.
    pub fn backend(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Backend {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

macro_rules! impl_storage_from {
    ($($ty:ty => $op:literal),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(e: $ty) -> Self {
                    Error::storage($op, e.to_string())
                }
            }
        )*
    };
}

impl_storage_from! {
    redb::DatabaseError => "open database",
    redb::TransactionError => "begin transaction",
    redb::TableError => "open table",
    redb::StorageError => "access storage",
    redb::CommitError => "commit transaction",
}
