//! Error types for inodefs
//!
//! Two layers: [`StorageError`] is what the SQL backend and the block store
//! produce, [`FsError`] is the taxonomy the filesystem service exposes to its
//! callers. Storage errors crossing into the service are wrapped with the
//! operation and path they happened under.

use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, FsError>;

/// Result type for storage-layer operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-layer error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Map a failed insert, turning unique violations into [`StorageError::Conflict`].
    pub(crate) fn from_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(what.into()),
            _ => Self::Sqlx(err),
        }
    }
}

/// Flat classification of [`FsError`], for front ends mapping errors to
/// protocol status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    Conflict,
    AlreadyBootstrapped,
    Unsupported,
    Internal,
}

/// Filesystem engine errors
#[derive(Error, Debug)]
pub enum FsError {
    /// The root, an intermediate segment or the target is absent, or is not
    /// owned by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A concurrent creation won the race at the storage layer.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("user {0} already bootstrapped")]
    AlreadyBootstrapped(Uuid),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: StorageError,
    },
}

impl FsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Wrap a storage error with the operation it happened under.
    pub fn storage(context: impl Into<String>, err: StorageError) -> Self {
        let context = context.into();
        match err {
            StorageError::Conflict(msg) => Self::Conflict(format!("{context}: {msg}")),
            source => Self::Internal { context, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::Conflict(_) => ErrorKind::Conflict,
            FsError::AlreadyBootstrapped(_) => ErrorKind::AlreadyBootstrapped,
            FsError::Unsupported(_) => ErrorKind::Unsupported,
            FsError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Attach operation context to storage results.
pub(crate) trait StorageContext<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> StorageContext<T> for StorageResult<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|err| FsError::storage(context(), err))
    }
}

/// Convert FsError to std::io::Error for protocol adapters built on io traits.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match e.kind() {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
            ErrorKind::AlreadyExists | ErrorKind::AlreadyBootstrapped => {
                io::ErrorKind::AlreadyExists
            }
            ErrorKind::Unsupported => io::ErrorKind::Unsupported,
            ErrorKind::Conflict | ErrorKind::Internal => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}
