use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A persisted record could not be mapped back into its entity.
    #[error("corrupted record in `{collection}`: {message}")]
    Corrupted {
        /// Collection or table holding the record.
        collection: &'static str,
        /// What failed to map.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corruption error for a record stored in `collection`.
    pub fn corrupted(collection: &'static str, message: impl Into<String>) -> Self {
        StorageError::Corrupted {
            collection,
            message: message.into(),
        }
    }
}
