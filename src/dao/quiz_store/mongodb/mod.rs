mod config;
mod connection;
mod error;
mod models;
/// Store implementation.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoQuizStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::InvalidDocId { collection, value } => {
                StorageError::corrupted(collection, format!("invalid identifier `{value}`"))
            }
            MongoDaoError::InvalidCounter { collection, field } => {
                StorageError::corrupted(collection, format!("counter `{field}` out of range"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
