use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB helpers.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB backend before they are mapped to [`StorageError`](crate::dao::storage::StorageError).
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// Client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// Server never answered a ping while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// Ping failed on an established connection.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// Write rejected by the server.
    #[error("failed to write `{key}` into `{collection}`")]
    Write {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    /// Query rejected by the server.
    #[error("failed to read `{key}` from `{collection}`")]
    Read {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    /// Delete rejected by the server.
    #[error("failed to delete `{key}` from `{collection}`")]
    Delete {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    /// `find_one_and_update` with upsert returned nothing.
    #[error("upsert on `{collection}` returned no document for `{key}`")]
    MissingUpsertResult {
        collection: &'static str,
        key: String,
    },
    /// Stored identifier is not a UUID.
    #[error("invalid identifier `{value}` stored in `{collection}`")]
    InvalidDocId {
        collection: &'static str,
        value: String,
    },
    /// Stored counter does not fit its type.
    #[error("counter `{field}` stored in `{collection}` is out of range")]
    InvalidCounter {
        collection: &'static str,
        field: &'static str,
    },
}
