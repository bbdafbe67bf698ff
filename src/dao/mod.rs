/// Domain records persisted by the storage backends.
pub mod models;
/// Storage contract and its in-memory and MongoDB backends.
pub mod quiz_store;
/// Backend-agnostic storage errors.
pub mod storage;
