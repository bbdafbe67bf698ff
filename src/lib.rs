//! Library crate for flashquiz-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Persistence layer.
pub mod dao;
/// Wire types.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
