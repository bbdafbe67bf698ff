use axum::Router;

use crate::state::SharedState;

/// User and deck endpoints.
pub mod catalog;
/// Swagger UI.
pub mod docs;
/// Health endpoint.
pub mod health;
/// Invitation endpoints.
pub mod invitation;
/// Quiz lifecycle endpoints.
pub mod quiz;
/// Quiz progress streams.
pub mod sse;
/// Statistics endpoints.
pub mod statistics;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(catalog::router())
        .merge(invitation::router())
        .merge(quiz::router())
        .merge(statistics::router())
        .merge(sse::router());

    api_router.merge(docs::router()).with_state(state)
}
