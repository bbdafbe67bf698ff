use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether quiz operations can currently reach storage.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = match state.require_quiz_store().await {
        Ok(store) => store,
        Err(_) => {
            warn!("quiz store unavailable (degraded mode)");
            return HealthResponse::degraded();
        }
    };

    match store.health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "quiz store health check failed");
            HealthResponse::degraded()
        }
    }
}
