use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/quizzes/{id}",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Identifier of the quiz to follow")),
    responses(
        (status = 200, description = "Quiz progress stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown quiz"),
        (status = 409, description = "Quiz already completed")
    )
)]
/// Stream progress snapshots of a quiz as players answer.
pub async fn quiz_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, handshake) = sse_service::subscribe_quiz(&state, id).await?;
    info!(quiz_id = %id, "new quiz SSE connection");
    Ok(sse_service::to_sse_stream(
        receiver,
        handshake,
        id,
        state.config().keep_alive(),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/quizzes/{id}", get(quiz_stream))
}
