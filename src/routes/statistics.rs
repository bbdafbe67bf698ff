use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::statistics::{StatisticsView, WinnerRequest},
    error::AppError,
    services::statistics_service,
    state::SharedState,
};

/// Statistics read endpoints and the winner decision.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/statistics/quiz/{id}",
            get(quiz_statistics).put(set_winner),
        )
        .route("/statistics/{user_id}", get(user_statistics))
}

/// List the statistics rows of a quiz.
#[utoipa::path(
    get,
    path = "/statistics/quiz/{id}",
    tag = "statistics",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    responses((status = 200, description = "Statistics rows of the quiz", body = [StatisticsView]))
)]
pub async fn quiz_statistics(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatisticsView>>, AppError> {
    Ok(Json(
        statistics_service::statistics_for_quiz(&state, id).await?,
    ))
}

/// Record the winner of a quiz, or a draw when no winner is given.
#[utoipa::path(
    put,
    path = "/statistics/quiz/{id}",
    tag = "statistics",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    request_body = WinnerRequest,
    responses(
        (status = 200, description = "Outcomes recorded", body = [StatisticsView]),
        (status = 400, description = "Winner did not play the quiz"),
        (status = 404, description = "No statistics for the quiz")
    )
)]
pub async fn set_winner(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WinnerRequest>,
) -> Result<Json<Vec<StatisticsView>>, AppError> {
    Ok(Json(
        statistics_service::set_winner(&state, id, payload.winner_user_id).await?,
    ))
}

/// List the statistics rows of a user.
#[utoipa::path(
    get,
    path = "/statistics/{user_id}",
    tag = "statistics",
    params(("user_id" = Uuid, Path, description = "Identifier of the user")),
    responses(
        (status = 200, description = "Statistics rows of the user", body = [StatisticsView]),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn user_statistics(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<StatisticsView>>, AppError> {
    Ok(Json(
        statistics_service::statistics_for_user(&state, user_id).await?,
    ))
}
