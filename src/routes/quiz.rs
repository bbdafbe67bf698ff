use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::quiz::{
        AnswerRequest, AnswerResponse, PlayerQuery, QuestionView, QuizView, ScoreView,
        StartQuizRequest,
    },
    error::AppError,
    services::{quiz_service, score_ledger},
    state::SharedState,
};

/// Quiz runtime: start, questions, answers and termination.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/quiz/start", post(start_quiz))
        .route("/quiz/answer", post(submit_answer))
        .route("/quiz/status/{id}", get(quiz_status))
        .route("/quiz/quit/{id}", delete(quit_quiz))
        .route("/quiz/{id}/ready", post(start_if_ready))
        .route("/quiz/{id}/currentQuestion", get(current_question))
        .route("/quiz/{id}/scores", get(scores))
}

/// Start a quiz from a single deck.
#[utoipa::path(
    post,
    path = "/quiz/start",
    tag = "quiz",
    request_body = StartQuizRequest,
    responses(
        (status = 200, description = "Quiz created", body = QuizView),
        (status = 404, description = "Unknown deck")
    )
)]
pub async fn start_quiz(
    State(state): State<SharedState>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(quiz_service::start_quiz(&state, payload).await?))
}

/// Start a multiplayer quiz once every player confirmed.
#[utoipa::path(
    post,
    path = "/quiz/{id}/ready",
    tag = "quiz",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    responses(
        (status = 200, description = "Quiz, started when it was ready", body = QuizView),
        (status = 404, description = "Unknown quiz")
    )
)]
pub async fn start_if_ready(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(
        quiz_service::start_multiplayer_if_ready(&state, id).await?,
    ))
}

/// Question at the player's cursor, without the canonical answer.
#[utoipa::path(
    get,
    path = "/quiz/{id}/currentQuestion",
    tag = "quiz",
    params(("id" = Uuid, Path, description = "Identifier of the quiz"), PlayerQuery),
    responses(
        (status = 200, description = "Current question", body = QuestionView),
        (status = 400, description = "Cursor past the last question"),
        (status = 404, description = "Unknown quiz or user"),
        (status = 409, description = "Quiz not running or player already finished")
    )
)]
pub async fn current_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(
        quiz_service::current_question(&state, id, query.user_id).await?,
    ))
}

/// Submit an answer for the card at the player's cursor.
#[utoipa::path(
    post,
    path = "/quiz/answer",
    tag = "quiz",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer evaluated", body = AnswerResponse),
        (status = 400, description = "Flashcard is not the current question"),
        (status = 404, description = "Unknown quiz or user"),
        (status = 409, description = "Quiz not running or player already finished")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(quiz_service::process_answer(&state, payload).await?))
}

/// Fetch a quiz.
#[utoipa::path(
    get,
    path = "/quiz/status/{id}",
    tag = "quiz",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    responses(
        (status = 200, description = "Quiz", body = QuizView),
        (status = 404, description = "Unknown quiz")
    )
)]
pub async fn quiz_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(quiz_service::quiz_status(&state, id).await?))
}

/// End a quiz early; unfinished players are finalized at their current totals.
#[utoipa::path(
    delete,
    path = "/quiz/quit/{id}",
    tag = "quiz",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    responses(
        (status = 200, description = "Quiz completed", body = QuizView),
        (status = 404, description = "Unknown quiz")
    )
)]
pub async fn quit_quiz(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(quiz_service::cancel_quiz(&state, id).await?))
}

/// List the score rows of a quiz.
#[utoipa::path(
    get,
    path = "/quiz/{id}/scores",
    tag = "quiz",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    responses(
        (status = 200, description = "Score rows of the quiz", body = [ScoreView]),
        (status = 404, description = "Unknown quiz")
    )
)]
pub async fn scores(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScoreView>>, AppError> {
    Ok(Json(score_ledger::scores_for_quiz(&state, id).await?))
}
