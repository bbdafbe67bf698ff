use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::{models::ScoreEntity, quiz_store::QuizStore},
    dto::quiz::ScoreView,
    error::ServiceError,
    services::quiz_service,
    state::SharedState,
};

/// Count one more correct answer; the row is created with `total_questions` on first use.
pub(crate) async fn record_correct_answer(
    store: &Arc<dyn QuizStore>,
    quiz_id: Uuid,
    user_id: Uuid,
    total_questions: u32,
) -> Result<ScoreEntity, ServiceError> {
    let row = store
        .increment_score(quiz_id, user_id, total_questions)
        .await?;
    debug!(
        quiz_id = %quiz_id,
        user_id = %user_id,
        correct = row.correct_questions,
        total = row.total_questions,
        "score updated"
    );
    Ok(row)
}

/// Score rows of an existing quiz.
pub async fn scores_for_quiz(
    state: &SharedState,
    quiz_id: Uuid,
) -> Result<Vec<ScoreView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    quiz_service::load_quiz(&store, quiz_id).await?;
    let rows = store.list_scores(quiz_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
