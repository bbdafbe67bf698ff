use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{Outcome, StatisticsEntity, StatisticsUpdate},
        quiz_store::QuizStore,
    },
    dto::statistics::StatisticsView,
    error::ServiceError,
    services::catalog_service,
    state::SharedState,
};

/// Upsert the statistics row of a player with their running totals.
pub(crate) async fn record_quiz_stats(
    store: &Arc<dyn QuizStore>,
    quiz_id: Uuid,
    user_id: Uuid,
    score: u32,
    number_of_attempts: u32,
    time_taken_secs: u64,
) -> Result<StatisticsEntity, ServiceError> {
    let row = store
        .upsert_statistics(StatisticsUpdate {
            quiz_id,
            user_id,
            score,
            number_of_attempts,
            time_taken_secs,
            quiz_date: SystemTime::now(),
        })
        .await?;
    debug!(
        quiz_id = %quiz_id,
        user_id = %user_id,
        score,
        number_of_attempts,
        time_taken_secs,
        "statistics recorded"
    );
    Ok(row)
}

/// Statistics rows of a quiz.
pub async fn statistics_for_quiz(
    state: &SharedState,
    quiz_id: Uuid,
) -> Result<Vec<StatisticsView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    let rows = store.list_statistics_for_quiz(quiz_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Statistics rows of a known user.
pub async fn statistics_for_user(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<StatisticsView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    catalog_service::load_user(&store, user_id).await?;
    let rows = store.list_statistics_for_user(user_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Decide the outcome of a quiz. `None` records a draw.
pub async fn set_winner(
    state: &SharedState,
    quiz_id: Uuid,
    winner: Option<Uuid>,
) -> Result<Vec<StatisticsView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    let rows = store.list_statistics_for_quiz(quiz_id).await?;
    let rows = assign_outcomes(quiz_id, rows, winner)?;
    store.save_statistics(rows.clone()).await?;
    info!(quiz_id = %quiz_id, winner = ?winner, "quiz outcome recorded");
    Ok(rows.into_iter().map(Into::into).collect())
}

fn assign_outcomes(
    quiz_id: Uuid,
    mut rows: Vec<StatisticsEntity>,
    winner: Option<Uuid>,
) -> Result<Vec<StatisticsEntity>, ServiceError> {
    if rows.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "no statistics recorded for quiz `{quiz_id}`"
        )));
    }

    match winner {
        Some(winner_id) => {
            if !rows.iter().any(|row| row.user_id == winner_id) {
                return Err(ServiceError::BadRequest(format!(
                    "user `{winner_id}` did not play quiz `{quiz_id}`"
                )));
            }
            for row in &mut rows {
                row.outcome = if row.user_id == winner_id {
                    Outcome::Winner
                } else {
                    Outcome::Loser
                };
            }
        }
        None => {
            for row in &mut rows {
                row.outcome = Outcome::Undecided;
            }
        }
    }

    Ok(rows)
}
