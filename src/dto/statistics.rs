use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{Outcome, StatisticsEntity},
    dto::format_system_time,
};

/// Statistics row of a player in a quiz.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsView {
    /// Identifier of the quiz.
    pub quiz_id: Uuid,
    /// Identifier of the player.
    pub user_id: Uuid,
    /// Correct answers.
    pub score: u32,
    /// Answered submissions.
    pub number_of_attempts: u32,
    /// Elapsed time in whole seconds.
    pub time_taken_seconds: u64,
    /// RFC 3339 timestamp of the last write.
    pub quiz_date: String,
    /// Decided outcome.
    pub outcome: Outcome,
}

impl From<StatisticsEntity> for StatisticsView {
    fn from(value: StatisticsEntity) -> Self {
        Self {
            quiz_id: value.quiz_id,
            user_id: value.user_id,
            score: value.score,
            number_of_attempts: value.number_of_attempts,
            time_taken_seconds: value.time_taken_secs,
            quiz_date: format_system_time(value.quiz_date),
            outcome: value.outcome,
        }
    }
}

/// Decides the outcome of a quiz; `null` records a draw.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequest {
    /// Winning player, absent for a draw.
    #[serde(default)]
    pub winner_user_id: Option<Uuid>,
}
