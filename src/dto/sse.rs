use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// First event of every quiz stream.
pub struct Handshake {
    /// Quiz the stream follows.
    pub quiz_id: Uuid,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

/// Tag of a progress snapshot.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Quiz still running.
    Progress,
    /// Quiz completed with this answer.
    Finished,
}

/// Progress of one player inside a snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProgress {
    /// Identifier of the player.
    pub user_id: Uuid,
    /// Correct answers so far.
    pub score: u32,
    /// Index of the card the player is on.
    pub answered_questions: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Snapshot pushed to a quiz topic after every answer.
pub struct QuizUpdateEvent {
    /// Identifier of the quiz.
    pub quiz_id: Uuid,
    /// Whether the quiz is still running.
    pub update_type: UpdateType,
    /// Number of selected questions.
    pub total_questions: usize,
    /// Players in first-access order.
    pub players: Vec<PlayerProgress>,
}
