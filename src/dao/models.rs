use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Presence status of a user as seen by the invitation and quiz flows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Presence {
    /// Connected and available for invitations.
    Online,
    /// Not connected.
    Offline,
    /// Currently taking part in a quiz.
    Playing,
}

impl Presence {
    /// Wire label, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Presence::Online => "ONLINE",
            Presence::Offline => "OFFLINE",
            Presence::Playing => "PLAYING",
        }
    }
}

/// Lifecycle status of a quiz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizStatus {
    /// Multiplayer quiz waiting for its second participant.
    Waiting,
    /// Players can fetch questions and submit answers.
    InProgress,
    /// Terminal state, reached exactly once.
    Completed,
}

/// Final outcome of a player in a quiz.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Marked as the winner of the quiz.
    Winner,
    /// Explicitly marked as the loser.
    Loser,
    /// Draw, or nobody decided yet.
    #[default]
    Undecided,
}

impl Outcome {
    /// Wire label, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Winner => "WINNER",
            Outcome::Loser => "LOSER",
            Outcome::Undecided => "UNDECIDED",
        }
    }
}

/// User record owned by the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Unique display handle.
    pub username: String,
    /// Current presence status.
    pub presence: Presence,
    /// Registration timestamp.
    pub created_at: SystemTime,
}

/// Single flashcard: a question with its canonical answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashcardEntity {
    /// Stable identifier for the flashcard.
    pub id: Uuid,
    /// Question text shown to the player.
    pub description: String,
    /// Canonical answer used to evaluate submissions.
    pub answer: String,
    /// Distractors offered alongside the canonical answer.
    pub wrong_answers: Vec<String>,
    /// Optional illustration.
    pub image_url: Option<String>,
}

/// Deck of flashcards owned by the deck store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeckEntity {
    /// Stable identifier for the deck.
    pub id: Uuid,
    /// Human readable deck title.
    pub title: String,
    /// Ordered flashcards of the deck.
    pub flashcards: Vec<FlashcardEntity>,
}

/// Proposal from one user to another to play over a set of decks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitationEntity {
    /// Stable identifier for the invitation.
    pub id: Uuid,
    /// Inviting user.
    pub from_user_id: Uuid,
    /// Invited user.
    pub to_user_id: Uuid,
    /// Decks the quiz is built from, in selection order.
    pub deck_ids: Vec<Uuid>,
    /// Time limit copied into the quiz (0 = unlimited).
    pub time_limit_secs: u32,
    /// Whether the receiver accepted the invitation.
    pub accepted: bool,
    /// When the invitation was accepted.
    pub accepted_at: Option<SystemTime>,
    /// Quiz spawned from this invitation.
    pub quiz_id: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// One playthrough with a fixed question sequence shared by all participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Primary key of the quiz.
    pub id: Uuid,
    /// Decks participating in the quiz.
    pub deck_ids: Vec<Uuid>,
    /// Ordered question sequence; index `i` means the same card for every player.
    pub selected_flashcards: Vec<FlashcardEntity>,
    /// Lifecycle status.
    pub status: QuizStatus,
    /// Anchor for the time limit.
    pub start_time: SystemTime,
    /// Set once when the quiz completes.
    pub end_time: Option<SystemTime>,
    /// Time limit in seconds (0 = unlimited).
    pub time_limit_secs: u32,
    /// Two-player quiz when true.
    pub is_multiple: bool,
    /// Invitation this quiz was created from.
    pub invitation_id: Option<Uuid>,
    /// Users known to take part in the quiz.
    pub players: Vec<Uuid>,
}

/// Running aggregate of correct answers of a player in a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Quiz the row belongs to.
    pub quiz_id: Uuid,
    /// Player the row belongs to.
    pub user_id: Uuid,
    /// Correct answers counted so far.
    pub correct_questions: u32,
    /// Question count of the quiz when the row was created.
    pub total_questions: u32,
}

/// Finalized statistics row of a player in a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticsEntity {
    /// Quiz the row belongs to.
    pub quiz_id: Uuid,
    /// Player the row belongs to.
    pub user_id: Uuid,
    /// Correct answers at the time of the last write.
    pub score: u32,
    /// Answered submissions at the time of the last write.
    pub number_of_attempts: u32,
    /// Elapsed time in whole seconds.
    pub time_taken_secs: u64,
    /// Timestamp of the last write.
    pub quiz_date: SystemTime,
    /// WINNER, LOSER or UNDECIDED once a winner is set.
    pub outcome: Outcome,
}

/// Values written by a statistics upsert; the outcome is left untouched on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsUpdate {
    /// Quiz being written.
    pub quiz_id: Uuid,
    /// Player being written.
    pub user_id: Uuid,
    /// Correct answers.
    pub score: u32,
    /// Answered submissions.
    pub number_of_attempts: u32,
    /// Elapsed time in whole seconds.
    pub time_taken_secs: u64,
    /// Timestamp of this write.
    pub quiz_date: SystemTime,
}

impl StatisticsUpdate {
    /// Materialize the row created when no statistics exist yet for the pair.
    pub fn into_new_entity(self) -> StatisticsEntity {
        StatisticsEntity {
            quiz_id: self.quiz_id,
            user_id: self.user_id,
            score: self.score,
            number_of_attempts: self.number_of_attempts,
            time_taken_secs: self.time_taken_secs,
            quiz_date: self.quiz_date,
            outcome: Outcome::Undecided,
        }
    }

    /// Overwrite the mutable columns of an existing row.
    pub fn apply_to(&self, existing: &mut StatisticsEntity) {
        existing.score = self.score;
        existing.number_of_attempts = self.number_of_attempts;
        existing.time_taken_secs = self.time_taken_secs;
        existing.quiz_date = self.quiz_date;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_serialized_form() {
        for presence in [Presence::Online, Presence::Offline, Presence::Playing] {
            let json = serde_json::to_string(&presence).unwrap();
            assert_eq!(json, format!("\"{}\"", presence.as_str()));
        }
        for outcome in [Outcome::Winner, Outcome::Loser, Outcome::Undecided] {
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
    }

    #[test]
    fn statistics_update_keeps_existing_outcome() {
        let now = SystemTime::now();
        let update = StatisticsUpdate {
            quiz_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            score: 2,
            number_of_attempts: 3,
            time_taken_secs: 7,
            quiz_date: now,
        };
        let mut existing = update.clone().into_new_entity();
        assert_eq!(existing.outcome, Outcome::Undecided);

        existing.outcome = Outcome::Loser;
        let later = StatisticsUpdate {
            score: 3,
            ..update
        };
        later.apply_to(&mut existing);
        assert_eq!(existing.score, 3);
        assert_eq!(existing.outcome, Outcome::Loser);
    }
}
