use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dao::models::{FlashcardEntity, QuizEntity, QuizStatus, ScoreEntity},
    dto::format_system_time,
};

/// Payload starting a quiz directly from a deck.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartQuizRequest {
    /// Deck to draw questions from.
    pub deck_id: Uuid,
    /// Requested question count; absent or 0 means the whole deck.
    #[serde(default)]
    pub number_of_questions: Option<u32>,
    /// Time limit in seconds, 0 for unlimited.
    #[serde(default)]
    pub time_limit_seconds: u32,
    /// Whether more than one player takes part.
    #[serde(default)]
    pub is_multiple: bool,
}

/// Answer submitted by a player for the card at their current index.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// Identifier of the quiz.
    pub quiz_id: Uuid,
    /// Card being answered; must match the caller's current card.
    pub flashcard_id: Uuid,
    /// Identifier of the player.
    pub user_id: Uuid,
    /// Absent or blank counts as a skip.
    #[serde(default)]
    pub answer: Option<String>,
}

/// Query naming the calling player.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PlayerQuery {
    /// Identifier of the player.
    pub user_id: Uuid,
}

/// Question as shown to a player; never carries the canonical answer.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    /// Identifier of the flashcard.
    pub id: Uuid,
    /// Question text.
    pub description: String,
    /// Optional illustration.
    pub image_url: Option<String>,
    /// Canonical answer mixed with the distractors, sorted case-insensitively.
    pub choices: Vec<String>,
}

impl From<&FlashcardEntity> for QuestionView {
    fn from(card: &FlashcardEntity) -> Self {
        let mut choices: Vec<String> = std::iter::once(card.answer.clone())
            .chain(card.wrong_answers.iter().cloned())
            .collect();
        choices.sort_by_key(|choice| choice.to_lowercase());
        choices.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        Self {
            id: card.id,
            description: card.description.clone(),
            image_url: card.image_url.clone(),
            choices,
        }
    }
}

/// Outcome of an answer submission.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    /// Whether the answer matched the card.
    pub was_correct: bool,
    /// Whether the caller has no card left.
    pub finished: bool,
    /// Card now expected from the caller, absent once finished.
    pub next_question: Option<QuestionView>,
}

/// Quiz as returned by the quiz routes.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    /// Identifier.
    pub id: Uuid,
    /// Decks questions are drawn from.
    pub deck_ids: Vec<Uuid>,
    /// Lifecycle status.
    pub status: QuizStatus,
    /// RFC 3339 start timestamp.
    pub start_time: String,
    /// RFC 3339 end timestamp, set once completed.
    pub end_time: Option<String>,
    /// Time limit in seconds, 0 for unlimited.
    pub time_limit_seconds: u32,
    /// Whether more than one player takes part.
    pub is_multiple: bool,
    /// Invitation the quiz was created from.
    pub invitation_id: Option<Uuid>,
    /// Invited players; empty for solo quizzes.
    pub players: Vec<Uuid>,
    /// Number of selected questions.
    pub total_questions: usize,
}

impl From<&QuizEntity> for QuizView {
    fn from(quiz: &QuizEntity) -> Self {
        Self {
            id: quiz.id,
            deck_ids: quiz.deck_ids.clone(),
            status: quiz.status,
            start_time: format_system_time(quiz.start_time),
            end_time: quiz.end_time.map(format_system_time),
            time_limit_seconds: quiz.time_limit_secs,
            is_multiple: quiz.is_multiple,
            invitation_id: quiz.invitation_id,
            players: quiz.players.clone(),
            total_questions: quiz.selected_flashcards.len(),
        }
    }
}

/// Score row of a player.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreView {
    /// Identifier of the quiz.
    pub quiz_id: Uuid,
    /// Identifier of the player.
    pub user_id: Uuid,
    /// Correct answers counted so far.
    pub correct_questions: u32,
    /// Number of selected questions.
    pub total_questions: u32,
}

impl From<ScoreEntity> for ScoreView {
    fn from(value: ScoreEntity) -> Self {
        Self {
            quiz_id: value.quiz_id,
            user_id: value.user_id,
            correct_questions: value.correct_questions,
            total_questions: value.total_questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_view_hides_which_choice_is_right() {
        let card = FlashcardEntity {
            id: Uuid::new_v4(),
            description: "Capital of France?".into(),
            answer: "Paris".into(),
            wrong_answers: vec!["lyon".into(), "Berlin".into(), "PARIS".into()],
            image_url: None,
        };

        let view = QuestionView::from(&card);
        assert_eq!(view.choices, vec!["Berlin", "lyon", "Paris"]);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("answer").is_none());
        assert!(json.get("imageUrl").is_none());
    }
}
