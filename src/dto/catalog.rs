use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{DeckEntity, FlashcardEntity, Presence, UserEntity},
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload registering a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Display name, not unique.
    #[validate(length(max = 64), custom(function = "validate_not_blank"))]
    pub username: String,
}

/// Presence change requested for a user.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PresenceUpdateRequest {
    /// New presence.
    pub presence: Presence,
}

/// User as returned by the catalog routes.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// Identifier of the user.
    pub id: Uuid,
    /// Display name.
    pub username: String,
    /// Current presence.
    pub presence: Presence,
    /// RFC 3339 registration timestamp.
    pub created_at: String,
}

impl From<UserEntity> for UserView {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            presence: value.presence,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Flashcard supplied when creating a deck.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardInput {
    /// Question text.
    #[validate(custom(function = "validate_not_blank"))]
    pub description: String,
    /// Canonical answer.
    #[validate(custom(function = "validate_not_blank"))]
    pub answer: String,
    /// Distractors shown next to the answer.
    #[serde(default)]
    pub wrong_answers: Vec<String>,
    /// Optional illustration.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Payload creating a deck together with its flashcards.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckRequest {
    /// Deck title.
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    /// At least one card.
    #[validate(length(min = 1), nested)]
    pub flashcards: Vec<FlashcardInput>,
}

/// Flashcard of a deck, answer included.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardView {
    /// Identifier.
    pub id: Uuid,
    /// Question text.
    pub description: String,
    /// Canonical answer.
    pub answer: String,
    /// Distractors.
    pub wrong_answers: Vec<String>,
    /// Optional illustration.
    pub image_url: Option<String>,
}

impl From<FlashcardEntity> for FlashcardView {
    fn from(value: FlashcardEntity) -> Self {
        Self {
            id: value.id,
            description: value.description,
            answer: value.answer,
            wrong_answers: value.wrong_answers,
            image_url: value.image_url,
        }
    }
}

/// Deck with its flashcards in stored order.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeckView {
    /// Identifier.
    pub id: Uuid,
    /// Deck title.
    pub title: String,
    /// Cards in stored order.
    pub flashcards: Vec<FlashcardView>,
}

impl From<DeckEntity> for DeckView {
    fn from(value: DeckEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            flashcards: value.flashcards.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(description: &str, answer: &str) -> FlashcardInput {
        FlashcardInput {
            description: description.into(),
            answer: answer.into(),
            wrong_answers: vec![],
            image_url: None,
        }
    }

    #[test]
    fn deck_requires_cards_with_answers() {
        let empty = CreateDeckRequest {
            title: "Capitals".into(),
            flashcards: vec![],
        };
        assert!(empty.validate().is_err());

        let blank_answer = CreateDeckRequest {
            title: "Capitals".into(),
            flashcards: vec![card("France?", " ")],
        };
        assert!(blank_answer.validate().is_err());

        let valid = CreateDeckRequest {
            title: "Capitals".into(),
            flashcards: vec![card("France?", "Paris")],
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn blank_username_is_rejected() {
        let request = CreateUserRequest {
            username: "  ".into(),
        };
        assert!(request.validate().is_err());
    }
}
