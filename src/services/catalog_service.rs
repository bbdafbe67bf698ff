use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{DeckEntity, FlashcardEntity, Presence, UserEntity},
        quiz_store::QuizStore,
    },
    dto::catalog::{CreateDeckRequest, CreateUserRequest, DeckView, UserView},
    error::ServiceError,
    state::SharedState,
};

/// Register a user, initially online.
pub async fn create_user(
    state: &SharedState,
    request: CreateUserRequest,
) -> Result<UserView, ServiceError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ServiceError::BadRequest("username must not be blank".into()));
    }

    let store = state.require_quiz_store().await?;
    let user = UserEntity {
        id: Uuid::new_v4(),
        username: username.to_owned(),
        presence: Presence::Online,
        created_at: SystemTime::now(),
    };
    store.save_user(user.clone()).await?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Fetch a user by id.
pub async fn get_user(state: &SharedState, id: Uuid) -> Result<UserView, ServiceError> {
    let store = state.require_quiz_store().await?;
    Ok(load_user(&store, id).await?.into())
}

/// Set the presence of an existing user.
pub async fn update_presence(
    state: &SharedState,
    id: Uuid,
    presence: Presence,
) -> Result<UserView, ServiceError> {
    let store = state.require_quiz_store().await?;
    if !store.set_presence(id, presence).await? {
        return Err(ServiceError::NotFound(format!("user `{id}` not found")));
    }
    Ok(load_user(&store, id).await?.into())
}

/// Validate and store a deck, assigning ids to its flashcards.
pub async fn create_deck(
    state: &SharedState,
    request: CreateDeckRequest,
) -> Result<DeckView, ServiceError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ServiceError::BadRequest("deck title must not be blank".into()));
    }
    if request.flashcards.is_empty() {
        return Err(ServiceError::BadRequest(
            "a deck needs at least one flashcard".into(),
        ));
    }

    let mut flashcards = Vec::with_capacity(request.flashcards.len());
    for card in request.flashcards {
        if card.description.trim().is_empty() || card.answer.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "flashcards need a description and an answer".into(),
            ));
        }
        flashcards.push(FlashcardEntity {
            id: Uuid::new_v4(),
            description: card.description,
            answer: card.answer,
            wrong_answers: card.wrong_answers,
            image_url: card.image_url,
        });
    }

    let store = state.require_quiz_store().await?;
    let deck = DeckEntity {
        id: Uuid::new_v4(),
        title: title.to_owned(),
        flashcards,
    };
    store.save_deck(deck.clone()).await?;
    info!(deck_id = %deck.id, cards = deck.flashcards.len(), "deck created");
    Ok(deck.into())
}

/// Fetch a deck by id.
pub async fn get_deck(state: &SharedState, id: Uuid) -> Result<DeckView, ServiceError> {
    let store = state.require_quiz_store().await?;
    Ok(load_deck(&store, id).await?.into())
}

pub(crate) async fn load_user(
    store: &Arc<dyn QuizStore>,
    id: Uuid,
) -> Result<UserEntity, ServiceError> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}

pub(crate) async fn load_deck(
    store: &Arc<dyn QuizStore>,
    id: Uuid,
) -> Result<DeckEntity, ServiceError> {
    store
        .find_deck(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("deck `{id}` not found")))
}

/// Set the presence of a user that may have disappeared meanwhile.
pub(crate) async fn reset_presence(
    store: &Arc<dyn QuizStore>,
    id: Uuid,
    presence: Presence,
) -> Result<(), ServiceError> {
    if !store.set_presence(id, presence).await? {
        return Err(ServiceError::NotFound(format!("user `{id}` not found")));
    }
    Ok(())
}
