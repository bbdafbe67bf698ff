use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::catalog::{CreateDeckRequest, CreateUserRequest, DeckView, PresenceUpdateRequest, UserView},
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

/// Users and decks consumed by the quiz flows.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/presence", put(update_presence))
        .route("/decks", post(create_deck))
        .route("/decks/{id}", get(get_deck))
}

/// Register a player, initially online.
#[utoipa::path(
    post,
    path = "/users",
    tag = "catalog",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = UserView),
        (status = 400, description = "Blank or oversized username")
    )
)]
pub async fn create_user(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateUserRequest>>,
) -> Result<Json<UserView>, AppError> {
    Ok(Json(catalog_service::create_user(&state, payload).await?))
}

/// Fetch a user.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Identifier of the user")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, AppError> {
    Ok(Json(catalog_service::get_user(&state, id).await?))
}

/// Change the presence of a user.
#[utoipa::path(
    put,
    path = "/users/{id}/presence",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Identifier of the user")),
    request_body = PresenceUpdateRequest,
    responses(
        (status = 200, description = "Presence updated", body = UserView),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn update_presence(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PresenceUpdateRequest>,
) -> Result<Json<UserView>, AppError> {
    Ok(Json(
        catalog_service::update_presence(&state, id, payload.presence).await?,
    ))
}

/// Create a deck with its flashcards.
#[utoipa::path(
    post,
    path = "/decks",
    tag = "catalog",
    request_body = CreateDeckRequest,
    responses(
        (status = 200, description = "Deck created", body = DeckView),
        (status = 400, description = "Blank title, no cards or incomplete card")
    )
)]
pub async fn create_deck(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateDeckRequest>>,
) -> Result<Json<DeckView>, AppError> {
    Ok(Json(catalog_service::create_deck(&state, payload).await?))
}

/// Fetch a deck with its flashcards.
#[utoipa::path(
    get,
    path = "/decks/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Identifier of the deck")),
    responses(
        (status = 200, description = "Deck", body = DeckView),
        (status = 404, description = "Unknown deck")
    )
)]
pub async fn get_deck(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeckView>, AppError> {
    Ok(Json(catalog_service::get_deck(&state, id).await?))
}
