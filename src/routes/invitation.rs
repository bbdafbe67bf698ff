use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        invitation::{
            CreateInvitationRequest, InvitationIdQuery, InvitationView, ReceiverQuery, SenderQuery,
        },
        quiz::QuizView,
    },
    error::AppError,
    services::invitation_service,
    state::SharedState,
};

/// Invitation lifecycle: challenge, answer and cleanup.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/quiz/invitation", post(create_invitation))
        .route(
            "/quiz/invitation/{id}",
            get(get_invitation).delete(delete_invitation),
        )
        .route("/quiz/invitation/senders", get(list_sent))
        .route("/quiz/invitation/receivers", get(list_received))
        .route("/quiz/invitation/senders/cancel", delete(cancel_by_sender))
        .route("/quiz/invitation/accepted", get(earliest_accepted))
        .route("/quiz/response/confirmation", post(confirm))
        .route("/quiz/response/rejection", delete(reject))
}

/// Invite another player and prepare the shared quiz.
#[utoipa::path(
    post,
    path = "/quiz/invitation",
    tag = "invitation",
    request_body = CreateInvitationRequest,
    responses(
        (status = 200, description = "Waiting quiz linked to the new invitation", body = QuizView),
        (status = 404, description = "Unknown user or deck"),
        (status = 409, description = "A user is offline or already playing")
    )
)]
pub async fn create_invitation(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateInvitationRequest>>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(
        invitation_service::create_invitation_with_quiz(&state, payload).await?,
    ))
}

/// Fetch an invitation.
#[utoipa::path(
    get,
    path = "/quiz/invitation/{id}",
    tag = "invitation",
    params(("id" = Uuid, Path, description = "Identifier of the invitation")),
    responses(
        (status = 200, description = "Invitation", body = InvitationView),
        (status = 404, description = "Unknown invitation")
    )
)]
pub async fn get_invitation(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvitationView>, AppError> {
    Ok(Json(invitation_service::get_invitation(&state, id).await?))
}

/// Delete the invitation record only; its quiz is kept.
#[utoipa::path(
    delete,
    path = "/quiz/invitation/{id}",
    tag = "invitation",
    params(("id" = Uuid, Path, description = "Identifier of the invitation")),
    responses(
        (status = 204, description = "Invitation deleted"),
        (status = 404, description = "Unknown invitation")
    )
)]
pub async fn delete_invitation(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    invitation_service::delete_invitation(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List invitations sent by a user.
#[utoipa::path(
    get,
    path = "/quiz/invitation/senders",
    tag = "invitation",
    params(SenderQuery),
    responses(
        (status = 200, description = "Invitations sent by the user", body = [InvitationView]),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn list_sent(
    State(state): State<SharedState>,
    Query(query): Query<SenderQuery>,
) -> Result<Json<Vec<InvitationView>>, AppError> {
    Ok(Json(
        invitation_service::invitations_from(&state, query.from_user_id).await?,
    ))
}

/// List invitations received by a user.
#[utoipa::path(
    get,
    path = "/quiz/invitation/receivers",
    tag = "invitation",
    params(ReceiverQuery),
    responses(
        (status = 200, description = "Invitations received by the user", body = [InvitationView]),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn list_received(
    State(state): State<SharedState>,
    Query(query): Query<ReceiverQuery>,
) -> Result<Json<Vec<InvitationView>>, AppError> {
    Ok(Json(
        invitation_service::invitations_to(&state, query.to_user_id).await?,
    ))
}

/// Withdraw an invitation: the quiz is deleted and both players go back online.
#[utoipa::path(
    delete,
    path = "/quiz/invitation/senders/cancel",
    tag = "invitation",
    params(InvitationIdQuery),
    responses(
        (status = 204, description = "Invitation cancelled"),
        (status = 404, description = "Unknown invitation")
    )
)]
pub async fn cancel_by_sender(
    State(state): State<SharedState>,
    Query(query): Query<InvitationIdQuery>,
) -> Result<StatusCode, AppError> {
    invitation_service::cancel_by_sender(&state, query.invitation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Earliest accepted invitation of a sender; later ones are discarded.
#[utoipa::path(
    get,
    path = "/quiz/invitation/accepted",
    tag = "invitation",
    params(SenderQuery),
    responses(
        (status = 200, description = "Earliest accepted invitation, null when none", body = InvitationView),
        (status = 404, description = "Unknown sender")
    )
)]
pub async fn earliest_accepted(
    State(state): State<SharedState>,
    Query(query): Query<SenderQuery>,
) -> Result<Json<Option<InvitationView>>, AppError> {
    Ok(Json(
        invitation_service::find_earliest_accepted_for_sender(&state, query.from_user_id).await?,
    ))
}

/// Accept an invitation and start its quiz.
#[utoipa::path(
    post,
    path = "/quiz/response/confirmation",
    tag = "invitation",
    params(InvitationIdQuery),
    responses(
        (status = 200, description = "Quiz started", body = QuizView),
        (status = 404, description = "Unknown invitation or quiz"),
        (status = 409, description = "Quiz is not waiting")
    )
)]
pub async fn confirm(
    State(state): State<SharedState>,
    Query(query): Query<InvitationIdQuery>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(
        invitation_service::confirm(&state, query.invitation_id).await?,
    ))
}

/// Reject an invitation, deleting it together with its quiz.
#[utoipa::path(
    delete,
    path = "/quiz/response/rejection",
    tag = "invitation",
    params(InvitationIdQuery),
    responses(
        (status = 204, description = "Invitation rejected"),
        (status = 404, description = "Unknown invitation")
    )
)]
pub async fn reject(
    State(state): State<SharedState>,
    Query(query): Query<InvitationIdQuery>,
) -> Result<StatusCode, AppError> {
    invitation_service::reject(&state, query.invitation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
