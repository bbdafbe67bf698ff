use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::InvitationEntity, dto::format_system_time};

/// Payload sent by a player challenging another one.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    /// Sender, who plays first.
    pub from_user_id: Uuid,
    /// Receiver.
    pub to_user_id: Uuid,
    /// Decks to draw questions from; repeats are ignored.
    #[validate(length(min = 1))]
    pub deck_ids: Vec<Uuid>,
    /// Time limit of the resulting quiz, 0 for unlimited.
    #[serde(default)]
    pub time_limit_seconds: u32,
}

/// Invitation as returned by the invitation routes.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    /// Identifier.
    pub id: Uuid,
    /// Sender.
    pub from_user_id: Uuid,
    /// Receiver.
    pub to_user_id: Uuid,
    /// Decks questions are drawn from.
    pub deck_ids: Vec<Uuid>,
    /// Time limit in seconds, 0 for unlimited.
    pub time_limit_seconds: u32,
    /// Whether the receiver confirmed.
    pub accepted: bool,
    /// RFC 3339 confirmation timestamp.
    pub accepted_at: Option<String>,
    /// Quiz created for the invitation, if any.
    pub quiz_id: Option<Uuid>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<InvitationEntity> for InvitationView {
    fn from(value: InvitationEntity) -> Self {
        Self {
            id: value.id,
            from_user_id: value.from_user_id,
            to_user_id: value.to_user_id,
            deck_ids: value.deck_ids,
            time_limit_seconds: value.time_limit_secs,
            accepted: value.accepted,
            accepted_at: value.accepted_at.map(format_system_time),
            quiz_id: value.quiz_id,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Query selecting an invitation.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvitationIdQuery {
    /// Identifier of the invitation.
    pub invitation_id: Uuid,
}

/// Query selecting invitations by sender.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SenderQuery {
    /// Sender.
    pub from_user_id: Uuid,
}

/// Query selecting invitations by receiver.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReceiverQuery {
    /// Receiver.
    pub to_user_id: Uuid,
}
