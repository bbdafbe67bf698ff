use std::{sync::Arc, time::SystemTime};

use indexmap::IndexSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{InvitationEntity, Presence, QuizEntity, QuizStatus},
        quiz_store::QuizStore,
    },
    dto::{
        invitation::{CreateInvitationRequest, InvitationView},
        quiz::QuizView,
    },
    error::ServiceError,
    services::{catalog_service, quiz_service},
    state::{
        SharedState,
        quiz_machine::{QuizEvent, compute_transition},
    },
};

/// Persist a pending invitation between two available users.
pub async fn create_invitation(
    state: &SharedState,
    request: CreateInvitationRequest,
) -> Result<InvitationView, ServiceError> {
    if request.deck_ids.is_empty() {
        return Err(ServiceError::BadRequest(
            "an invitation needs at least one deck".into(),
        ));
    }

    let store = state.require_quiz_store().await?;
    for user_id in [request.from_user_id, request.to_user_id] {
        let user = catalog_service::load_user(&store, user_id).await?;
        if user.presence != Presence::Online {
            return Err(ServiceError::InvalidState(format!(
                "user `{user_id}` is {} and cannot be invited",
                user.presence.as_str()
            )));
        }
    }
    let deck_ids: IndexSet<Uuid> = request.deck_ids.into_iter().collect();
    for deck_id in &deck_ids {
        catalog_service::load_deck(&store, *deck_id).await?;
    }

    let invitation = InvitationEntity {
        id: Uuid::new_v4(),
        from_user_id: request.from_user_id,
        to_user_id: request.to_user_id,
        deck_ids: deck_ids.into_iter().collect(),
        time_limit_secs: request.time_limit_seconds,
        accepted: false,
        accepted_at: None,
        quiz_id: None,
        created_at: SystemTime::now(),
    };
    store.save_invitation(invitation.clone()).await?;
    info!(
        invitation_id = %invitation.id,
        from_user_id = %invitation.from_user_id,
        to_user_id = %invitation.to_user_id,
        "invitation created"
    );
    Ok(invitation.into())
}

/// Create the invitation and its waiting quiz in one go.
pub async fn create_invitation_with_quiz(
    state: &SharedState,
    request: CreateInvitationRequest,
) -> Result<QuizView, ServiceError> {
    let invitation = create_invitation(state, request).await?;
    create_quiz(state, invitation.id).await
}

/// Build the shared question sequence from every deck of the invitation.
pub async fn create_quiz(
    state: &SharedState,
    invitation_id: Uuid,
) -> Result<QuizView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let mut invitation = load_invitation(&store, invitation_id).await?;
    if let Some(quiz_id) = invitation.quiz_id {
        return Err(ServiceError::InvalidState(format!(
            "invitation `{invitation_id}` already has quiz `{quiz_id}`"
        )));
    }

    let mut cards = Vec::new();
    for deck_id in &invitation.deck_ids {
        cards.extend(catalog_service::load_deck(&store, *deck_id).await?.flashcards);
    }

    let quiz = QuizEntity {
        id: Uuid::new_v4(),
        deck_ids: invitation.deck_ids.clone(),
        selected_flashcards: quiz_service::shuffle_cards(cards),
        status: QuizStatus::Waiting,
        start_time: SystemTime::now(),
        end_time: None,
        time_limit_secs: invitation.time_limit_secs,
        is_multiple: true,
        invitation_id: Some(invitation.id),
        players: vec![invitation.from_user_id, invitation.to_user_id],
    };
    store.save_quiz(quiz.clone()).await?;

    invitation.quiz_id = Some(quiz.id);
    store.save_invitation(invitation).await?;

    info!(
        invitation_id = %invitation_id,
        quiz_id = %quiz.id,
        questions = quiz.selected_flashcards.len(),
        "quiz created from invitation"
    );
    Ok((&quiz).into())
}

/// Accept an invitation and start its quiz.
pub async fn confirm(state: &SharedState, invitation_id: Uuid) -> Result<QuizView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let mut invitation = load_invitation(&store, invitation_id).await?;
    let quiz_id = linked_quiz(&invitation)?;
    let (_progress, mut quiz) = quiz_service::lock_quiz(state, &store, quiz_id).await?;

    let now = SystemTime::now();
    quiz.status = compute_transition(quiz.status, QuizEvent::Begin)?;
    quiz.start_time = now;
    store.save_quiz(quiz.clone()).await?;

    invitation.accepted = true;
    invitation.accepted_at = Some(now);
    store.save_invitation(invitation.clone()).await?;

    for user_id in [invitation.from_user_id, invitation.to_user_id] {
        catalog_service::reset_presence(&store, user_id, Presence::Playing).await?;
    }

    info!(invitation_id = %invitation_id, quiz_id = %quiz_id, "invitation confirmed");
    Ok((&quiz).into())
}

/// Withdraw an invitation: drop it with its quiz and free both users.
pub async fn cancel_by_sender(
    state: &SharedState,
    invitation_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_quiz_store().await?;
    let invitation = remove_with_quiz(state, &store, invitation_id).await?;
    for user_id in [invitation.from_user_id, invitation.to_user_id] {
        catalog_service::reset_presence(&store, user_id, Presence::Online).await?;
    }
    info!(invitation_id = %invitation_id, "invitation cancelled by sender");
    Ok(())
}

/// Decline an invitation. Presence is left as is.
pub async fn reject(state: &SharedState, invitation_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_quiz_store().await?;
    remove_with_quiz(state, &store, invitation_id).await?;
    info!(invitation_id = %invitation_id, "invitation rejected");
    Ok(())
}

/// Earliest accepted invitation of a sender. Every other accepted invitation of that
/// sender is discarded with its quiz and its receiver set back online.
pub async fn find_earliest_accepted_for_sender(
    state: &SharedState,
    from_user_id: Uuid,
) -> Result<Option<InvitationView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    catalog_service::load_user(&store, from_user_id).await?;

    let mut accepted: Vec<InvitationEntity> = store
        .list_invitations_from(from_user_id)
        .await?
        .into_iter()
        .filter(|invitation| invitation.accepted)
        .collect();
    // stable: equal timestamps keep storage order
    accepted.sort_by_key(|invitation| invitation.accepted_at);

    let mut accepted = accepted.into_iter();
    let Some(earliest) = accepted.next() else {
        return Ok(None);
    };

    for stale in accepted {
        if let Some(quiz_id) = stale.quiz_id {
            quiz_service::discard_quiz(state, &store, quiz_id).await?;
        }
        store.delete_invitation(stale.id).await?;
        if let Err(err) =
            catalog_service::reset_presence(&store, stale.to_user_id, Presence::Online).await
        {
            warn!(invitation_id = %stale.id, user_id = %stale.to_user_id, error = %err, "failed to reset receiver presence");
        }
        info!(invitation_id = %stale.id, kept = %earliest.id, "stale accepted invitation discarded");
    }

    Ok(Some(earliest.into()))
}

/// Fetch an invitation by id.
pub async fn get_invitation(
    state: &SharedState,
    invitation_id: Uuid,
) -> Result<InvitationView, ServiceError> {
    let store = state.require_quiz_store().await?;
    Ok(load_invitation(&store, invitation_id).await?.into())
}

/// Invitations sent by a known user, oldest first.
pub async fn invitations_from(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<InvitationView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    catalog_service::load_user(&store, user_id).await?;
    let rows = store.list_invitations_from(user_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Invitations received by a known user, oldest first.
pub async fn invitations_to(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<InvitationView>, ServiceError> {
    let store = state.require_quiz_store().await?;
    catalog_service::load_user(&store, user_id).await?;
    let rows = store.list_invitations_to(user_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Remove the invitation only; its quiz survives without the back link.
pub async fn delete_invitation(
    state: &SharedState,
    invitation_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_quiz_store().await?;
    let invitation = load_invitation(&store, invitation_id).await?;

    if let Some(quiz_id) = invitation.quiz_id {
        let (_progress, quiz) = quiz_service::lock_quiz(state, &store, quiz_id).await?;
        store
            .save_quiz(QuizEntity {
                invitation_id: None,
                ..quiz
            })
            .await?;
    }
    store.delete_invitation(invitation_id).await?;
    info!(invitation_id = %invitation_id, "invitation deleted");
    Ok(())
}

async fn load_invitation(
    store: &Arc<dyn QuizStore>,
    id: Uuid,
) -> Result<InvitationEntity, ServiceError> {
    store
        .find_invitation(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("invitation `{id}` not found")))
}

fn linked_quiz(invitation: &InvitationEntity) -> Result<Uuid, ServiceError> {
    invitation.quiz_id.ok_or_else(|| {
        ServiceError::NotFound(format!("invitation `{}` has no quiz", invitation.id))
    })
}

async fn remove_with_quiz(
    state: &SharedState,
    store: &Arc<dyn QuizStore>,
    invitation_id: Uuid,
) -> Result<InvitationEntity, ServiceError> {
    let invitation = load_invitation(store, invitation_id).await?;
    if let Some(quiz_id) = invitation.quiz_id {
        quiz_service::discard_quiz(state, store, quiz_id).await?;
    }
    store.delete_invitation(invitation_id).await?;
    Ok(invitation)
}
