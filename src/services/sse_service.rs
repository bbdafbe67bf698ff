use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::QuizStatus,
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::quiz_service,
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the progress topic of a quiz that can still change.
///
/// The topic is opened under the quiz lock, so it never outlives a concurrent deletion.
pub async fn subscribe_quiz(
    state: &SharedState,
    quiz_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, ServerEvent), ServiceError> {
    let store = state.require_quiz_store().await?;
    let (_progress, quiz) = quiz_service::lock_quiz(state, &store, quiz_id).await?;
    if quiz.status == QuizStatus::Completed {
        return Err(ServiceError::InvalidState(format!(
            "quiz `{quiz_id}` is already completed"
        )));
    }

    let receiver = state.broadcaster().subscribe(quiz_id);
    debug!(
        quiz_id = %quiz_id,
        subscribers = state.broadcaster().subscriber_count(quiz_id),
        "quiz topic subscribed"
    );
    let handshake = ServerEvent::json(
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            quiz_id,
            degraded: state.is_degraded().await,
        },
    )
    .map_err(|err| ServiceError::ServerError(format!("failed to encode handshake: {err}")))?;
    Ok((receiver, handshake))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a broadcast receiver into an SSE response, forwarding events until the client
/// disconnects or the quiz topic is closed.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    first: ServerEvent,
    quiz_id: Uuid,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(first))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => {
                            debug!(quiz_id = %quiz_id, "quiz topic closed");
                            break;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(quiz_id = %quiz_id, skipped, "quiz SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(quiz_id = %quiz_id, "quiz SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}
