use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::sse::{PlayerProgress, QuizUpdateEvent, ServerEvent, UpdateType},
    state::{QuizProgress, SharedState},
};

const EVENT_QUIZ_PROGRESS: &str = "quiz.progress";
const EVENT_QUIZ_FINISHED: &str = "quiz.finished";

/// Build the snapshot of every player of a quiz.
pub fn progress_snapshot(
    quiz_id: Uuid,
    total_questions: usize,
    finished: bool,
    progress: &QuizProgress,
) -> QuizUpdateEvent {
    QuizUpdateEvent {
        quiz_id,
        update_type: if finished {
            UpdateType::Finished
        } else {
            UpdateType::Progress
        },
        total_questions,
        players: progress
            .iter()
            .map(|(user_id, record)| PlayerProgress {
                user_id,
                score: record.total_correct,
                answered_questions: record.current_index,
            })
            .collect(),
    }
}

/// Push a progress snapshot to the topic of `quiz_id`.
pub fn broadcast_quiz_progress(
    state: &SharedState,
    quiz_id: Uuid,
    total_questions: usize,
    finished: bool,
    progress: &QuizProgress,
) {
    let payload = progress_snapshot(quiz_id, total_questions, finished, progress);
    let event = match payload.update_type {
        UpdateType::Finished => EVENT_QUIZ_FINISHED,
        UpdateType::Progress => EVENT_QUIZ_PROGRESS,
    };
    send_quiz_event(state, quiz_id, event, &payload);
}

fn send_quiz_event(state: &SharedState, quiz_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.broadcaster().publish(quiz_id, event),
        Err(err) => warn!(event, quiz_id = %quiz_id, error = %err, "failed to serialize quiz SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn snapshot_reports_index_and_score_per_player() {
        let quiz_id = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut progress = QuizProgress::default();
        let now = SystemTime::now();
        {
            let record = progress.record_mut(alice, now);
            record.current_index = 2;
            record.total_correct = 2;
        }
        progress.record_mut(bob, now);

        let snapshot = progress_snapshot(quiz_id, 3, false, &progress);
        assert_eq!(snapshot.update_type, UpdateType::Progress);
        assert_eq!(
            snapshot.players,
            vec![
                PlayerProgress {
                    user_id: alice,
                    score: 2,
                    answered_questions: 2
                },
                PlayerProgress {
                    user_id: bob,
                    score: 0,
                    answered_questions: 0
                },
            ]
        );

        let json = serde_json::to_value(progress_snapshot(quiz_id, 3, true, &progress)).unwrap();
        assert_eq!(json["updateType"], "finished");
        assert_eq!(json["totalQuestions"], 3);
    }
}
