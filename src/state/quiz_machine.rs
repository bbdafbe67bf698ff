use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::dao::models::QuizStatus;

/// Indicates why a quiz is being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every participant reached the end of the question sequence.
    AllFinished,
    /// The time limit elapsed since the quiz started.
    TimeExpired,
    /// A player quit, or the owning invitation was withdrawn.
    Cancelled,
}

/// Events that can be applied to a quiz status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizEvent {
    /// Players may start answering.
    Begin,
    /// Close the quiz for good.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the quiz was in when the invalid event was received.
    pub from: QuizStatus,
    /// The event that cannot be applied from this status.
    pub event: QuizEvent,
}

/// Compute the next status of a quiz, rejecting anything that would move backwards or
/// leave the terminal state.
pub fn compute_transition(
    from: QuizStatus,
    event: QuizEvent,
) -> Result<QuizStatus, InvalidTransition> {
    let next = match (from, event) {
        (QuizStatus::Waiting, QuizEvent::Begin) => QuizStatus::InProgress,
        (QuizStatus::InProgress, QuizEvent::Finish(_)) => QuizStatus::Completed,
        (QuizStatus::Waiting, QuizEvent::Finish(FinishReason::Cancelled)) => {
            QuizStatus::Completed
        }
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

/// Whether `limit_secs` (0 = unlimited) has fully elapsed between `start` and `now`.
pub fn time_expired(start: SystemTime, limit_secs: u32, now: SystemTime) -> bool {
    if limit_secs == 0 {
        return false;
    }
    now.duration_since(start)
        .map(|elapsed| elapsed >= Duration::from_secs(u64::from(limit_secs)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_quiz_begins() {
        assert_eq!(
            compute_transition(QuizStatus::Waiting, QuizEvent::Begin),
            Ok(QuizStatus::InProgress)
        );
    }

    #[test]
    fn running_quiz_completes_for_every_reason() {
        for reason in [
            FinishReason::AllFinished,
            FinishReason::TimeExpired,
            FinishReason::Cancelled,
        ] {
            assert_eq!(
                compute_transition(QuizStatus::InProgress, QuizEvent::Finish(reason)),
                Ok(QuizStatus::Completed)
            );
        }
    }

    #[test]
    fn waiting_quiz_only_completes_when_cancelled() {
        assert_eq!(
            compute_transition(
                QuizStatus::Waiting,
                QuizEvent::Finish(FinishReason::Cancelled)
            ),
            Ok(QuizStatus::Completed)
        );
        let err = compute_transition(
            QuizStatus::Waiting,
            QuizEvent::Finish(FinishReason::TimeExpired),
        )
        .unwrap_err();
        assert_eq!(err.from, QuizStatus::Waiting);
    }

    #[test]
    fn completed_is_terminal() {
        for event in [
            QuizEvent::Begin,
            QuizEvent::Finish(FinishReason::AllFinished),
            QuizEvent::Finish(FinishReason::Cancelled),
        ] {
            let err = compute_transition(QuizStatus::Completed, event).unwrap_err();
            assert_eq!(
                err,
                InvalidTransition {
                    from: QuizStatus::Completed,
                    event
                }
            );
        }
    }

    #[test]
    fn running_quiz_cannot_begin_twice() {
        assert!(compute_transition(QuizStatus::InProgress, QuizEvent::Begin).is_err());
    }

    #[test]
    fn time_limit_boundaries() {
        let start = SystemTime::now();
        assert!(!time_expired(start, 0, start + Duration::from_secs(3600)));
        assert!(!time_expired(start, 5, start + Duration::from_millis(4_999)));
        assert!(time_expired(start, 5, start + Duration::from_secs(5)));
        assert!(!time_expired(start, 5, start - Duration::from_secs(1)));
    }
}
