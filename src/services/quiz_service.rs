use std::{sync::Arc, time::SystemTime};

use indexmap::IndexSet;
use rand::{rng, seq::SliceRandom};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{FlashcardEntity, Presence, QuizEntity, QuizStatus},
        quiz_store::QuizStore,
    },
    dto::quiz::{AnswerRequest, AnswerResponse, QuestionView, QuizView, StartQuizRequest},
    error::ServiceError,
    services::{catalog_service, score_ledger, sse_events, statistics_service},
    state::{
        ProgressRecord, QuizProgress, SharedState,
        quiz_machine::{FinishReason, QuizEvent, compute_transition, time_expired},
    },
};

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Create a quiz from a single deck. Solo quizzes start immediately, multiplayer ones wait.
pub async fn start_quiz(
    state: &SharedState,
    request: StartQuizRequest,
) -> Result<QuizView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let deck = catalog_service::load_deck(&store, request.deck_id).await?;

    let requested = request
        .number_of_questions
        .unwrap_or_else(|| state.config().default_question_count());
    let count = question_count(requested, deck.flashcards.len());
    let mut selected = shuffle_cards(deck.flashcards);
    selected.truncate(count);

    let quiz = QuizEntity {
        id: Uuid::new_v4(),
        deck_ids: vec![deck.id],
        selected_flashcards: selected,
        status: if request.is_multiple {
            QuizStatus::Waiting
        } else {
            QuizStatus::InProgress
        },
        start_time: SystemTime::now(),
        end_time: None,
        time_limit_secs: request.time_limit_seconds,
        is_multiple: request.is_multiple,
        invitation_id: None,
        players: Vec::new(),
    };
    store.save_quiz(quiz.clone()).await?;

    info!(
        quiz_id = %quiz.id,
        deck_id = %deck.id,
        questions = count,
        multiplayer = quiz.is_multiple,
        "quiz started from deck"
    );
    Ok((&quiz).into())
}

/// Requested count when positive, otherwise the whole deck; never more than available.
fn question_count(requested: u32, available: usize) -> usize {
    match usize::try_from(requested) {
        Ok(0) | Err(_) => available,
        Ok(requested) => requested.min(available),
    }
}

pub(crate) fn shuffle_cards(mut cards: Vec<FlashcardEntity>) -> Vec<FlashcardEntity> {
    cards.shuffle(&mut rng());
    cards
}

/// Flip a multiplayer quiz to running once it is complete; otherwise return it unchanged.
pub async fn start_multiplayer_if_ready(
    state: &SharedState,
    quiz_id: Uuid,
) -> Result<QuizView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let (_progress, mut quiz) = lock_quiz(state, &store, quiz_id).await?;

    if quiz.is_multiple && quiz.status == QuizStatus::Waiting && quiz.deck_ids.len() >= 2 {
        quiz.status = compute_transition(quiz.status, QuizEvent::Begin)?;
        quiz.start_time = SystemTime::now();
        store.save_quiz(quiz.clone()).await?;
        info!(quiz_id = %quiz.id, "multiplayer quiz started");
    }

    Ok((&quiz).into())
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Question at the caller's cursor. Never moves the cursor.
pub async fn current_question(
    state: &SharedState,
    quiz_id: Uuid,
    user_id: Uuid,
) -> Result<QuestionView, ServiceError> {
    let store = state.require_quiz_store().await?;
    catalog_service::load_user(&store, user_id).await?;
    let (mut progress, quiz) = lock_quiz(state, &store, quiz_id).await?;

    ensure_in_progress(&quiz)?;
    let record = progress.record_mut(user_id, SystemTime::now());
    let card = card_at_cursor(&quiz, record)?;
    Ok(QuestionView::from(card))
}

/// Evaluate an answer, move the caller's cursor and complete the quiz when due.
pub async fn process_answer(
    state: &SharedState,
    request: AnswerRequest,
) -> Result<AnswerResponse, ServiceError> {
    let AnswerRequest {
        quiz_id,
        flashcard_id,
        user_id,
        answer,
    } = request;

    let store = state.require_quiz_store().await?;
    let user = catalog_service::load_user(&store, user_id).await?;
    let (mut progress, mut quiz) = lock_quiz(state, &store, quiz_id).await?;
    ensure_in_progress(&quiz)?;

    let now = SystemTime::now();
    let total = quiz.selected_flashcards.len();
    let mut record = progress.record_mut(user_id, now).clone();
    let card = card_at_cursor(&quiz, &record)?.clone();
    if card.id != flashcard_id {
        return Err(ServiceError::BadRequest(format!(
            "flashcard `{flashcard_id}` is not the current question"
        )));
    }

    if user.presence != Presence::Playing {
        catalog_service::reset_presence(&store, user_id, Presence::Playing).await?;
    }

    let evaluation = Evaluation::of(answer.as_deref(), &card.answer);
    apply_answer(&mut record, evaluation, total);
    debug!(
        quiz_id = %quiz_id,
        user_id = %user_id,
        answered = evaluation.answered,
        correct = evaluation.correct,
        index = record.current_index,
        finished = record.finished,
        "answer evaluated"
    );

    // Commit the record only after both writes succeed. The increment is the one
    // non-idempotent write, so it goes last.
    if evaluation.answered {
        statistics_service::record_quiz_stats(
            &store,
            quiz_id,
            user_id,
            record.total_correct,
            record.total_attempts,
            record.elapsed_secs(now),
        )
        .await?;
    }
    if evaluation.correct {
        let total_questions = u32::try_from(total).unwrap_or(u32::MAX);
        score_ledger::record_correct_answer(&store, quiz_id, user_id, total_questions).await?;
    }
    *progress.record_mut(user_id, now) = record;

    let all_finished = progress.all_finished(quiz.is_multiple);
    let expired = time_expired(quiz.start_time, quiz.time_limit_secs, now);
    let quiz_over = all_finished || expired;
    if quiz_over {
        let reason = if all_finished {
            FinishReason::AllFinished
        } else {
            FinishReason::TimeExpired
        };
        finalize(&store, &mut quiz, &mut progress, reason).await?;
    }

    sse_events::broadcast_quiz_progress(state, quiz_id, total, quiz_over, &progress);
    if quiz_over {
        state.broadcaster().close(quiz_id);
    }

    let (finished, next_question) = match progress.get(user_id) {
        Some(record) if !record.finished => (
            false,
            quiz.selected_flashcards
                .get(record.current_index)
                .map(QuestionView::from),
        ),
        _ => (true, None),
    };

    Ok(AnswerResponse {
        was_correct: evaluation.correct,
        finished,
        next_question,
    })
}

/// Force the end of a quiz, e.g. when a player quits.
pub async fn cancel_quiz(state: &SharedState, quiz_id: Uuid) -> Result<QuizView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let (mut progress, mut quiz) = lock_quiz(state, &store, quiz_id).await?;

    if finalize(&store, &mut quiz, &mut progress, FinishReason::Cancelled).await? {
        sse_events::broadcast_quiz_progress(
            state,
            quiz_id,
            quiz.selected_flashcards.len(),
            true,
            &progress,
        );
        state.broadcaster().close(quiz_id);
    }

    Ok((&quiz).into())
}

/// Current view of a quiz.
pub async fn quiz_status(state: &SharedState, quiz_id: Uuid) -> Result<QuizView, ServiceError> {
    let store = state.require_quiz_store().await?;
    Ok((&load_quiz(&store, quiz_id).await?).into())
}

// ---------------------------------------------------------------------------
// Helpers shared with the invitation flow
// ---------------------------------------------------------------------------

pub(crate) async fn load_quiz(
    store: &Arc<dyn QuizStore>,
    id: Uuid,
) -> Result<QuizEntity, ServiceError> {
    store
        .find_quiz(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{id}` not found")))
}

/// Take the per-quiz lock, then read the quiz under it.
pub(crate) async fn lock_quiz(
    state: &SharedState,
    store: &Arc<dyn QuizStore>,
    quiz_id: Uuid,
) -> Result<(OwnedMutexGuard<QuizProgress>, QuizEntity), ServiceError> {
    let guard = state.progress().lock(quiz_id).await;
    match store.find_quiz(quiz_id).await? {
        Some(quiz) => Ok((guard, quiz)),
        None => {
            drop(guard);
            state.progress().evict(quiz_id);
            Err(ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))
        }
    }
}

/// Delete a quiz with its scores, progress records and broadcast topic.
pub(crate) async fn discard_quiz(
    state: &SharedState,
    store: &Arc<dyn QuizStore>,
    quiz_id: Uuid,
) -> Result<(), ServiceError> {
    let _guard = state.progress().lock(quiz_id).await;
    store.delete_quiz(quiz_id).await?;
    state.progress().evict(quiz_id);
    state.broadcaster().close(quiz_id);
    info!(quiz_id = %quiz_id, "quiz discarded");
    Ok(())
}

/// Complete the quiz once. Returns `false` when it was already completed.
///
/// Statistics and presence updates on behalf of players are best effort: failures are
/// logged and never surface to the caller.
pub(crate) async fn finalize(
    store: &Arc<dyn QuizStore>,
    quiz: &mut QuizEntity,
    progress: &mut QuizProgress,
    reason: FinishReason,
) -> Result<bool, ServiceError> {
    if quiz.status == QuizStatus::Completed {
        return Ok(false);
    }

    let now = SystemTime::now();
    quiz.status = compute_transition(quiz.status, QuizEvent::Finish(reason))?;
    quiz.end_time = Some(now);
    store.save_quiz(quiz.clone()).await?;
    info!(
        quiz_id = %quiz.id,
        reason = ?reason,
        players = progress.player_count(),
        "quiz completed"
    );

    for (user_id, record) in progress.iter_mut() {
        if record.finished {
            continue;
        }
        if let Err(err) = statistics_service::record_quiz_stats(
            store,
            quiz.id,
            user_id,
            record.total_correct,
            record.total_attempts,
            record.elapsed_secs(now),
        )
        .await
        {
            warn!(quiz_id = %quiz.id, user_id = %user_id, error = %err, "failed to finalize player statistics");
        }
        record.finished = true;
    }

    let participants: IndexSet<Uuid> = quiz
        .players
        .iter()
        .copied()
        .chain(progress.iter().map(|(user_id, _)| user_id))
        .collect();
    for user_id in participants {
        if let Err(err) = catalog_service::reset_presence(store, user_id, Presence::Online).await {
            warn!(quiz_id = %quiz.id, user_id = %user_id, error = %err, "failed to reset player presence");
        }
    }

    Ok(true)
}

fn ensure_in_progress(quiz: &QuizEntity) -> Result<(), ServiceError> {
    if quiz.status != QuizStatus::InProgress {
        return Err(ServiceError::InvalidState(format!(
            "quiz `{}` is not in progress (status {:?})",
            quiz.id, quiz.status
        )));
    }
    Ok(())
}

fn card_at_cursor<'a>(
    quiz: &'a QuizEntity,
    record: &ProgressRecord,
) -> Result<&'a FlashcardEntity, ServiceError> {
    if record.finished {
        return Err(ServiceError::AlreadyFinished(format!(
            "quiz `{}` already finished by this player",
            quiz.id
        )));
    }
    if quiz.selected_flashcards.is_empty() {
        return Err(ServiceError::ServerError(format!(
            "quiz `{}` has no questions",
            quiz.id
        )));
    }
    quiz.selected_flashcards
        .get(record.current_index)
        .ok_or_else(|| {
            ServiceError::OutOfRange(format!(
                "no question at index {} of quiz `{}`",
                record.current_index, quiz.id
            ))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Evaluation {
    /// Non-blank answer submitted.
    answered: bool,
    correct: bool,
}

impl Evaluation {
    fn of(answer: Option<&str>, canonical: &str) -> Self {
        match answer.map(str::trim).filter(|answer| !answer.is_empty()) {
            Some(answer) => Self {
                answered: true,
                correct: answer.to_lowercase() == canonical.trim().to_lowercase(),
            },
            None => Self {
                answered: false,
                correct: false,
            },
        }
    }
}

/// Wrong answers retry the same card; blank answers only matter on the last card.
fn apply_answer(record: &mut ProgressRecord, evaluation: Evaluation, total: usize) {
    if evaluation.answered {
        record.total_attempts += 1;
    }
    if evaluation.correct {
        record.total_correct += 1;
    }

    let is_last = record.current_index + 1 >= total;
    if evaluation.correct && !is_last {
        record.current_index += 1;
    } else if is_last && (evaluation.correct || !evaluation.answered) {
        record.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_record() -> ProgressRecord {
        let mut progress = QuizProgress::default();
        progress
            .record_mut(Uuid::new_v4(), SystemTime::now())
            .clone()
    }

    #[test]
    fn answers_are_trimmed_and_case_insensitive() {
        assert_eq!(
            Evaluation::of(Some("  paris "), "Paris"),
            Evaluation {
                answered: true,
                correct: true
            }
        );
        assert!(!Evaluation::of(Some("london"), "Paris").correct);
        assert!(!Evaluation::of(Some("   "), "Paris").answered);
        assert!(!Evaluation::of(None, "Paris").answered);
    }

    #[test]
    fn wrong_answer_keeps_cursor_and_counts_attempt() {
        let mut record = fresh_record();
        apply_answer(&mut record, Evaluation::of(Some("nope"), "yes"), 3);
        assert_eq!(record.current_index, 0);
        assert_eq!(record.total_attempts, 1);
        assert_eq!(record.total_correct, 0);
        assert!(!record.finished);
    }

    #[test]
    fn blank_answer_mid_quiz_is_a_no_op() {
        let mut record = fresh_record();
        apply_answer(&mut record, Evaluation::of(Some(""), "yes"), 3);
        assert_eq!(record.current_index, 0);
        assert_eq!(record.total_attempts, 0);
        assert!(!record.finished);
    }

    #[test]
    fn last_card_finishes_on_correct_or_blank_answer() {
        let mut record = fresh_record();
        record.current_index = 1;
        apply_answer(&mut record, Evaluation::of(Some("yes"), "yes"), 2);
        assert!(record.finished);
        assert_eq!(record.current_index, 1, "cursor never passes the last card");

        let mut skipped = fresh_record();
        skipped.current_index = 1;
        apply_answer(&mut skipped, Evaluation::of(None, "yes"), 2);
        assert!(skipped.finished);
        assert_eq!(skipped.total_attempts, 0);

        let mut wrong = fresh_record();
        wrong.current_index = 1;
        apply_answer(&mut wrong, Evaluation::of(Some("no"), "yes"), 2);
        assert!(!wrong.finished);
    }

    #[test]
    fn question_count_is_clamped_to_deck_size() {
        assert_eq!(question_count(0, 7), 7);
        assert_eq!(question_count(3, 7), 3);
        assert_eq!(question_count(10, 7), 7);
        assert_eq!(question_count(5, 0), 0);
    }

    mod failing_store {
        use std::sync::atomic::{AtomicBool, Ordering};

        use futures::future::BoxFuture;

        use super::*;
        use crate::{
            config::AppConfig,
            dao::{
                models::{
                    DeckEntity, InvitationEntity, ScoreEntity, StatisticsEntity,
                    StatisticsUpdate, UserEntity,
                },
                quiz_store::memory::MemoryQuizStore,
                storage::{StorageError, StorageResult},
            },
            state::AppState,
        };

        /// Memory store whose next score increment fails when armed.
        #[derive(Default)]
        struct FlakyScores {
            inner: MemoryQuizStore,
            fail_next_increment: AtomicBool,
        }

        impl QuizStore for FlakyScores {
            fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.save_user(user)
            }
            fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
                self.inner.find_user(id)
            }
            fn set_presence(
                &self,
                id: Uuid,
                presence: Presence,
            ) -> BoxFuture<'static, StorageResult<bool>> {
                self.inner.set_presence(id, presence)
            }
            fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.save_deck(deck)
            }
            fn find_deck(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
                self.inner.find_deck(id)
            }
            fn save_invitation(
                &self,
                invitation: InvitationEntity,
            ) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.save_invitation(invitation)
            }
            fn find_invitation(
                &self,
                id: Uuid,
            ) -> BoxFuture<'static, StorageResult<Option<InvitationEntity>>> {
                self.inner.find_invitation(id)
            }
            fn list_invitations_from(
                &self,
                user_id: Uuid,
            ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>> {
                self.inner.list_invitations_from(user_id)
            }
            fn list_invitations_to(
                &self,
                user_id: Uuid,
            ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>> {
                self.inner.list_invitations_to(user_id)
            }
            fn delete_invitation(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
                self.inner.delete_invitation(id)
            }
            fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.save_quiz(quiz)
            }
            fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
                self.inner.find_quiz(id)
            }
            fn delete_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
                self.inner.delete_quiz(id)
            }
            fn increment_score(
                &self,
                quiz_id: Uuid,
                user_id: Uuid,
                total_questions: u32,
            ) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
                if self.fail_next_increment.swap(false, Ordering::SeqCst) {
                    return Box::pin(async {
                        Err(StorageError::unavailable(
                            "score write refused".into(),
                            std::io::Error::other("connection reset"),
                        ))
                    });
                }
                self.inner.increment_score(quiz_id, user_id, total_questions)
            }
            fn list_scores(
                &self,
                quiz_id: Uuid,
            ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
                self.inner.list_scores(quiz_id)
            }
            fn upsert_statistics(
                &self,
                update: StatisticsUpdate,
            ) -> BoxFuture<'static, StorageResult<StatisticsEntity>> {
                self.inner.upsert_statistics(update)
            }
            fn save_statistics(
                &self,
                rows: Vec<StatisticsEntity>,
            ) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.save_statistics(rows)
            }
            fn list_statistics_for_quiz(
                &self,
                quiz_id: Uuid,
            ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>> {
                self.inner.list_statistics_for_quiz(quiz_id)
            }
            fn list_statistics_for_user(
                &self,
                user_id: Uuid,
            ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>> {
                self.inner.list_statistics_for_user(user_id)
            }
            fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.health_check()
            }
            fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
                self.inner.try_reconnect()
            }
        }

        #[tokio::test]
        async fn failed_score_write_keeps_cursor_for_retry() {
            let flaky = Arc::new(FlakyScores::default());
            let store: Arc<dyn QuizStore> = flaky.clone();
            let state = AppState::with_store(AppConfig::default(), store.clone()).await;

            let player = Uuid::new_v4();
            store
                .save_user(UserEntity {
                    id: player,
                    username: "solo".into(),
                    presence: Presence::Online,
                    created_at: SystemTime::now(),
                })
                .await
                .unwrap();
            let deck = DeckEntity {
                id: Uuid::new_v4(),
                title: "capitals".into(),
                flashcards: [("France", "Paris"), ("Germany", "Berlin")]
                    .into_iter()
                    .map(|(country, capital)| FlashcardEntity {
                        id: Uuid::new_v4(),
                        description: format!("Capital of {country}?"),
                        answer: capital.into(),
                        wrong_answers: vec![],
                        image_url: None,
                    })
                    .collect(),
            };
            store.save_deck(deck.clone()).await.unwrap();

            let quiz = start_quiz(
                &state,
                StartQuizRequest {
                    deck_id: deck.id,
                    number_of_questions: None,
                    time_limit_seconds: 0,
                    is_multiple: false,
                },
            )
            .await
            .unwrap();
            let question = current_question(&state, quiz.id, player).await.unwrap();
            let answer = deck
                .flashcards
                .iter()
                .find(|card| card.id == question.id)
                .map(|card| card.answer.clone())
                .unwrap();
            let submission = || AnswerRequest {
                quiz_id: quiz.id,
                flashcard_id: question.id,
                user_id: player,
                answer: Some(answer.clone()),
            };

            flaky.fail_next_increment.store(true, Ordering::SeqCst);
            let err = process_answer(&state, submission()).await.unwrap_err();
            assert!(matches!(err, ServiceError::Unavailable(_)));

            let again = current_question(&state, quiz.id, player).await.unwrap();
            assert_eq!(again.id, question.id, "cursor stays on the failed card");
            {
                let progress = state.progress().lock(quiz.id).await;
                let record = progress.get(player).unwrap();
                assert_eq!(record.total_attempts, 0);
                assert_eq!(record.total_correct, 0);
            }

            let retried = process_answer(&state, submission()).await.unwrap();
            assert!(retried.was_correct);
            assert!(!retried.finished);

            let scores = store.list_scores(quiz.id).await.unwrap();
            assert_eq!(scores.len(), 1);
            assert_eq!(scores[0].correct_questions, 1);
            let stats = store.list_statistics_for_quiz(quiz.id).await.unwrap();
            assert_eq!(stats.len(), 1);
            assert_eq!(stats[0].score, 1);
            assert_eq!(stats[0].number_of_attempts, 1);
        }
    }
}
