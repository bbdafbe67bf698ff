use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use flashquiz_back::{
    config::AppConfig,
    dao::{
        models::{
            DeckEntity, FlashcardEntity, Outcome, Presence, QuizStatus, UserEntity,
        },
        quiz_store::{QuizStore, memory::MemoryQuizStore},
    },
    dto::{
        invitation::CreateInvitationRequest,
        quiz::{AnswerRequest, AnswerResponse, StartQuizRequest},
        statistics::StatisticsView,
    },
    error::ServiceError,
    services::{invitation_service, quiz_service, score_ledger, sse_service, statistics_service},
    state::{AppState, SharedState},
};
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

struct Duel {
    quiz_id: Uuid,
    alice: Uuid,
    bob: Uuid,
    deck: DeckEntity,
}

struct Harness {
    state: SharedState,
    store: Arc<dyn QuizStore>,
}

impl Harness {
    async fn new() -> Self {
        let store: Arc<dyn QuizStore> = Arc::new(MemoryQuizStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        Self { state, store }
    }

    async fn user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .save_user(UserEntity {
                id,
                username: name.into(),
                presence: Presence::Online,
                created_at: SystemTime::now(),
            })
            .await
            .unwrap();
        id
    }

    async fn capitals_deck(&self) -> DeckEntity {
        let card = |country: &str, capital: &str, wrong: &str| FlashcardEntity {
            id: Uuid::new_v4(),
            description: format!("Capital of {country}?"),
            answer: capital.into(),
            wrong_answers: vec![wrong.into()],
            image_url: None,
        };
        let deck = DeckEntity {
            id: Uuid::new_v4(),
            title: "capitals".into(),
            flashcards: vec![
                card("France", "Paris", "London"),
                card("Germany", "Berlin", "Vienna"),
            ],
        };
        self.store.save_deck(deck.clone()).await.unwrap();
        deck
    }

    /// Two online players with a confirmed invitation over the capitals deck.
    async fn duel(&self, time_limit_seconds: u32) -> Duel {
        let alice = self.user("alice").await;
        let bob = self.user("bob").await;
        let deck = self.capitals_deck().await;
        let quiz = invitation_service::create_invitation_with_quiz(
            &self.state,
            CreateInvitationRequest {
                from_user_id: alice,
                to_user_id: bob,
                deck_ids: vec![deck.id],
                time_limit_seconds,
            },
        )
        .await
        .unwrap();
        invitation_service::confirm(&self.state, quiz.invitation_id.unwrap())
            .await
            .unwrap();
        Duel {
            quiz_id: quiz.id,
            alice,
            bob,
            deck,
        }
    }

    /// Answer the caller's current card, correctly or not.
    async fn play(&self, duel: &Duel, user_id: Uuid, correct: bool) -> AnswerResponse {
        let question = quiz_service::current_question(&self.state, duel.quiz_id, user_id)
            .await
            .unwrap();
        let answer = if correct {
            answer_for(&duel.deck, question.id)
        } else {
            "Atlantis".into()
        };
        quiz_service::process_answer(
            &self.state,
            submit(duel.quiz_id, question.id, user_id, &answer),
        )
        .await
        .unwrap()
    }

    async fn rewind(&self, quiz_id: Uuid, by: Duration) {
        let mut stored = self.store.find_quiz(quiz_id).await.unwrap().unwrap();
        stored.start_time -= by;
        self.store.save_quiz(stored).await.unwrap();
    }

    async fn stats_of(&self, quiz_id: Uuid, user_id: Uuid) -> StatisticsView {
        statistics_service::statistics_for_quiz(&self.state, quiz_id)
            .await
            .unwrap()
            .into_iter()
            .find(|row| row.user_id == user_id)
            .unwrap()
    }

    async fn presence(&self, user_id: Uuid) -> Presence {
        self.store.find_user(user_id).await.unwrap().unwrap().presence
    }
}

fn answer_for(deck: &DeckEntity, card_id: Uuid) -> String {
    deck.flashcards
        .iter()
        .find(|card| card.id == card_id)
        .map(|card| card.answer.clone())
        .unwrap()
}

fn submit(quiz_id: Uuid, flashcard_id: Uuid, user_id: Uuid, answer: &str) -> AnswerRequest {
    AnswerRequest {
        quiz_id,
        flashcard_id,
        user_id,
        answer: Some(answer.into()),
    }
}

#[tokio::test]
async fn solo_quiz_retries_wrong_answers_and_completes() {
    let h = Harness::new().await;
    let player = h.user("solo").await;
    let deck = h.capitals_deck().await;

    let quiz = quiz_service::start_quiz(
        &h.state,
        StartQuizRequest {
            deck_id: deck.id,
            number_of_questions: Some(2),
            time_limit_seconds: 0,
            is_multiple: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(quiz.status, QuizStatus::InProgress);
    assert_eq!(quiz.total_questions, 2);

    let first = quiz_service::current_question(&h.state, quiz.id, player)
        .await
        .unwrap();
    assert_eq!(first.choices.len(), 2);

    let wrong = quiz_service::process_answer(&h.state, submit(quiz.id, first.id, player, "Rome"))
        .await
        .unwrap();
    assert!(!wrong.was_correct);
    assert!(!wrong.finished);
    assert_eq!(wrong.next_question.as_ref().map(|q| q.id), Some(first.id));
    assert_eq!(h.presence(player).await, Presence::Playing);

    let right = quiz_service::process_answer(
        &h.state,
        submit(quiz.id, first.id, player, &answer_for(&deck, first.id).to_uppercase()),
    )
    .await
    .unwrap();
    assert!(right.was_correct);
    let second = right.next_question.unwrap();
    assert_ne!(second.id, first.id);

    let last = quiz_service::process_answer(
        &h.state,
        submit(quiz.id, second.id, player, &answer_for(&deck, second.id)),
    )
    .await
    .unwrap();
    assert!(last.was_correct);
    assert!(last.finished);
    assert!(last.next_question.is_none());

    let status = quiz_service::quiz_status(&h.state, quiz.id).await.unwrap();
    assert_eq!(status.status, QuizStatus::Completed);
    assert!(status.end_time.is_some());
    assert_eq!(h.presence(player).await, Presence::Online);

    let stats = statistics_service::statistics_for_quiz(&h.state, quiz.id)
        .await
        .unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].score, 2);
    assert_eq!(stats[0].number_of_attempts, 3);
    assert_eq!(stats[0].outcome, Outcome::Undecided);

    let scores = score_ledger::scores_for_quiz(&h.state, quiz.id).await.unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].correct_questions, 2);
    assert_eq!(scores[0].total_questions, 2);

    let err = quiz_service::current_question(&h.state, quiz.id, player)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn answer_for_another_card_is_rejected() {
    let h = Harness::new().await;
    let player = h.user("solo").await;
    let deck = h.capitals_deck().await;
    let quiz = quiz_service::start_quiz(
        &h.state,
        StartQuizRequest {
            deck_id: deck.id,
            number_of_questions: None,
            time_limit_seconds: 0,
            is_multiple: false,
        },
    )
    .await
    .unwrap();

    let current = quiz_service::current_question(&h.state, quiz.id, player)
        .await
        .unwrap();
    let other = deck
        .flashcards
        .iter()
        .find(|card| card.id != current.id)
        .unwrap();

    let err = quiz_service::process_answer(&h.state, submit(quiz.id, other.id, player, "Paris"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn multiplayer_quiz_completes_when_time_runs_out() {
    let h = Harness::new().await;
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    let deck = h.capitals_deck().await;

    let quiz = invitation_service::create_invitation_with_quiz(
        &h.state,
        CreateInvitationRequest {
            from_user_id: alice,
            to_user_id: bob,
            deck_ids: vec![deck.id],
            time_limit_seconds: 5,
        },
    )
    .await
    .unwrap();
    invitation_service::confirm(&h.state, quiz.invitation_id.unwrap())
        .await
        .unwrap();

    let (mut events, handshake) = sse_service::subscribe_quiz(&h.state, quiz.id).await.unwrap();
    assert_eq!(handshake.event.as_deref(), Some("handshake"));

    let question = quiz_service::current_question(&h.state, quiz.id, alice)
        .await
        .unwrap();
    let first = quiz_service::process_answer(
        &h.state,
        submit(quiz.id, question.id, alice, &answer_for(&deck, question.id)),
    )
    .await
    .unwrap();
    assert!(first.was_correct);
    assert!(!first.finished);
    let progress = events.try_recv().unwrap();
    assert_eq!(progress.event.as_deref(), Some("quiz.progress"));

    let mut stored = h.store.find_quiz(quiz.id).await.unwrap().unwrap();
    stored.start_time -= Duration::from_secs(6);
    h.store.save_quiz(stored).await.unwrap();

    let late = quiz_service::process_answer(
        &h.state,
        submit(quiz.id, question.id, bob, "Madrid"),
    )
    .await
    .unwrap();
    assert!(!late.was_correct);
    assert!(late.finished);

    let finished = events.try_recv().unwrap();
    assert_eq!(finished.event.as_deref(), Some("quiz.finished"));
    assert!(finished.data.contains("\"updateType\":\"finished\""));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Closed)));

    let status = quiz_service::quiz_status(&h.state, quiz.id).await.unwrap();
    assert_eq!(status.status, QuizStatus::Completed);

    let stats = statistics_service::statistics_for_quiz(&h.state, quiz.id)
        .await
        .unwrap();
    assert_eq!(stats.len(), 2);
    let alice_row = stats.iter().find(|row| row.user_id == alice).unwrap();
    assert_eq!(alice_row.score, 1);
    assert_eq!(alice_row.number_of_attempts, 1);
    let bob_row = stats.iter().find(|row| row.user_id == bob).unwrap();
    assert_eq!(bob_row.score, 0);
    assert_eq!(bob_row.number_of_attempts, 1);

    assert_eq!(h.presence(alice).await, Presence::Online);
    assert_eq!(h.presence(bob).await, Presence::Online);

    let err = quiz_service::current_question(&h.state, quiz.id, alice)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let outcome = statistics_service::set_winner(&h.state, quiz.id, Some(alice))
        .await
        .unwrap();
    assert!(outcome
        .iter()
        .all(|row| (row.user_id == alice) == (row.outcome == Outcome::Winner)));
}

#[tokio::test]
async fn cancelling_twice_keeps_first_end_time() {
    let h = Harness::new().await;
    let deck = h.capitals_deck().await;
    let quiz = quiz_service::start_quiz(
        &h.state,
        StartQuizRequest {
            deck_id: deck.id,
            number_of_questions: None,
            time_limit_seconds: 0,
            is_multiple: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(quiz.status, QuizStatus::Waiting);

    let unchanged = quiz_service::start_multiplayer_if_ready(&h.state, quiz.id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, QuizStatus::Waiting, "one deck is not enough");

    let cancelled = quiz_service::cancel_quiz(&h.state, quiz.id).await.unwrap();
    assert_eq!(cancelled.status, QuizStatus::Completed);
    let again = quiz_service::cancel_quiz(&h.state, quiz.id).await.unwrap();
    assert_eq!(again.end_time, cancelled.end_time);
}

#[tokio::test]
async fn earliest_accepted_invitation_wins() {
    let h = Harness::new().await;
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    let carol = h.user("carol").await;
    let deck = h.capitals_deck().await;

    let mut quizzes = Vec::new();
    for receiver in [bob, carol] {
        quizzes.push(
            invitation_service::create_invitation_with_quiz(
                &h.state,
                CreateInvitationRequest {
                    from_user_id: alice,
                    to_user_id: receiver,
                    deck_ids: vec![deck.id],
                    time_limit_seconds: 0,
                },
            )
            .await
            .unwrap(),
        );
    }
    let bob_invitation = quizzes[0].invitation_id.unwrap();
    let carol_invitation = quizzes[1].invitation_id.unwrap();
    invitation_service::confirm(&h.state, bob_invitation).await.unwrap();
    invitation_service::confirm(&h.state, carol_invitation).await.unwrap();

    let mut later = h.store.find_invitation(carol_invitation).await.unwrap().unwrap();
    later.accepted_at = later.accepted_at.map(|at| at + Duration::from_secs(1));
    h.store.save_invitation(later).await.unwrap();

    let earliest = invitation_service::find_earliest_accepted_for_sender(&h.state, alice)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(earliest.id, bob_invitation);

    assert!(h.store.find_invitation(carol_invitation).await.unwrap().is_none());
    assert!(h.store.find_quiz(quizzes[1].id).await.unwrap().is_none());
    assert!(h.store.find_quiz(quizzes[0].id).await.unwrap().is_some());
    assert_eq!(h.presence(carol).await, Presence::Online);

    let sent = invitation_service::invitations_from(&h.state, alice)
        .await
        .unwrap();
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn silent_player_is_finalized_at_last_progress_on_timeout() {
    let h = Harness::new().await;
    let duel = h.duel(5).await;

    quiz_service::current_question(&h.state, duel.quiz_id, duel.bob)
        .await
        .unwrap();
    assert!(!h.play(&duel, duel.alice, true).await.finished);

    h.rewind(duel.quiz_id, Duration::from_secs(6)).await;
    let late = h.play(&duel, duel.alice, false).await;
    assert!(!late.was_correct);
    assert!(late.finished);

    let status = quiz_service::quiz_status(&h.state, duel.quiz_id).await.unwrap();
    assert_eq!(status.status, QuizStatus::Completed);

    let alice = h.stats_of(duel.quiz_id, duel.alice).await;
    assert_eq!((alice.score, alice.number_of_attempts), (1, 2));
    let bob = h.stats_of(duel.quiz_id, duel.bob).await;
    assert_eq!((bob.score, bob.number_of_attempts), (0, 0));

    assert_eq!(h.presence(duel.alice).await, Presence::Online);
    assert_eq!(h.presence(duel.bob).await, Presence::Online);

    let err = quiz_service::current_question(&h.state, duel.quiz_id, duel.bob)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn duel_completes_once_both_players_finish() {
    let h = Harness::new().await;
    let duel = h.duel(0).await;

    assert!(!h.play(&duel, duel.alice, true).await.finished);
    let alice_done = h.play(&duel, duel.alice, true).await;
    assert!(alice_done.finished);
    assert!(alice_done.next_question.is_none());

    let running = quiz_service::quiz_status(&h.state, duel.quiz_id).await.unwrap();
    assert_eq!(running.status, QuizStatus::InProgress, "bob is still playing");
    assert_eq!(h.presence(duel.alice).await, Presence::Playing);
    let err = quiz_service::current_question(&h.state, duel.quiz_id, duel.alice)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyFinished(_)));

    assert!(!h.play(&duel, duel.bob, false).await.finished);
    assert!(!h.play(&duel, duel.bob, true).await.finished);
    assert!(h.play(&duel, duel.bob, true).await.finished);

    let status = quiz_service::quiz_status(&h.state, duel.quiz_id).await.unwrap();
    assert_eq!(status.status, QuizStatus::Completed);

    let alice = h.stats_of(duel.quiz_id, duel.alice).await;
    assert_eq!((alice.score, alice.number_of_attempts), (2, 2));
    let bob = h.stats_of(duel.quiz_id, duel.bob).await;
    assert_eq!((bob.score, bob.number_of_attempts), (2, 3));

    assert_eq!(h.presence(duel.alice).await, Presence::Online);
    assert_eq!(h.presence(duel.bob).await, Presence::Online);
}

#[tokio::test]
async fn cancelling_a_running_duel_finalizes_everyone() {
    let h = Harness::new().await;
    let duel = h.duel(0).await;
    let (mut events, _) = sse_service::subscribe_quiz(&h.state, duel.quiz_id)
        .await
        .unwrap();

    quiz_service::current_question(&h.state, duel.quiz_id, duel.bob)
        .await
        .unwrap();
    h.play(&duel, duel.alice, true).await;
    assert_eq!(
        events.try_recv().unwrap().event.as_deref(),
        Some("quiz.progress")
    );

    let cancelled = quiz_service::cancel_quiz(&h.state, duel.quiz_id).await.unwrap();
    assert_eq!(cancelled.status, QuizStatus::Completed);
    assert!(cancelled.end_time.is_some());

    let alice = h.stats_of(duel.quiz_id, duel.alice).await;
    assert_eq!((alice.score, alice.number_of_attempts), (1, 1));
    let bob = h.stats_of(duel.quiz_id, duel.bob).await;
    assert_eq!((bob.score, bob.number_of_attempts), (0, 0));

    assert_eq!(h.presence(duel.alice).await, Presence::Online);
    assert_eq!(h.presence(duel.bob).await, Presence::Online);

    assert_eq!(
        events.try_recv().unwrap().event.as_deref(),
        Some("quiz.finished")
    );
    assert!(matches!(events.try_recv(), Err(TryRecvError::Closed)));
    let err = sse_service::subscribe_quiz(&h.state, duel.quiz_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}
