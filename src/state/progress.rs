//! In-memory per-player progress through a quiz.
//!
//! Records are grouped per quiz behind a single async mutex: whoever holds the guard of a
//! quiz may read and write the records of every participant, which is what end-of-quiz
//! detection and forced finalization need.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Runtime cursor of a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    /// 0-based pointer into the quiz question sequence.
    pub current_index: usize,
    /// Correct answers so far.
    pub total_correct: u32,
    /// Answered submissions so far.
    pub total_attempts: u32,
    /// Once set, never cleared.
    pub finished: bool,
    /// Anchor for elapsed-time statistics.
    pub started_at: SystemTime,
}

impl ProgressRecord {
    fn new(started_at: SystemTime) -> Self {
        Self {
            current_index: 0,
            total_correct: 0,
            total_attempts: 0,
            finished: false,
            started_at,
        }
    }

    /// Whole seconds elapsed since the record was created.
    pub fn elapsed_secs(&self, now: SystemTime) -> u64 {
        let elapsed = now
            .duration_since(self.started_at)
            .unwrap_or(Duration::ZERO);
        (elapsed.as_millis() / 1000) as u64
    }
}

/// Records of every player of a single quiz, in first-access order.
#[derive(Debug, Default)]
pub struct QuizProgress {
    records: IndexMap<Uuid, ProgressRecord>,
}

impl QuizProgress {
    /// Record of `user_id`, created on first access.
    pub fn record_mut(&mut self, user_id: Uuid, now: SystemTime) -> &mut ProgressRecord {
        self.records
            .entry(user_id)
            .or_insert_with(|| ProgressRecord::new(now))
    }

    /// Record of `user_id`, if the player touched the quiz.
    pub fn get(&self, user_id: Uuid) -> Option<&ProgressRecord> {
        self.records.get(&user_id)
    }

    /// Records in first-access order.
    pub fn iter(&self) -> impl Iterator<Item = (Uuid, &ProgressRecord)> {
        self.records.iter().map(|(user_id, record)| (*user_id, record))
    }

    /// Mutable records in first-access order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Uuid, &mut ProgressRecord)> {
        self.records
            .iter_mut()
            .map(|(user_id, record)| (*user_id, record))
    }

    /// Number of players who touched the quiz.
    pub fn player_count(&self) -> usize {
        self.records.len()
    }

    /// Multiplayer: at least two records, all finished. Solo: exactly one finished record.
    pub fn all_finished(&self, is_multiple: bool) -> bool {
        let every_finished = self.records.values().all(|record| record.finished);
        if is_multiple {
            self.records.len() >= 2 && every_finished
        } else {
            self.records.len() == 1 && every_finished
        }
    }
}

/// Process-wide progress table keyed by quiz, one lock per quiz.
#[derive(Default)]
pub struct ProgressStore {
    quizzes: DashMap<Uuid, Arc<Mutex<QuizProgress>>>,
}

impl ProgressStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to every record of `quiz_id`.
    pub async fn lock(&self, quiz_id: Uuid) -> OwnedMutexGuard<QuizProgress> {
        let slot = self
            .quizzes
            .entry(quiz_id)
            .or_insert_with(|| Arc::new(Mutex::new(QuizProgress::default())))
            .value()
            .clone();
        slot.lock_owned().await
    }

    /// Drop every record of a deleted quiz.
    pub fn evict(&self, quiz_id: Uuid) {
        self.quizzes.remove(&quiz_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_truncated_to_seconds() {
        let start = SystemTime::now();
        let record = ProgressRecord::new(start);
        assert_eq!(record.elapsed_secs(start + Duration::from_millis(1_999)), 1);
        assert_eq!(record.elapsed_secs(start - Duration::from_secs(3)), 0);
    }

    #[test]
    fn solo_and_multiplayer_completion_rules() {
        let now = SystemTime::now();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut progress = QuizProgress::default();
        assert!(!progress.all_finished(false));

        progress.record_mut(alice, now).finished = true;
        assert!(progress.all_finished(false));
        assert!(!progress.all_finished(true), "one player cannot end a duel");

        progress.record_mut(bob, now);
        assert!(!progress.all_finished(true));
        assert!(!progress.all_finished(false), "solo requires exactly one record");

        progress.record_mut(bob, now).finished = true;
        assert!(progress.all_finished(true));
    }

    #[test]
    fn records_are_created_once() {
        let now = SystemTime::now();
        let user = Uuid::new_v4();
        let mut progress = QuizProgress::default();
        progress.record_mut(user, now).total_attempts = 3;
        let later = now + Duration::from_secs(10);
        let record = progress.record_mut(user, later);
        assert_eq!(record.total_attempts, 3);
        assert_eq!(record.started_at, now);
        assert_eq!(progress.player_count(), 1);
    }

    #[tokio::test]
    async fn lock_is_shared_per_quiz_and_evict_resets() {
        let store = ProgressStore::new();
        let (quiz_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());

        {
            let mut guard = store.lock(quiz_id).await;
            guard.record_mut(user_id, SystemTime::now()).total_correct = 2;
        }
        let guard = store.lock(quiz_id).await;
        assert_eq!(guard.get(user_id).map(|r| r.total_correct), Some(2));
        drop(guard);

        store.evict(quiz_id);
        assert!(store.lock(quiz_id).await.get(user_id).is_none());
    }

    #[tokio::test]
    async fn concurrent_writers_are_serialized() {
        let store = Arc::new(ProgressStore::new());
        let quiz_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = store.lock(quiz_id).await;
                let record = guard.record_mut(user_id, SystemTime::now());
                let seen = record.total_attempts;
                tokio::task::yield_now().await;
                record.total_attempts = seen + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let guard = store.lock(quiz_id).await;
        assert_eq!(guard.get(user_id).unwrap().total_attempts, 16);
    }
}
