//! Process-local storage backend. Rows live in sharded maps; the entry API of
//! [`DashMap`] holds the shard lock while a score or statistics row is updated, which
//! gives the per-row exclusivity the [`QuizStore`] contract asks for.

use std::{future, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        DeckEntity, InvitationEntity, Presence, QuizEntity, ScoreEntity, StatisticsEntity,
        StatisticsUpdate, UserEntity,
    },
    quiz_store::QuizStore,
    storage::StorageResult,
};

type PairKey = (Uuid, Uuid);

/// In-process [`QuizStore`] backed by DashMaps, used in tests and with `QUIZ_STORE=memory`.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<Uuid, UserEntity>,
    decks: DashMap<Uuid, DeckEntity>,
    invitations: DashMap<Uuid, InvitationEntity>,
    quizzes: DashMap<Uuid, QuizEntity>,
    scores: DashMap<PairKey, ScoreEntity>,
    statistics: DashMap<PairKey, StatisticsEntity>,
}

impl MemoryQuizStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn invitations_matching(
        &self,
        predicate: impl Fn(&InvitationEntity) -> bool,
    ) -> Vec<InvitationEntity> {
        let mut invitations: Vec<InvitationEntity> = self
            .inner
            .invitations
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        invitations.sort_by_key(|invitation| invitation.created_at);
        invitations
    }

    fn statistics_matching(
        &self,
        predicate: impl Fn(&StatisticsEntity) -> bool,
    ) -> Vec<StatisticsEntity> {
        let mut rows: Vec<StatisticsEntity> = self
            .inner
            .statistics
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.quiz_date);
        rows
    }
}

fn ready<T: Send + 'static>(value: StorageResult<T>) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(value))
}

impl QuizStore for MemoryQuizStore {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.users.insert(user.id, user);
        ready(Ok(()))
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        ready(Ok(self.inner.users.get(&id).map(|user| user.value().clone())))
    }

    fn set_presence(
        &self,
        id: Uuid,
        presence: Presence,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let updated = match self.inner.users.get_mut(&id) {
            Some(mut user) => {
                user.presence = presence;
                true
            }
            None => false,
        };
        ready(Ok(updated))
    }

    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.decks.insert(deck.id, deck);
        ready(Ok(()))
    }

    fn find_deck(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
        ready(Ok(self.inner.decks.get(&id).map(|deck| deck.value().clone())))
    }

    fn save_invitation(
        &self,
        invitation: InvitationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.invitations.insert(invitation.id, invitation);
        ready(Ok(()))
    }

    fn find_invitation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<InvitationEntity>>> {
        ready(Ok(self.inner.invitations.get(&id).map(|inv| inv.value().clone())))
    }

    fn list_invitations_from(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>> {
        ready(Ok(
            self.invitations_matching(|inv| inv.from_user_id == user_id)
        ))
    }

    fn list_invitations_to(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>> {
        ready(Ok(self.invitations_matching(|inv| inv.to_user_id == user_id)))
    }

    fn delete_invitation(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        ready(Ok(self.inner.invitations.remove(&id).is_some()))
    }

    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.quizzes.insert(quiz.id, quiz);
        ready(Ok(()))
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        ready(Ok(self.inner.quizzes.get(&id).map(|quiz| quiz.value().clone())))
    }

    fn delete_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self.inner.quizzes.remove(&id).is_some();
        self.inner.scores.retain(|(quiz_id, _), _| *quiz_id != id);
        ready(Ok(removed))
    }

    fn increment_score(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        total_questions: u32,
    ) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let mut row = self
            .inner
            .scores
            .entry((quiz_id, user_id))
            .or_insert_with(|| ScoreEntity {
                quiz_id,
                user_id,
                correct_questions: 0,
                total_questions,
            });
        row.correct_questions += 1;
        let snapshot = row.value().clone();
        drop(row);
        ready(Ok(snapshot))
    }

    fn list_scores(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let rows = self
            .inner
            .scores
            .iter()
            .filter(|entry| entry.key().0 == quiz_id)
            .map(|entry| entry.value().clone())
            .collect();
        ready(Ok(rows))
    }

    fn upsert_statistics(
        &self,
        update: StatisticsUpdate,
    ) -> BoxFuture<'static, StorageResult<StatisticsEntity>> {
        let key = (update.quiz_id, update.user_id);
        let snapshot = match self.inner.statistics.entry(key) {
            Entry::Occupied(mut occupied) => {
                update.apply_to(occupied.get_mut());
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(update.into_new_entity()).value().clone(),
        };
        ready(Ok(snapshot))
    }

    fn save_statistics(
        &self,
        rows: Vec<StatisticsEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        for row in rows {
            self.inner
                .statistics
                .insert((row.quiz_id, row.user_id), row);
        }
        ready(Ok(()))
    }

    fn list_statistics_for_quiz(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>> {
        ready(Ok(self.statistics_matching(|row| row.quiz_id == quiz_id)))
    }

    fn list_statistics_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>> {
        ready(Ok(self.statistics_matching(|row| row.user_id == user_id)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(()))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::Outcome;

    fn update(quiz_id: Uuid, user_id: Uuid, score: u32) -> StatisticsUpdate {
        StatisticsUpdate {
            quiz_id,
            user_id,
            score,
            number_of_attempts: score + 1,
            time_taken_secs: 3,
            quiz_date: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn increment_score_creates_then_counts() {
        let store = MemoryQuizStore::new();
        let (quiz_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.increment_score(quiz_id, user_id, 5).await.unwrap();
        assert_eq!(first.correct_questions, 1);
        assert_eq!(first.total_questions, 5);

        let second = store.increment_score(quiz_id, user_id, 99).await.unwrap();
        assert_eq!(second.correct_questions, 2);
        assert_eq!(second.total_questions, 5, "total is only written on creation");
    }

    #[tokio::test]
    async fn upsert_statistics_keeps_outcome() {
        let store = MemoryQuizStore::new();
        let (quiz_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());

        let mut row = store
            .upsert_statistics(update(quiz_id, user_id, 1))
            .await
            .unwrap();
        assert_eq!(row.outcome, Outcome::Undecided);

        row.outcome = Outcome::Winner;
        store.save_statistics(vec![row]).await.unwrap();

        let updated = store
            .upsert_statistics(update(quiz_id, user_id, 4))
            .await
            .unwrap();
        assert_eq!(updated.score, 4);
        assert_eq!(updated.outcome, Outcome::Winner);
        assert_eq!(
            store.list_statistics_for_quiz(quiz_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn delete_quiz_drops_scores() {
        let store = MemoryQuizStore::new();
        let quiz_id = Uuid::new_v4();
        store.increment_score(quiz_id, Uuid::new_v4(), 2).await.unwrap();

        assert!(!store.delete_quiz(quiz_id).await.unwrap());
        assert!(store.list_scores(quiz_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invitations_listed_oldest_first() {
        let store = MemoryQuizStore::new();
        let sender = Uuid::new_v4();
        let base = SystemTime::now();
        for offset in [3u64, 1, 2] {
            store
                .save_invitation(InvitationEntity {
                    id: Uuid::new_v4(),
                    from_user_id: sender,
                    to_user_id: Uuid::new_v4(),
                    deck_ids: vec![Uuid::new_v4()],
                    time_limit_secs: 0,
                    accepted: false,
                    accepted_at: None,
                    quiz_id: None,
                    created_at: base + Duration::from_secs(offset),
                })
                .await
                .unwrap();
        }

        let listed = store.list_invitations_from(sender).await.unwrap();
        let offsets: Vec<u64> = listed
            .iter()
            .map(|inv| inv.created_at.duration_since(base).unwrap().as_secs())
            .collect();
        assert_eq!(offsets, vec![1, 2, 3]);
    }
}
