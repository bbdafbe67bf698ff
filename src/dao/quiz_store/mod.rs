/// DashMap backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    DeckEntity, InvitationEntity, Presence, QuizEntity, ScoreEntity, StatisticsEntity,
    StatisticsUpdate, UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for users, decks, invitations, quizzes, scores
/// and statistics.
///
/// `increment_score` and `upsert_statistics` must be atomic per `(quiz_id, user_id)`:
/// two concurrent callers for the same pair observe each other's writes and never create
/// duplicate rows.
pub trait QuizStore: Send + Sync {
    /// Insert or replace a user.
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a user by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Update the presence of a user, returning `false` when the user does not exist.
    fn set_presence(&self, id: Uuid, presence: Presence)
    -> BoxFuture<'static, StorageResult<bool>>;

    /// Insert or replace a deck with its flashcards.
    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a deck by id.
    fn find_deck(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>>;

    /// Insert or replace an invitation.
    fn save_invitation(&self, invitation: InvitationEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch an invitation by id.
    fn find_invitation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<InvitationEntity>>>;
    /// Invitations sent by `user_id`, oldest first.
    fn list_invitations_from(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>>;
    /// Invitations received by `user_id`, oldest first.
    fn list_invitations_to(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>>;
    /// Delete an invitation, returning `false` when it was absent.
    fn delete_invitation(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Insert or replace a quiz.
    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a quiz by id.
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Delete a quiz together with its score rows.
    fn delete_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Add one correct answer to the score row, creating it with `total_questions` if absent.
    fn increment_score(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        total_questions: u32,
    ) -> BoxFuture<'static, StorageResult<ScoreEntity>>;
    /// Score rows of a quiz.
    fn list_scores(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;

    /// Create or update the statistics row of the pair under a per-row lock.
    fn upsert_statistics(
        &self,
        update: StatisticsUpdate,
    ) -> BoxFuture<'static, StorageResult<StatisticsEntity>>;
    /// Replace statistics rows as they are (used to persist outcomes).
    fn save_statistics(
        &self,
        rows: Vec<StatisticsEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Statistics rows of a quiz.
    fn list_statistics_for_quiz(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>>;
    /// Statistics rows of a player across quizzes.
    fn list_statistics_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>>;

    /// Cheap liveness check of the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
