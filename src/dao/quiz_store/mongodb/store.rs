use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, doc},
    options::{IndexOptions, ReturnDocument},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        DECK_COLLECTION, INVITATION_COLLECTION, MongoDeckDocument, MongoInvitationDocument,
        MongoQuizDocument, MongoScoreDocument, MongoStatisticsDocument, MongoUserDocument,
        QUIZ_COLLECTION, SCORE_COLLECTION, STATISTICS_COLLECTION, USER_COLLECTION, doc_id,
        pair_filter,
    },
};
use crate::dao::{
    models::{
        DeckEntity, InvitationEntity, Outcome, Presence, QuizEntity, ScoreEntity,
        StatisticsEntity, StatisticsUpdate, UserEntity,
    },
    quiz_store::QuizStore,
    storage::StorageResult,
};

/// MongoDB backed [`QuizStore`]. Score and statistics upserts rely on
/// `findOneAndUpdate` against a unique `(quiz_id, user_id)` index.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        for collection in [SCORE_COLLECTION, STATISTICS_COLLECTION] {
            let index = IndexModel::builder()
                .keys(doc! {"quiz_id": 1, "user_id": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_pair_idx")))
                        .unique(Some(true))
                        .build(),
                )
                .build();
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: "quiz_id,user_id",
                    source,
                })?;
        }

        let statistics_by_user = IndexModel::builder()
            .keys(doc! {"user_id": 1, "quiz_date": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("statistics_user_idx".to_owned()))
                    .build(),
            )
            .build();
        database
            .collection::<mongodb::bson::Document>(STATISTICS_COLLECTION)
            .create_index(statistics_by_user)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: STATISTICS_COLLECTION,
                index: "user_id,quiz_date",
                source,
            })?;

        for field in ["from_user_id", "to_user_id"] {
            let index = IndexModel::builder()
                .keys(doc! {field: 1, "created_at": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("invitation_{field}_idx")))
                        .build(),
                )
                .build();
            database
                .collection::<mongodb::bson::Document>(INVITATION_COLLECTION)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: INVITATION_COLLECTION,
                    index: field,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn replace_by_id<T>(&self, name: &'static str, id: Uuid, document: T) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        self.collection::<T>(name)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: name,
                key: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn find_by_id<T>(&self, name: &'static str, id: Uuid) -> MongoResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        self.collection::<T>(name)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: name,
                key: id.to_string(),
                source,
            })
    }

    async fn delete_by_id(&self, name: &'static str, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection::<mongodb::bson::Document>(name)
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: name,
                key: id.to_string(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn save_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id;
        self.replace_by_id(USER_COLLECTION, id, MongoUserDocument::from(user))
            .await
    }

    async fn find_user(&self, id: Uuid) -> MongoResult<Option<UserEntity>> {
        self.find_by_id::<MongoUserDocument>(USER_COLLECTION, id)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn set_presence(&self, id: Uuid, presence: Presence) -> MongoResult<bool> {
        let result = self
            .collection::<MongoUserDocument>(USER_COLLECTION)
            .await
            .update_one(doc_id(id), doc! {"$set": {"presence": presence.as_str()}})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: USER_COLLECTION,
                key: id.to_string(),
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn save_deck(&self, deck: DeckEntity) -> MongoResult<()> {
        let id = deck.id;
        self.replace_by_id(DECK_COLLECTION, id, MongoDeckDocument::from(deck))
            .await
    }

    async fn find_deck(&self, id: Uuid) -> MongoResult<Option<DeckEntity>> {
        self.find_by_id::<MongoDeckDocument>(DECK_COLLECTION, id)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn save_invitation(&self, invitation: InvitationEntity) -> MongoResult<()> {
        let id = invitation.id;
        self.replace_by_id(
            INVITATION_COLLECTION,
            id,
            MongoInvitationDocument::from(invitation),
        )
        .await
    }

    async fn find_invitation(&self, id: Uuid) -> MongoResult<Option<InvitationEntity>> {
        self.find_by_id::<MongoInvitationDocument>(INVITATION_COLLECTION, id)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_invitations_by(
        &self,
        field: &'static str,
        user_id: Uuid,
    ) -> MongoResult<Vec<InvitationEntity>> {
        let key = format!("{field}={user_id}");
        let documents: Vec<MongoInvitationDocument> = self
            .collection::<MongoInvitationDocument>(INVITATION_COLLECTION)
            .await
            .find(doc! {field: user_id.to_string()})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: INVITATION_COLLECTION,
                key: key.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: INVITATION_COLLECTION,
                key,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn save_quiz(&self, quiz: QuizEntity) -> MongoResult<()> {
        let id = quiz.id;
        self.replace_by_id(QUIZ_COLLECTION, id, MongoQuizDocument::from(quiz))
            .await
    }

    async fn find_quiz(&self, id: Uuid) -> MongoResult<Option<QuizEntity>> {
        self.find_by_id::<MongoQuizDocument>(QUIZ_COLLECTION, id)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn delete_quiz(&self, id: Uuid) -> MongoResult<bool> {
        let removed = self.delete_by_id(QUIZ_COLLECTION, id).await?;
        self.collection::<MongoScoreDocument>(SCORE_COLLECTION)
            .await
            .delete_many(doc! {"quiz_id": id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: SCORE_COLLECTION,
                key: id.to_string(),
                source,
            })?;
        Ok(removed)
    }

    async fn increment_score(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        total_questions: u32,
    ) -> MongoResult<ScoreEntity> {
        let key = format!("{quiz_id}/{user_id}");
        let document = self
            .collection::<MongoScoreDocument>(SCORE_COLLECTION)
            .await
            .find_one_and_update(
                pair_filter(quiz_id, user_id),
                doc! {
                    "$inc": {"correct_questions": 1_i64},
                    "$setOnInsert": {"total_questions": i64::from(total_questions)},
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: SCORE_COLLECTION,
                key: key.clone(),
                source,
            })?
            .ok_or(MongoDaoError::MissingUpsertResult {
                collection: SCORE_COLLECTION,
                key,
            })?;

        document.try_into()
    }

    async fn list_scores(&self, quiz_id: Uuid) -> MongoResult<Vec<ScoreEntity>> {
        let documents: Vec<MongoScoreDocument> = self
            .collection::<MongoScoreDocument>(SCORE_COLLECTION)
            .await
            .find(doc! {"quiz_id": quiz_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SCORE_COLLECTION,
                key: quiz_id.to_string(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SCORE_COLLECTION,
                key: quiz_id.to_string(),
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert_statistics(&self, update: StatisticsUpdate) -> MongoResult<StatisticsEntity> {
        let key = format!("{}/{}", update.quiz_id, update.user_id);
        let time_taken = i64::try_from(update.time_taken_secs).unwrap_or(i64::MAX);
        let document = self
            .collection::<MongoStatisticsDocument>(STATISTICS_COLLECTION)
            .await
            .find_one_and_update(
                pair_filter(update.quiz_id, update.user_id),
                doc! {
                    "$set": {
                        "score": i64::from(update.score),
                        "number_of_attempts": i64::from(update.number_of_attempts),
                        "time_taken_secs": time_taken,
                        "quiz_date": DateTime::from_system_time(update.quiz_date),
                    },
                    "$setOnInsert": {"outcome": Outcome::Undecided.as_str()},
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: STATISTICS_COLLECTION,
                key: key.clone(),
                source,
            })?
            .ok_or(MongoDaoError::MissingUpsertResult {
                collection: STATISTICS_COLLECTION,
                key,
            })?;

        document.try_into()
    }

    async fn save_statistics(&self, rows: Vec<StatisticsEntity>) -> MongoResult<()> {
        let collection = self
            .collection::<MongoStatisticsDocument>(STATISTICS_COLLECTION)
            .await;
        for row in rows {
            let (quiz_id, user_id) = (row.quiz_id, row.user_id);
            collection
                .replace_one(
                    pair_filter(quiz_id, user_id),
                    &MongoStatisticsDocument::from(row),
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Write {
                    collection: STATISTICS_COLLECTION,
                    key: format!("{quiz_id}/{user_id}"),
                    source,
                })?;
        }
        Ok(())
    }

    async fn list_statistics_by(
        &self,
        field: &'static str,
        id: Uuid,
    ) -> MongoResult<Vec<StatisticsEntity>> {
        let key = format!("{field}={id}");
        let documents: Vec<MongoStatisticsDocument> = self
            .collection::<MongoStatisticsDocument>(STATISTICS_COLLECTION)
            .await
            .find(doc! {field: id.to_string()})
            .sort(doc! {"quiz_date": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STATISTICS_COLLECTION,
                key: key.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STATISTICS_COLLECTION,
                key,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }
}

impl QuizStore for MongoQuizStore {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_user(user).await.map_err(Into::into) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn set_presence(
        &self,
        id: Uuid,
        presence: Presence,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_presence(id, presence).await.map_err(Into::into) })
    }

    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_deck(deck).await.map_err(Into::into) })
    }

    fn find_deck(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_deck(id).await.map_err(Into::into) })
    }

    fn save_invitation(
        &self,
        invitation: InvitationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_invitation(invitation).await.map_err(Into::into) })
    }

    fn find_invitation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<InvitationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_invitation(id).await.map_err(Into::into) })
    }

    fn list_invitations_from(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_invitations_by("from_user_id", user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_invitations_to(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<InvitationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_invitations_by("to_user_id", user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_invitation(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by_id(INVITATION_COLLECTION, id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_quiz(quiz).await.map_err(Into::into) })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn delete_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_quiz(id).await.map_err(Into::into) })
    }

    fn increment_score(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        total_questions: u32,
    ) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment_score(quiz_id, user_id, total_questions)
                .await
                .map_err(Into::into)
        })
    }

    fn list_scores(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_scores(quiz_id).await.map_err(Into::into) })
    }

    fn upsert_statistics(
        &self,
        update: StatisticsUpdate,
    ) -> BoxFuture<'static, StorageResult<StatisticsEntity>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_statistics(update).await.map_err(Into::into) })
    }

    fn save_statistics(
        &self,
        rows: Vec<StatisticsEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_statistics(rows).await.map_err(Into::into) })
    }

    fn list_statistics_for_quiz(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_statistics_by("quiz_id", quiz_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_statistics_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatisticsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_statistics_by("user_id", user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
