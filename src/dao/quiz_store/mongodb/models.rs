//! BSON documents persisted by [`super::MongoQuizStore`]. Identifiers are stored as
//! their hyphenated string form; timestamps use BSON dates.

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    DeckEntity, FlashcardEntity, InvitationEntity, Outcome, Presence, QuizEntity, QuizStatus,
    ScoreEntity, StatisticsEntity, UserEntity,
};

pub const USER_COLLECTION: &str = "users";
pub const DECK_COLLECTION: &str = "decks";
pub const INVITATION_COLLECTION: &str = "invitations";
pub const QUIZ_COLLECTION: &str = "quizzes";
pub const SCORE_COLLECTION: &str = "scores";
pub const STATISTICS_COLLECTION: &str = "statistics";

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn pair_filter(quiz_id: Uuid, user_id: Uuid) -> Document {
    doc! {"quiz_id": quiz_id.to_string(), "user_id": user_id.to_string()}
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| MongoDaoError::InvalidDocId {
        collection,
        value: value.to_owned(),
    })
}

fn parse_ids(collection: &'static str, values: &[String]) -> MongoResult<Vec<Uuid>> {
    values
        .iter()
        .map(|value| parse_id(collection, value))
        .collect()
}

fn to_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

fn counter<T: TryFrom<i64>>(
    collection: &'static str,
    field: &'static str,
    value: i64,
) -> MongoResult<T> {
    T::try_from(value).map_err(|_| MongoDaoError::InvalidCounter { collection, field })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    presence: Presence,
    created_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id.to_string(),
            username: value.username,
            presence: value.presence,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoUserDocument> for UserEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoUserDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(USER_COLLECTION, &value.id)?,
            username: value.username,
            presence: value.presence,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFlashcardDocument {
    id: String,
    description: String,
    answer: String,
    #[serde(default)]
    wrong_answers: Vec<String>,
    image_url: Option<String>,
}

impl From<FlashcardEntity> for MongoFlashcardDocument {
    fn from(value: FlashcardEntity) -> Self {
        Self {
            id: value.id.to_string(),
            description: value.description,
            answer: value.answer,
            wrong_answers: value.wrong_answers,
            image_url: value.image_url,
        }
    }
}

impl MongoFlashcardDocument {
    fn into_entity(self, collection: &'static str) -> MongoResult<FlashcardEntity> {
        Ok(FlashcardEntity {
            id: parse_id(collection, &self.id)?,
            description: self.description,
            answer: self.answer,
            wrong_answers: self.wrong_answers,
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDeckDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    flashcards: Vec<MongoFlashcardDocument>,
}

impl From<DeckEntity> for MongoDeckDocument {
    fn from(value: DeckEntity) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title,
            flashcards: value.flashcards.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<MongoDeckDocument> for DeckEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoDeckDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(DECK_COLLECTION, &value.id)?,
            title: value.title,
            flashcards: value
                .flashcards
                .into_iter()
                .map(|card| card.into_entity(DECK_COLLECTION))
                .collect::<MongoResult<_>>()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoInvitationDocument {
    #[serde(rename = "_id")]
    id: String,
    from_user_id: String,
    to_user_id: String,
    deck_ids: Vec<String>,
    time_limit_secs: i64,
    accepted: bool,
    accepted_at: Option<DateTime>,
    quiz_id: Option<String>,
    created_at: DateTime,
}

impl From<InvitationEntity> for MongoInvitationDocument {
    fn from(value: InvitationEntity) -> Self {
        Self {
            id: value.id.to_string(),
            from_user_id: value.from_user_id.to_string(),
            to_user_id: value.to_user_id.to_string(),
            deck_ids: to_strings(&value.deck_ids),
            time_limit_secs: i64::from(value.time_limit_secs),
            accepted: value.accepted,
            accepted_at: value.accepted_at.map(DateTime::from_system_time),
            quiz_id: value.quiz_id.map(|id| id.to_string()),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoInvitationDocument> for InvitationEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoInvitationDocument) -> MongoResult<Self> {
        const C: &str = INVITATION_COLLECTION;
        Ok(Self {
            id: parse_id(C, &value.id)?,
            from_user_id: parse_id(C, &value.from_user_id)?,
            to_user_id: parse_id(C, &value.to_user_id)?,
            deck_ids: parse_ids(C, &value.deck_ids)?,
            time_limit_secs: counter(C, "time_limit_secs", value.time_limit_secs)?,
            accepted: value.accepted,
            accepted_at: value.accepted_at.map(DateTime::to_system_time),
            quiz_id: value.quiz_id.as_deref().map(|id| parse_id(C, id)).transpose()?,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: String,
    deck_ids: Vec<String>,
    selected_flashcards: Vec<MongoFlashcardDocument>,
    status: QuizStatus,
    start_time: DateTime,
    end_time: Option<DateTime>,
    time_limit_secs: i64,
    is_multiple: bool,
    invitation_id: Option<String>,
    #[serde(default)]
    players: Vec<String>,
}

impl From<QuizEntity> for MongoQuizDocument {
    fn from(value: QuizEntity) -> Self {
        Self {
            id: value.id.to_string(),
            deck_ids: to_strings(&value.deck_ids),
            selected_flashcards: value
                .selected_flashcards
                .into_iter()
                .map(Into::into)
                .collect(),
            status: value.status,
            start_time: DateTime::from_system_time(value.start_time),
            end_time: value.end_time.map(DateTime::from_system_time),
            time_limit_secs: i64::from(value.time_limit_secs),
            is_multiple: value.is_multiple,
            invitation_id: value.invitation_id.map(|id| id.to_string()),
            players: to_strings(&value.players),
        }
    }
}

impl TryFrom<MongoQuizDocument> for QuizEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuizDocument) -> MongoResult<Self> {
        const C: &str = QUIZ_COLLECTION;
        Ok(Self {
            id: parse_id(C, &value.id)?,
            deck_ids: parse_ids(C, &value.deck_ids)?,
            selected_flashcards: value
                .selected_flashcards
                .into_iter()
                .map(|card| card.into_entity(C))
                .collect::<MongoResult<_>>()?,
            status: value.status,
            start_time: value.start_time.to_system_time(),
            end_time: value.end_time.map(DateTime::to_system_time),
            time_limit_secs: counter(C, "time_limit_secs", value.time_limit_secs)?,
            is_multiple: value.is_multiple,
            invitation_id: value
                .invitation_id
                .as_deref()
                .map(|id| parse_id(C, id))
                .transpose()?,
            players: parse_ids(C, &value.players)?,
        })
    }
}

/// Score row; `_id` is left to the server and ignored on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreDocument {
    quiz_id: String,
    user_id: String,
    correct_questions: i64,
    total_questions: i64,
}

impl TryFrom<MongoScoreDocument> for ScoreEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoScoreDocument) -> MongoResult<Self> {
        const C: &str = SCORE_COLLECTION;
        Ok(Self {
            quiz_id: parse_id(C, &value.quiz_id)?,
            user_id: parse_id(C, &value.user_id)?,
            correct_questions: counter(C, "correct_questions", value.correct_questions)?,
            total_questions: counter(C, "total_questions", value.total_questions)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatisticsDocument {
    quiz_id: String,
    user_id: String,
    score: i64,
    number_of_attempts: i64,
    time_taken_secs: i64,
    quiz_date: DateTime,
    #[serde(default)]
    outcome: Outcome,
}

impl From<StatisticsEntity> for MongoStatisticsDocument {
    fn from(value: StatisticsEntity) -> Self {
        Self {
            quiz_id: value.quiz_id.to_string(),
            user_id: value.user_id.to_string(),
            score: i64::from(value.score),
            number_of_attempts: i64::from(value.number_of_attempts),
            time_taken_secs: i64::try_from(value.time_taken_secs).unwrap_or(i64::MAX),
            quiz_date: DateTime::from_system_time(value.quiz_date),
            outcome: value.outcome,
        }
    }
}

impl TryFrom<MongoStatisticsDocument> for StatisticsEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoStatisticsDocument) -> MongoResult<Self> {
        const C: &str = STATISTICS_COLLECTION;
        Ok(Self {
            quiz_id: parse_id(C, &value.quiz_id)?,
            user_id: parse_id(C, &value.user_id)?,
            score: counter(C, "score", value.score)?,
            number_of_attempts: counter(C, "number_of_attempts", value.number_of_attempts)?,
            time_taken_secs: counter(C, "time_taken_secs", value.time_taken_secs)?,
            quiz_date: value.quiz_date.to_system_time(),
            outcome: value.outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn quiz_document_keeps_card_order() {
        let cards: Vec<FlashcardEntity> = ["a", "b", "c"]
            .into_iter()
            .map(|answer| FlashcardEntity {
                id: Uuid::new_v4(),
                description: format!("q-{answer}"),
                answer: answer.to_owned(),
                wrong_answers: vec![],
                image_url: None,
            })
            .collect();
        let quiz = QuizEntity {
            id: Uuid::new_v4(),
            deck_ids: vec![Uuid::new_v4()],
            selected_flashcards: cards.clone(),
            status: QuizStatus::InProgress,
            start_time: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            end_time: None,
            time_limit_secs: 30,
            is_multiple: false,
            invitation_id: None,
            players: vec![Uuid::new_v4()],
        };

        let restored = QuizEntity::try_from(MongoQuizDocument::from(quiz.clone())).unwrap();
        assert_eq!(restored, quiz);
    }

    #[test]
    fn malformed_identifier_is_reported() {
        let document = MongoScoreDocument {
            quiz_id: "not-a-uuid".to_owned(),
            user_id: Uuid::new_v4().to_string(),
            correct_questions: 1,
            total_questions: 2,
        };

        let err = ScoreEntity::try_from(document).unwrap_err();
        assert!(matches!(
            err,
            MongoDaoError::InvalidDocId { collection: SCORE_COLLECTION, .. }
        ));
    }

    #[test]
    fn negative_counter_is_rejected() {
        let document = MongoScoreDocument {
            quiz_id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            correct_questions: -1,
            total_questions: 2,
        };

        assert!(matches!(
            ScoreEntity::try_from(document),
            Err(MongoDaoError::InvalidCounter { field: "correct_questions", .. })
        ));
    }
}
