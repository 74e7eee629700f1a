use mongodb::bson::{self, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{
        BerserkLogEntity, GameStateEntity, McqQuestionEntity, MemberEntity, Round3QuestionEntity,
        RoundScoreEntity, TeamEntity,
    },
    state::game::{Round, RoundStatus},
};

/// Identifier of the single game state document.
pub const GAME_STATE_ID: &str = "singleton";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    /// Lower-cased primary email backing the unique index.
    pub primary_email_key: String,
    team_name: String,
    department: String,
    year: String,
    primary_member: MemberEntity,
    supporting_member: MemberEntity,
    supporting_member_dept: Option<String>,
    supporting_member_year: Option<String>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameStateDocument {
    #[serde(rename = "_id")]
    id: String,
    active_round: Round,
    round_status: RoundStatus,
    current_question: Option<bson::Uuid>,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionBankDocument {
    /// Round number used as primary key.
    #[serde(rename = "_id")]
    pub round: i32,
    pub questions: Vec<McqQuestionEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRound3QuestionDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    sequence_order: u32,
    question_text: String,
    is_active: bool,
    activated_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreDocument {
    round: Round,
    team_id: bson::Uuid,
    score: i32,
    completion_time: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBerserkLogDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    team_id: bson::Uuid,
    question_id: bson::Uuid,
    timestamp: DateTime,
    /// Stored as i64 because BSON has no unsigned integers.
    sequence: i64,
    is_illegal: bool,
}

pub fn to_bson_uuid(id: Uuid) -> bson::Uuid {
    bson::Uuid::from_bytes(id.into_bytes())
}

fn from_bson_uuid(id: bson::Uuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": to_bson_uuid(id)}
}

pub fn score_filter(round: Round, team_id: Uuid) -> Document {
    doc! {"round": i32::from(round.number()), "team_id": to_bson_uuid(team_id)}
}

pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            primary_email_key: email_key(&value.primary_member.email),
            team_name: value.team_name,
            department: value.department,
            year: value.year,
            primary_member: value.primary_member,
            supporting_member: value.supporting_member,
            supporting_member_dept: value.supporting_member_dept,
            supporting_member_year: value.supporting_member_year,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl MongoTeamDocument {
    pub fn team_id(&self) -> Uuid {
        from_bson_uuid(self.id)
    }
}

impl From<MongoTeamDocument> for TeamEntity {
    fn from(value: MongoTeamDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            team_name: value.team_name,
            department: value.department,
            year: value.year,
            primary_member: value.primary_member,
            supporting_member: value.supporting_member,
            supporting_member_dept: value.supporting_member_dept,
            supporting_member_year: value.supporting_member_year,
            created_at: value.created_at.to_system_time(),
        }
    }
}

impl From<GameStateEntity> for MongoGameStateDocument {
    fn from(value: GameStateEntity) -> Self {
        Self {
            id: GAME_STATE_ID.to_owned(),
            active_round: value.active_round,
            round_status: value.round_status,
            current_question: value.current_question.map(to_bson_uuid),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameStateDocument> for GameStateEntity {
    fn from(value: MongoGameStateDocument) -> Self {
        Self {
            active_round: value.active_round,
            round_status: value.round_status,
            current_question: value.current_question.map(from_bson_uuid),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

impl From<Round3QuestionEntity> for MongoRound3QuestionDocument {
    fn from(value: Round3QuestionEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            sequence_order: value.sequence_order,
            question_text: value.question_text,
            is_active: value.is_active,
            activated_at: value.activated_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoRound3QuestionDocument> for Round3QuestionEntity {
    fn from(value: MongoRound3QuestionDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            sequence_order: value.sequence_order,
            question_text: value.question_text,
            is_active: value.is_active,
            activated_at: value.activated_at.map(|at| at.to_system_time()),
        }
    }
}

impl From<RoundScoreEntity> for MongoScoreDocument {
    fn from(value: RoundScoreEntity) -> Self {
        Self {
            round: value.round,
            team_id: to_bson_uuid(value.team_id),
            score: value.score,
            completion_time: value.completion_time.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoScoreDocument> for RoundScoreEntity {
    fn from(value: MongoScoreDocument) -> Self {
        Self {
            round: value.round,
            team_id: from_bson_uuid(value.team_id),
            score: value.score,
            completion_time: value.completion_time.map(|at| at.to_system_time()),
        }
    }
}

impl From<BerserkLogEntity> for MongoBerserkLogDocument {
    fn from(value: BerserkLogEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            team_id: to_bson_uuid(value.team_id),
            question_id: to_bson_uuid(value.question_id),
            timestamp: DateTime::from_system_time(value.timestamp),
            sequence: i64::try_from(value.sequence).unwrap_or(i64::MAX),
            is_illegal: value.is_illegal,
        }
    }
}

impl From<MongoBerserkLogDocument> for BerserkLogEntity {
    fn from(value: MongoBerserkLogDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            team_id: from_bson_uuid(value.team_id),
            question_id: from_bson_uuid(value.question_id),
            timestamp: value.timestamp.to_system_time(),
            sequence: u64::try_from(value.sequence).unwrap_or_default(),
            is_illegal: value.is_illegal,
        }
    }
}
