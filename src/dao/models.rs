use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::game::{Round, RoundStatus};

/// Contact details of a team member as stored by the registration service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEntity {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Registered team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen for the team.
    pub team_name: String,
    pub department: String,
    pub year: String,
    /// Member whose email is used for OTP login.
    pub primary_member: MemberEntity,
    pub supporting_member: MemberEntity,
    pub supporting_member_dept: Option<String>,
    pub supporting_member_year: Option<String>,
    /// Registration timestamp.
    pub created_at: SystemTime,
}

/// Singleton game state record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStateEntity {
    pub active_round: Round,
    pub round_status: RoundStatus,
    /// Round-3 question currently selected by the instructor.
    pub current_question: Option<Uuid>,
    /// Last time the record was written.
    pub updated_at: SystemTime,
}

/// Multiple-choice question of a round-1/round-2 question bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McqQuestionEntity {
    /// 1-based identifier derived from the source row.
    pub id: u32,
    pub text: String,
    pub options: [String; 4],
    /// Index of the correct option (`0..=3`).
    pub correct: u8,
}

/// Buzzer round question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Round3QuestionEntity {
    pub id: Uuid,
    pub sequence_order: u32,
    pub question_text: String,
    pub is_active: bool,
    pub activated_at: Option<SystemTime>,
}

/// Score row of one team for one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundScoreEntity {
    pub round: Round,
    pub team_id: Uuid,
    pub score: i32,
    pub completion_time: Option<SystemTime>,
}

/// Append-only record of a buzzer press.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BerserkLogEntity {
    pub id: Uuid,
    pub team_id: Uuid,
    pub question_id: Uuid,
    /// Server time at which the hit was stamped.
    pub timestamp: SystemTime,
    /// Global arrival order; breaks timestamp ties.
    pub sequence: u64,
    pub is_illegal: bool,
}
