use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_clock, format_system_time},
    state::{
        berserk::BerserkLog,
        game::{Member, Round3Question, RoundStatus, Team},
        state_machine::GamePhase,
    },
};

/// Generic acknowledgement for admin actions.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Instructor "game state form": force a round and status.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GameStateRequest {
    #[validate(range(min = 1, max = 3))]
    pub active_round: u8,
    pub round_status: RoundStatus,
}

/// Current game state.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameStateResponse {
    pub active_round: u8,
    pub round_status: RoundStatus,
    /// Selected buzzer-round question.
    pub current_question: Option<Uuid>,
    /// Number of transitions applied since startup.
    pub version: usize,
}

impl GameStateResponse {
    pub fn new(phase: GamePhase, current_question: Option<Uuid>, version: usize) -> Self {
        Self {
            active_round: phase.round.number(),
            round_status: phase.status,
            current_question,
            version,
        }
    }
}

/// New buzzer-round question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRound3QuestionRequest {
    #[validate(length(min = 1))]
    pub text: String,
    /// Position in the running order; appended at the end when omitted.
    pub sequence_order: Option<u32>,
}

/// Buzzer-round question as shown to the instructor.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Round3QuestionSummary {
    pub id: Uuid,
    pub sequence_order: u32,
    pub text: String,
    pub is_active: bool,
    /// RFC 3339 activation time.
    pub activated_at: Option<String>,
}

impl From<Round3Question> for Round3QuestionSummary {
    fn from(value: Round3Question) -> Self {
        Self {
            id: value.id,
            sequence_order: value.sequence_order,
            text: value.text,
            is_active: value.is_active,
            activated_at: value.activated_at.map(format_system_time),
        }
    }
}

/// Manual Round-3 score change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScoreAdjustmentRequest {
    pub team_id: Uuid,
    /// Signed number of points to add.
    pub points: i32,
}

/// Round-3 score of a team.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamScore {
    pub team_id: Uuid,
    pub team_name: String,
    pub score: i32,
}

/// Short team reference.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamBrief {
    pub team_id: Uuid,
    pub team_name: String,
    /// Rank in round two.
    pub rank: usize,
}

/// Everything the instructor panel shows.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub game: GameStateResponse,
    /// Buzzer-round questions in running order.
    pub questions: Vec<Round3QuestionSummary>,
    /// Round-3 scores of the finalists, best first.
    pub scores: Vec<TeamScore>,
    pub active_question: Option<Round3QuestionSummary>,
    pub qualified_teams: Vec<TeamBrief>,
}

/// One buzzer press as shown to the instructor.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HitLogEntry {
    pub sequence: u64,
    pub team_id: Uuid,
    pub team_name: String,
    pub illegal: bool,
    /// `HH:MM:SS.mmm` in the display offset.
    pub timestamp: String,
}

impl HitLogEntry {
    pub fn new(log: &BerserkLog, team_name: String, offset: UtcOffset) -> Self {
        Self {
            sequence: log.seq,
            team_id: log.team_id,
            team_name,
            illegal: log.illegal,
            timestamp: format_clock(log.at, offset),
        }
    }
}

/// Full hit log of the selected question.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HitLogResponse {
    pub question: Option<Round3QuestionSummary>,
    pub hits: Vec<HitLogEntry>,
}

/// Raw sheet rows: `[question, option1, option2, option3, option4, correct]`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionBankImportRequest {
    #[validate(length(min = 1))]
    pub rows: Vec<Vec<String>>,
}

/// Outcome of a question-bank import.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionBankImportResponse {
    pub round: u8,
    pub imported: usize,
}

/// Contact details of a team member.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct MemberInput {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
}

impl From<MemberInput> for Member {
    fn from(value: MemberInput) -> Self {
        Self {
            name: value.name.trim().to_owned(),
            email: value.email.trim().to_owned(),
            phone: value.phone,
        }
    }
}

impl From<Member> for MemberInput {
    fn from(value: Member) -> Self {
        Self {
            name: value.name,
            email: value.email,
            phone: value.phone,
        }
    }
}

/// Team record as provided by the registration service.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    #[validate(length(min = 1))]
    pub team_name: String,
    pub department: String,
    pub year: String,
    #[validate(nested)]
    pub primary_member: MemberInput,
    #[validate(nested)]
    pub supporting_member: MemberInput,
    pub supporting_member_dept: Option<String>,
    pub supporting_member_year: Option<String>,
}

impl TeamInput {
    /// Build a new team record stamped now.
    pub fn into_team(self) -> Team {
        Team {
            id: Uuid::new_v4(),
            name: self.team_name.trim().to_owned(),
            department: self.department,
            year: self.year,
            primary: self.primary_member.into(),
            supporting: self.supporting_member.into(),
            supporting_department: self.supporting_member_dept,
            supporting_year: self.supporting_member_year,
            created_at: SystemTime::now(),
        }
    }
}

/// Batch of team records to import.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamImportRequest {
    #[validate(length(min = 1), nested)]
    pub teams: Vec<TeamInput>,
}

/// Team record returned to the instructor.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub team_name: String,
    pub department: String,
    pub year: String,
    pub primary_member: MemberInput,
    pub supporting_member: MemberInput,
    pub supporting_member_dept: Option<String>,
    pub supporting_member_year: Option<String>,
    pub created_at: String,
}

impl From<Team> for TeamSummary {
    fn from(value: Team) -> Self {
        Self {
            id: value.id,
            team_name: value.name,
            department: value.department,
            year: value.year,
            primary_member: value.primary.into(),
            supporting_member: value.supporting.into(),
            supporting_member_dept: value.supporting_department,
            supporting_member_year: value.supporting_year,
            created_at: format_system_time(value.created_at),
        }
    }
}
