use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{
    McqQuestionEntity, MemberEntity, Round3QuestionEntity, RoundScoreEntity, TeamEntity,
};

/// One of the three competition rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Round {
    /// Timed multiple-choice quiz open to every registered team.
    One,
    /// Timed multiple-choice quiz for the best teams of round one.
    Two,
    /// Physical buzzer ("Berserk") round for the finalists.
    Three,
}

/// Error raised when a round number outside `1..=3` is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid round number {0} (expected 1, 2 or 3)")]
pub struct InvalidRound(pub u8);

impl Round {
    /// All rounds in play order.
    pub const ALL: [Round; 3] = [Round::One, Round::Two, Round::Three];

    /// 1-based round number.
    pub fn number(self) -> u8 {
        match self {
            Round::One => 1,
            Round::Two => 2,
            Round::Three => 3,
        }
    }

    /// Round that follows this one, if any.
    pub fn next(self) -> Option<Round> {
        match self {
            Round::One => Some(Round::Two),
            Round::Two => Some(Round::Three),
            Round::Three => None,
        }
    }

    /// Round whose ranking decides who may play this one.
    pub fn previous(self) -> Option<Round> {
        match self {
            Round::One => None,
            Round::Two => Some(Round::One),
            Round::Three => Some(Round::Two),
        }
    }

    /// Zero-based slot used by per-round tables.
    pub(crate) fn index(self) -> usize {
        usize::from(self.number() - 1)
    }
}

impl TryFrom<u8> for Round {
    type Error = InvalidRound;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Round::One),
            2 => Ok(Round::Two),
            3 => Ok(Round::Three),
            other => Err(InvalidRound(other)),
        }
    }
}

impl From<Round> for u8 {
    fn from(value: Round) -> Self {
        value.number()
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}", self.number())
    }
}

/// Progress of the active round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    /// Teams wait in the lobby.
    Waiting,
    /// The round is being played.
    Ongoing,
    /// The round is over.
    Done,
}

/// Contact details of one team member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Team record provided by the registration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen by the team.
    pub name: String,
    pub department: String,
    pub year: String,
    /// Member allowed to log in with an OTP.
    pub primary: Member,
    pub supporting: Member,
    pub supporting_department: Option<String>,
    pub supporting_year: Option<String>,
    pub created_at: SystemTime,
}

impl Team {
    /// Whether `email` designates the primary member (case-insensitive).
    pub fn is_primary_email(&self, email: &str) -> bool {
        self.primary.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

/// Multiple-choice question of round one or two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqQuestion {
    /// 1-based identifier derived from the source row.
    pub id: u32,
    pub text: String,
    pub options: [String; 4],
    /// Index of the correct option (`0..=3`).
    pub correct: usize,
}

/// Question used by the buzzer round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round3Question {
    pub id: Uuid,
    /// Position in the instructor's running order.
    pub sequence_order: u32,
    pub text: String,
    /// Unlocked by the instructor; hits are only legal while set.
    pub is_active: bool,
    /// When the question was last unlocked.
    pub activated_at: Option<SystemTime>,
}

impl Round3Question {
    /// Build a fresh, locked question.
    pub fn new(sequence_order: u32, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence_order,
            text,
            is_active: false,
            activated_at: None,
        }
    }
}

/// Score row of a team for a given round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundScore {
    pub team_id: Uuid,
    pub score: i32,
    /// Submission time; unset for rows created by the instructor or penalties.
    pub completed_at: Option<SystemTime>,
}

impl RoundScore {
    /// Empty score row for `team_id`.
    pub fn empty(team_id: Uuid) -> Self {
        Self {
            team_id,
            score: 0,
            completed_at: None,
        }
    }
}

impl From<MemberEntity> for Member {
    fn from(value: MemberEntity) -> Self {
        Self {
            name: value.name,
            email: value.email,
            phone: value.phone,
        }
    }
}

impl From<Member> for MemberEntity {
    fn from(value: Member) -> Self {
        Self {
            name: value.name,
            email: value.email,
            phone: value.phone,
        }
    }
}

impl From<TeamEntity> for Team {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.team_name,
            department: value.department,
            year: value.year,
            primary: value.primary_member.into(),
            supporting: value.supporting_member.into(),
            supporting_department: value.supporting_member_dept,
            supporting_year: value.supporting_member_year,
            created_at: value.created_at,
        }
    }
}

impl From<Team> for TeamEntity {
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
            created_at: value.created_at,
        }
    }
}

impl From<McqQuestionEntity> for McqQuestion {
    fn from(value: McqQuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct: usize::from(value.correct),
        }
    }
}

impl From<McqQuestion> for McqQuestionEntity {
    fn from(value: McqQuestion) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct: u8::try_from(value.correct).unwrap_or(0),
        }
    }
}

impl From<Round3QuestionEntity> for Round3Question {
    fn from(value: Round3QuestionEntity) -> Self {
        Self {
            id: value.id,
            sequence_order: value.sequence_order,
            text: value.question_text,
            is_active: value.is_active,
            activated_at: value.activated_at,
        }
    }
}

impl From<Round3Question> for Round3QuestionEntity {
    fn from(value: Round3Question) -> Self {
        Self {
            id: value.id,
            sequence_order: value.sequence_order,
            question_text: value.text,
            is_active: value.is_active,
            activated_at: value.activated_at,
        }
    }
}

impl From<RoundScoreEntity> for RoundScore {
    fn from(value: RoundScoreEntity) -> Self {
        Self {
            team_id: value.team_id,
            score: value.score,
            completed_at: value.completion_time,
        }
    }
}

impl From<(Round, RoundScore)> for RoundScoreEntity {
    fn from((round, value): (Round, RoundScore)) -> Self {
        Self {
            round,
            team_id: value.team_id,
            score: value.score,
            completion_time: value.completed_at,
        }
    }
}
