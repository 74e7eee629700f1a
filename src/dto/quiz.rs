use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::{berserk::HitOutcome, game::McqQuestion};

/// Multiple-choice question as shown to teams (no answer key).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
}

impl From<McqQuestion> for QuizQuestion {
    fn from(value: McqQuestion) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options.into(),
        }
    }
}

/// Questions of the active multiple-choice round.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestionsResponse {
    pub round: u8,
    pub questions: Vec<QuizQuestion>,
}

/// One answer of a round submission.
#[serde_as]
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmittedAnswer {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[schema(value_type = u32)]
    pub question_id: u32,
    /// Zero-based option index; numeric strings are accepted, anything else is ignored.
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub selected_option: Option<i64>,
}

/// Answers of a team for round one or two.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitRoundRequest {
    #[validate(range(min = 1, max = 2))]
    pub round: u8,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Result of a round submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRoundResponse {
    pub success: bool,
    pub qualified: bool,
    pub score: i32,
}

/// Classification returned to a team after a buzzer hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BerserkStatus {
    Logged,
    Illegal,
}

/// Reply to a buzzer hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BerserkResponse {
    pub status: BerserkStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub illegal_count: Option<u32>,
}

impl BerserkResponse {
    /// Build the reply for a recorded hit; `penalty_points` is quoted in penalty messages.
    pub fn from_outcome(outcome: &HitOutcome, penalty_points: i32) -> Self {
        match outcome {
            HitOutcome::AlreadyLogged => Self {
                status: BerserkStatus::Logged,
                message: "Already logged!".into(),
                illegal_count: None,
            },
            HitOutcome::Logged(_) => Self {
                status: BerserkStatus::Logged,
                message: "Berserk Recorded!".into(),
                illegal_count: None,
            },
            HitOutcome::Illegal {
                illegal_count,
                penalty: true,
                ..
            } => Self {
                status: BerserkStatus::Illegal,
                message: format!(
                    "PENALTY! {illegal_count} Illegal Hits. -{penalty_points} Points."
                ),
                illegal_count: Some(*illegal_count),
            },
            HitOutcome::Illegal { illegal_count, .. } => Self {
                status: BerserkStatus::Illegal,
                message: "Illegal Hit (False Start)!".into(),
                illegal_count: Some(*illegal_count),
            },
        }
    }
}
