use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::admin::Round3QuestionSummary,
    state::game::RoundStatus,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already serialised payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Token handed to the single admin SSE subscriber.
pub struct AdminHandshake {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the round or its status changes.
pub struct PhaseChangedEvent {
    pub active_round: u8,
    pub round_status: RoundStatus,
    pub current_question: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Admin feed of every buzzer press.
pub struct BerserkHitEvent {
    pub question_id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub sequence: u64,
    pub illegal: bool,
    pub illegal_count: u32,
    pub penalty: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// A legal hit landed on the selected question.
pub struct LeaderboardUpdatedEvent {
    pub question_id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    /// 1-based arrival position.
    pub position: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// A team's score changed outside of a submission.
pub struct ScoreUpdatedEvent {
    pub round: u8,
    pub team_id: Uuid,
    pub team_name: String,
    pub score: i32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Buzzer-round question state changed (selection, unlock or lock).
pub struct QuestionChangedEvent {
    pub question: Option<Round3QuestionSummary>,
    pub is_unlocked: bool,
}
