use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::quiz::BerserkResponse;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from buzzer WebSocket clients.
#[serde(tag = "type")]
pub enum BuzzerInboundMessage {
    /// First frame: bind the socket to a logged-in team.
    #[serde(rename = "identification")]
    Identification { token: String },
    #[serde(rename = "buzz")]
    Buzz,
    #[serde(other)]
    Unknown,
}

impl BuzzerInboundMessage {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Acknowledgement sent to a buzzer after successful identification.
pub struct BuzzerAck {
    pub team_id: Uuid,
    pub team_name: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Messages pushed to buzzer clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuzzerOutboundMessage {
    Ack(BuzzerAck),
    /// Result of the last buzz.
    Feedback(BerserkResponse),
    /// Error that did not close the socket.
    Error { message: String },
    /// Selected question was unlocked or locked.
    Question { is_unlocked: bool },
}
