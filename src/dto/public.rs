use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use utoipa::ToSchema;

use crate::{dto::format_clock, state::game::RoundStatus};

/// Empty query type that rejects unexpected query parameters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoQuery {}

/// Round progress as seen by one team (or an anonymous visitor).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameStatusResponse {
    pub active_round: u8,
    pub round_status: RoundStatus,
    /// Whether the team already submitted the active round.
    pub is_submitted: bool,
    /// Whether the team may play the active round.
    pub is_qualified: bool,
    /// Rank in the round deciding qualification.
    pub rank: Option<usize>,
    /// Score in the round deciding qualification.
    pub last_score: i32,
    /// Maximum score of the active question bank.
    pub total_score: i32,
    pub team_name: String,
}

/// Score column of the leaderboard: points, or a label in the buzzer round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ScoreCell {
    Points(i32),
    Label(String),
}

/// One leaderboard line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub team_name: String,
    pub score: ScoreCell,
    /// Completion or hit time as `HH:MM:SS.mmm`, `N/A` when unknown.
    pub timestamp: String,
}

impl LeaderboardEntry {
    pub fn new(
        rank: usize,
        team_name: String,
        score: ScoreCell,
        at: Option<SystemTime>,
        offset: UtcOffset,
    ) -> Self {
        Self {
            rank,
            team_name,
            score,
            timestamp: at.map_or_else(|| "N/A".to_owned(), |at| format_clock(at, offset)),
        }
    }
}

/// Leaderboard of the active round.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardResponse {
    pub active_round: u8,
    pub round_status: RoundStatus,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub active_question_text: Option<String>,
    pub active_question_number: Option<u32>,
    pub is_unlocked: bool,
}
