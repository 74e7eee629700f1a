use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        admin::Round3QuestionSummary,
        sse::{
            BerserkHitEvent, LeaderboardUpdatedEvent, PhaseChangedEvent, QuestionChangedEvent,
            ScoreUpdatedEvent, ServerEvent, SystemStatus,
        },
    },
    state::{
        SharedState,
        game::{Round, Round3Question, RoundScore},
        state_machine::GamePhase,
    },
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_SYSTEM_STATUS: &str = "system_status";
const EVENT_BERSERK_HIT: &str = "berserk.hit";
const EVENT_LEADERBOARD_UPDATED: &str = "leaderboard.updated";
const EVENT_SCORE_UPDATED: &str = "score.updated";
const EVENT_QUESTION_CHANGED: &str = "question.changed";

/// Broadcast a round/status change on both streams.
pub async fn broadcast_phase_changed(state: &SharedState, phase: &GamePhase) {
    let current_question = state.round3().read().await.current_id();
    let payload = PhaseChangedEvent {
        active_round: phase.round.number(),
        round_status: phase.status,
        current_question,
    };
    send_public_event(state, EVENT_PHASE_CHANGED, &payload);
    send_admin_event(state, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast the degraded flag on both streams.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Report a buzzer press to the instructor.
pub fn broadcast_berserk_hit(state: &SharedState, payload: &BerserkHitEvent) {
    send_admin_event(state, EVENT_BERSERK_HIT, payload);
}

/// Announce a new legal hit on the public leaderboard.
pub fn broadcast_leaderboard_updated(state: &SharedState, payload: &LeaderboardUpdatedEvent) {
    send_public_event(state, EVENT_LEADERBOARD_UPDATED, payload);
}

/// Announce a score change (penalty or manual adjustment).
pub fn broadcast_score_updated(state: &SharedState, round: Round, score: &RoundScore) {
    let payload = ScoreUpdatedEvent {
        round: round.number(),
        team_id: score.team_id,
        team_name: state.team_name(score.team_id).unwrap_or_default(),
        score: score.score,
    };
    send_public_event(state, EVENT_SCORE_UPDATED, &payload);
    send_admin_event(state, EVENT_SCORE_UPDATED, &payload);
}

/// Announce the selected buzzer question and whether it is unlocked.
pub fn broadcast_question_changed(state: &SharedState, question: Option<&Round3Question>) {
    let payload = QuestionChangedEvent {
        is_unlocked: question.is_some_and(|question| question.is_active),
        question: question.cloned().map(Round3QuestionSummary::from),
    };
    send_public_event(state, EVENT_QUESTION_CHANGED, &payload);
    send_admin_event(state, EVENT_QUESTION_CHANGED, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
