use std::time::SystemTime;

use crate::{
    dao::models::GameStateEntity,
    error::ServiceError,
    services::sse_events::broadcast_phase_changed,
    state::{
        Plan, SharedState,
        game::Round,
        state_machine::{GameEvent, GamePhase},
    },
};

/// Execute a planned state-machine transition, then broadcast the resulting phase change.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    event: GameEvent,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(Plan) -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (res, next) = state.run_transition(event, work).await?;
    broadcast_phase_changed(state, &next).await;
    Ok(res)
}

/// Persist the singleton game state record for `phase` and the current selection.
///
/// Outside round three no selection is stored.
pub async fn persist_game_state(state: &SharedState, phase: GamePhase) -> Result<(), ServiceError> {
    let store = state.require_quiz_store().await?;
    let current_question = if phase.round == Round::Three {
        state.round3().read().await.current_id()
    } else {
        None
    };
    store
        .save_game_state(GameStateEntity {
            active_round: phase.round,
            round_status: phase.status,
            current_question,
            updated_at: SystemTime::now(),
        })
        .await?;
    Ok(())
}
