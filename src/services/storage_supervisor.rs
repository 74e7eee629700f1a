use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{quiz_store::QuizStore, storage::StorageError},
    services::sse_events::broadcast_system_status,
    state::{
        SharedState,
        berserk::BerserkLog,
        game::{McqQuestion, Round, Round3Question, RoundScore, Team},
        state_machine::GamePhase,
    },
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
///
/// Each successful connection reloads the in-memory competition state from the store.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuizStore>, StorageError>> + Send,
{
    tokio::spawn(announce_degraded_changes(state.clone()));
    let mut delay = INITIAL_DELAY;

    loop {
        let connected = match connect().await {
            Ok(store) => match hydrate(&state, store.as_ref()).await {
                Ok(()) => Some(store),
                Err(err) => {
                    warn!(error = %err, "failed to load competition state from storage");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                None
            }
        };

        let Some(store) = connected else {
            sleep(delay).await;
            delay = (delay * 2).min(MAX_DELAY);
            continue;
        };

        state.set_quiz_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        loop {
            match store.health_check().await {
                Ok(()) => {
                    if state.is_degraded() {
                        info!("storage healthy again; leaving degraded mode");
                        state.update_degraded(false);
                    }
                    sleep(HEALTH_POLL_INTERVAL).await;
                }
                Err(_) => {
                    // Same handle: writes were refused while degraded, so memory needs no reload.
                    if reconnect(&state, store.as_ref()).await {
                        state.update_degraded(false);
                        sleep(HEALTH_POLL_INTERVAL).await;
                        continue;
                    }
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    break;
                }
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Retry the existing connection a few times, entering degraded mode on the first failure.
async fn reconnect(state: &SharedState, store: &dyn QuizStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering in degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

/// Forward degraded mode changes to both SSE streams.
async fn announce_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        broadcast_system_status(&state, degraded);
    }
}

/// Replace the in-memory competition state with the content of `store`.
pub async fn hydrate(state: &SharedState, store: &dyn QuizStore) -> Result<(), StorageError> {
    let teams = store.list_teams().await?;
    let game_state = store.load_game_state().await?;
    let round3_questions = store.list_round3_questions().await?;
    let logs = store.list_berserk_logs().await?;
    let mut banks = Vec::with_capacity(2);
    for round in [Round::One, Round::Two] {
        banks.push((round, store.load_question_bank(round).await?));
    }
    let mut scores = Vec::with_capacity(Round::ALL.len());
    for round in Round::ALL {
        scores.push((round, store.list_scores(round).await?));
    }

    state.teams().clear();
    for team in teams.into_iter().map(Team::from) {
        state.teams().insert(team.id, team);
    }

    let (phase, current) = game_state.map_or((GamePhase::default(), None), |saved| {
        (
            GamePhase::new(saved.active_round, saved.round_status),
            saved.current_question,
        )
    });
    state.restore_phase(phase).await;
    state.round3().write().await.restore(
        round3_questions
            .into_iter()
            .map(Round3Question::from)
            .collect(),
        current,
    );

    for (round, questions) in banks {
        state.set_question_bank(round, questions.into_iter().map(McqQuestion::from).collect());
    }
    for (round, rows) in scores {
        state
            .scores()
            .restore(round, rows.into_iter().map(RoundScore::from).collect());
    }
    state
        .ledger()
        .restore(logs.into_iter().map(BerserkLog::from).collect());

    info!(
        teams = state.teams().len(),
        phase = %phase,
        "competition state loaded from storage"
    );
    Ok(())
}
