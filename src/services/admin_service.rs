//! Business logic powering the instructor routes. These helpers coordinate
//! storage persistence, in-memory state updates and state-machine transitions
//! while honouring the single-transition-at-a-time requirement.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{RoundScoreEntity, Round3QuestionEntity, TeamEntity},
    dto::{
        admin::{
            DashboardResponse, GameStateRequest, GameStateResponse, HitLogEntry, HitLogResponse,
            Round3QuestionSummary, ScoreAdjustmentRequest, TeamBrief, TeamInput, TeamScore,
            TeamSummary,
        },
        ws::BuzzerOutboundMessage,
    },
    error::ServiceError,
    services::{sse_events, websocket_service::notify_buzzers},
    state::{
        SharedState,
        game::{Round, Round3Question},
        ranking::{qualified_teams, rank_scores},
        state_machine::{GameEvent, GamePhase},
        transitions::{persist_game_state, run_transition_with_broadcast},
    },
};

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

/// Current round, status and selection.
pub async fn game_state(state: &SharedState) -> GameStateResponse {
    let snapshot = state.snapshot().await;
    let current = state.round3().read().await.current_id();
    GameStateResponse::new(snapshot.phase, current, snapshot.version)
}

/// Everything the instructor panel shows.
///
/// Finalists of round two get an empty round-three score row on first view.
pub async fn dashboard(state: &SharedState) -> DashboardResponse {
    let cutoff = state.config().scoring.round2_cutoff;
    let ranked = rank_scores(state.scores().all(Round::Two));
    let finalists = qualified_teams(&ranked, cutoff);

    let created: Vec<_> = ranked
        .iter()
        .filter(|entry| finalists.contains(&entry.score.team_id))
        .filter_map(|entry| state.scores().ensure(Round::Three, entry.score.team_id))
        .collect();
    if !created.is_empty() {
        match state.require_quiz_store().await {
            Ok(store) => {
                for row in created {
                    let _team_guard = state.lock_team(row.team_id).await;
                    let current = state.scores().get(Round::Three, row.team_id).unwrap_or(row);
                    if let Err(err) = store
                        .save_score(RoundScoreEntity::from((Round::Three, current)))
                        .await
                    {
                        warn!(error = %err, "failed to persist round three score row");
                    }
                }
            }
            Err(err) => warn!(error = %err, "round three score rows kept in memory only"),
        }
    }

    let name_of = |team_id| state.team_name(team_id).unwrap_or_else(|| "Unknown".into());

    let mut scores: Vec<TeamScore> = state
        .scores()
        .all(Round::Three)
        .into_iter()
        .filter(|row| finalists.contains(&row.team_id))
        .map(|row| TeamScore {
            team_id: row.team_id,
            team_name: name_of(row.team_id),
            score: row.score,
        })
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.team_name.cmp(&b.team_name)));

    let qualified = ranked
        .iter()
        .filter(|entry| finalists.contains(&entry.score.team_id))
        .map(|entry| TeamBrief {
            team_id: entry.score.team_id,
            team_name: name_of(entry.score.team_id),
            rank: entry.rank,
        })
        .collect();

    let board = state.round3().read().await;
    let snapshot = state.snapshot().await;
    DashboardResponse {
        game: GameStateResponse::new(snapshot.phase, board.current_id(), snapshot.version),
        questions: board
            .sorted()
            .into_iter()
            .map(Round3QuestionSummary::from)
            .collect(),
        scores,
        active_question: board.active().cloned().map(Round3QuestionSummary::from),
        qualified_teams: qualified,
    }
}

/// Full hit log (legal and illegal) of the selected question.
pub async fn hit_log(state: &SharedState) -> HitLogResponse {
    let offset = state.config().display_offset();
    let board = state.round3().read().await;
    let Some(question) = board.current().cloned() else {
        return HitLogResponse {
            question: None,
            hits: Vec::new(),
        };
    };
    drop(board);

    let hits = state
        .ledger()
        .logs_for(question.id)
        .iter()
        .map(|log| {
            let name = state
                .team_name(log.team_id)
                .unwrap_or_else(|| "Unknown".into());
            HitLogEntry::new(log, name, offset)
        })
        .collect();
    HitLogResponse {
        question: Some(question.into()),
        hits,
    }
}

// ---------------------------------------------------------------------------
// Game state transitions
// ---------------------------------------------------------------------------

async fn transition(state: &SharedState, event: GameEvent) -> Result<GameStateResponse, ServiceError> {
    let had_selection = state.round3().read().await.current_id().is_some();
    let cleared = run_transition_with_broadcast(state, event, |plan| async move {
        persist_game_state(state, plan.to).await?;
        if plan.to.round != Round::Three && had_selection {
            state.round3().write().await.clear_selection();
            return Ok(true);
        }
        Ok::<_, ServiceError>(false)
    })
    .await?;

    if cleared {
        sse_events::broadcast_question_changed(state, None);
        notify_buzzers(state, &BuzzerOutboundMessage::Question { is_unlocked: false });
    }
    let response = game_state(state).await;
    info!(
        round = response.active_round,
        status = ?response.round_status,
        "game state changed"
    );
    Ok(response)
}

/// Force the round and status (instructor game state form).
pub async fn set_game_state(
    state: &SharedState,
    request: GameStateRequest,
) -> Result<GameStateResponse, ServiceError> {
    let round = Round::try_from(request.active_round)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    transition(
        state,
        GameEvent::Override(GamePhase::new(round, request.round_status)),
    )
    .await
}

pub async fn start_round(state: &SharedState) -> Result<GameStateResponse, ServiceError> {
    transition(state, GameEvent::StartRound).await
}

pub async fn finish_round(state: &SharedState) -> Result<GameStateResponse, ServiceError> {
    transition(state, GameEvent::FinishRound).await
}

pub async fn advance_round(state: &SharedState) -> Result<GameStateResponse, ServiceError> {
    transition(state, GameEvent::AdvanceRound).await
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Registered teams in registration order.
pub fn list_teams(state: &SharedState) -> Vec<TeamSummary> {
    let mut teams: Vec<_> = state
        .teams()
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    teams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
    teams.into_iter().map(TeamSummary::from).collect()
}

/// Register a batch of teams; the whole batch is refused on a duplicate primary email.
pub async fn import_teams(
    state: &SharedState,
    inputs: Vec<TeamInput>,
) -> Result<Vec<TeamSummary>, ServiceError> {
    let teams: Vec<_> = inputs.into_iter().map(TeamInput::into_team).collect();

    for (index, team) in teams.iter().enumerate() {
        let email = &team.primary.email;
        let clash_in_batch = teams[..index]
            .iter()
            .any(|earlier| earlier.is_primary_email(email));
        if clash_in_batch || state.team_by_primary_email(email).is_some() {
            return Err(ServiceError::InvalidState(format!(
                "primary member email `{email}` is already registered"
            )));
        }
    }

    let store = state.require_quiz_store().await?;
    let mut created = Vec::with_capacity(teams.len());
    for team in teams {
        store.save_team(TeamEntity::from(team.clone())).await?;
        info!(team = %team.name, team_id = %team.id, "team registered");
        state.teams().insert(team.id, team.clone());
        created.push(TeamSummary::from(team));
    }
    Ok(created)
}

// ---------------------------------------------------------------------------
// Round-3 questions
// ---------------------------------------------------------------------------

async fn save_questions(
    state: &SharedState,
    questions: Vec<Round3Question>,
) -> Result<(), ServiceError> {
    if questions.is_empty() {
        return Ok(());
    }
    let store = state.require_quiz_store().await?;
    store
        .save_round3_questions(
            questions
                .into_iter()
                .map(Round3QuestionEntity::from)
                .collect(),
        )
        .await?;
    Ok(())
}

/// Announce the selected question to every listener.
async fn announce_selection(state: &SharedState) {
    let current = state.round3().read().await.current().cloned();
    sse_events::broadcast_question_changed(state, current.as_ref());
    notify_buzzers(
        state,
        &BuzzerOutboundMessage::Question {
            is_unlocked: current.is_some_and(|question| question.is_active),
        },
    );
}

/// Add a question to the running order.
pub async fn create_round3_question(
    state: &SharedState,
    text: String,
    sequence_order: Option<u32>,
) -> Result<Round3QuestionSummary, ServiceError> {
    state.require_quiz_store().await?;
    let question = {
        let mut board = state.round3().write().await;
        let sequence = sequence_order.unwrap_or_else(|| board.next_sequence());
        let question = Round3Question::new(sequence, text.trim().to_owned());
        board.insert(question.clone());
        question
    };
    save_questions(state, vec![question.clone()]).await?;
    info!(question_id = %question.id, sequence = question.sequence_order, "round three question created");
    Ok(question.into())
}

/// Make `id` the current question without unlocking it.
pub async fn select_question(
    state: &SharedState,
    id: Uuid,
) -> Result<Round3QuestionSummary, ServiceError> {
    state.require_quiz_store().await?;
    let question = {
        let mut board = state.round3().write().await;
        if !board.select(id) {
            return Err(ServiceError::NotFound(format!("question `{id}` not found")));
        }
        board.current().cloned()
    }
    .ok_or_else(|| ServiceError::NotFound(format!("question `{id}` not found")))?;

    persist_game_state(state, state.state_machine_phase().await).await?;
    announce_selection(state).await;
    Ok(question.into())
}

/// Unlock `id`: lock every other question, stamp the activation time and select it.
pub async fn activate_question(
    state: &SharedState,
    id: Uuid,
) -> Result<Round3QuestionSummary, ServiceError> {
    state.require_quiz_store().await?;
    let (changed, question) = {
        let mut board = state.round3().write().await;
        let at = state.ledger().now();
        let changed = board
            .activate(id, at)
            .ok_or_else(|| ServiceError::NotFound(format!("question `{id}` not found")))?;
        (changed, board.current().cloned())
    };
    let question =
        question.ok_or_else(|| ServiceError::NotFound(format!("question `{id}` not found")))?;

    save_questions(state, changed).await?;
    persist_game_state(state, state.state_machine_phase().await).await?;
    announce_selection(state).await;
    info!(question_id = %id, "round three question unlocked");
    Ok(question.into())
}

/// Lock every question; the selection is kept.
pub async fn deactivate_all(state: &SharedState) -> Result<usize, ServiceError> {
    state.require_quiz_store().await?;
    let changed = state.round3().write().await.deactivate_all();
    let count = changed.len();
    save_questions(state, changed).await?;
    announce_selection(state).await;
    info!(count, "round three questions locked");
    Ok(count)
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Add (or remove) round-three points for a team.
pub async fn adjust_score(
    state: &SharedState,
    request: ScoreAdjustmentRequest,
) -> Result<TeamScore, ServiceError> {
    let team_name = state
        .team_name(request.team_id)
        .ok_or_else(|| ServiceError::NotFound(format!("team `{}` not found", request.team_id)))?;
    let store = state.require_quiz_store().await?;
    let _team_guard = state.lock_team(request.team_id).await;

    let row = state
        .scores()
        .adjust(Round::Three, request.team_id, request.points);
    if let Err(err) = store
        .save_score(RoundScoreEntity::from((Round::Three, row.clone())))
        .await
    {
        state
            .scores()
            .adjust(Round::Three, request.team_id, -request.points);
        return Err(err.into());
    }
    sse_events::broadcast_score_updated(state, Round::Three, &row);

    info!(team = %team_name, delta = request.points, score = row.score, "score adjusted");
    Ok(TeamScore {
        team_id: row.team_id,
        team_name,
        score: row.score,
    })
}
