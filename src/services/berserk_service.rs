//! Buzzer ("Berserk") hits: legality, deduplication, strikes and penalties.

use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{BerserkLogEntity, RoundScoreEntity},
        quiz_store::QuizStore,
    },
    dto::{
        quiz::BerserkResponse,
        sse::{BerserkHitEvent, LeaderboardUpdatedEvent},
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        berserk::{BerserkLog, HitOutcome},
        game::{Round, RoundScore, Team},
    },
};

/// Record a buzzer hit of `team` on the selected question.
///
/// Hits of one team are handled one at a time. A hit the store refuses is
/// rolled back in memory, penalty included, so the team can simply retry.
pub async fn record_hit(state: &SharedState, team: &Team) -> Result<BerserkResponse, ServiceError> {
    if state.state_machine_phase().await.round != Round::Three {
        return Err(ServiceError::InvalidInput("Round 3 not active".into()));
    }
    let store = state.require_quiz_store().await?;
    let penalty_points = state.config().scoring.penalty_points;
    let _team_guard = state.lock_team(team.id).await;

    let mut penalised: Option<RoundScore> = None;
    let outcome = {
        // Holding the board guard keeps activation from interleaving with classification.
        let board = state.round3().read().await;
        let question = board
            .current()
            .ok_or_else(|| ServiceError::InvalidInput("No question selected".into()))?;
        state.ledger().record(team.id, question, || {
            penalised = Some(
                state
                    .scores()
                    .adjust(Round::Three, team.id, -penalty_points),
            );
        })
    };

    let response = BerserkResponse::from_outcome(&outcome, penalty_points);
    match &outcome {
        HitOutcome::AlreadyLogged => {
            debug!(team = %team.name, "duplicate legal hit ignored");
        }
        HitOutcome::Logged(log) => {
            if let Err(err) = store
                .append_berserk_log(BerserkLogEntity::from(log.clone()))
                .await
            {
                state.ledger().retract(log);
                warn!(team = %team.name, error = %err, "legal hit not persisted; rolled back");
                return Err(err.into());
            }

            info!(team = %team.name, seq = log.seq, "legal hit recorded");
            announce_hit(state, team, log, 0, false);
            let position = state
                .ledger()
                .leaderboard(log.question_id)
                .iter()
                .position(|hit| hit.id == log.id)
                .map_or(0, |index| index + 1);
            sse_events::broadcast_leaderboard_updated(
                state,
                &LeaderboardUpdatedEvent {
                    question_id: log.question_id,
                    team_id: team.id,
                    team_name: team.name.clone(),
                    position,
                },
            );
        }
        HitOutcome::Illegal {
            log,
            illegal_count,
            penalty,
        } => {
            persist_strike(state, store.as_ref(), team, log, penalised.as_ref(), penalty_points)
                .await?;

            info!(
                team = %team.name,
                seq = log.seq,
                illegal_count,
                penalty,
                "illegal hit recorded"
            );
            announce_hit(state, team, log, *illegal_count, *penalty);
            if let Some(score) = &penalised {
                sse_events::broadcast_score_updated(state, Round::Three, score);
            }
        }
    }

    Ok(response)
}

/// Store an illegal hit and its penalty, undoing both in memory when either write fails.
///
/// The penalised total is written first; if the log append then fails the
/// previous total is written back.
async fn persist_strike(
    state: &SharedState,
    store: &dyn QuizStore,
    team: &Team,
    log: &BerserkLog,
    penalised: Option<&RoundScore>,
    penalty_points: i32,
) -> Result<(), ServiceError> {
    let rollback = |reason: &str| {
        state.ledger().retract(log);
        let restored = penalised
            .map(|_| state.scores().adjust(Round::Three, team.id, penalty_points));
        warn!(team = %team.name, reason, "illegal hit not persisted; rolled back");
        restored
    };

    if let Some(score) = penalised {
        if let Err(err) = store
            .save_score(RoundScoreEntity::from((Round::Three, score.clone())))
            .await
        {
            rollback("penalty write failed");
            return Err(err.into());
        }
    }

    if let Err(err) = store
        .append_berserk_log(BerserkLogEntity::from(log.clone()))
        .await
    {
        if let Some(restored) = rollback("log append failed") {
            if let Err(restore_err) = store
                .save_score(RoundScoreEntity::from((Round::Three, restored)))
                .await
            {
                warn!(team = %team.name, error = %restore_err, "failed to restore score after rollback");
            }
        }
        return Err(err.into());
    }
    Ok(())
}

fn announce_hit(state: &SharedState, team: &Team, log: &BerserkLog, illegal_count: u32, penalty: bool) {
    sse_events::broadcast_berserk_hit(
        state,
        &BerserkHitEvent {
            question_id: log.question_id,
            team_id: team.id,
            team_name: team.name.clone(),
            sequence: log.seq,
            illegal: log.illegal,
            illegal_count,
            penalty,
        },
    );
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::quiz_store::{MemoryQuizStore, QuizStore, flaky::FlakyStore},
        dto::quiz::BerserkStatus,
        services::{mailer::LogMailer, storage_supervisor::hydrate},
        state::{
            AppState,
            game::{Member, Round3Question, RoundStatus},
            state_machine::GamePhase,
        },
    };

    fn team(name: &str) -> Team {
        let member = Member {
            name: name.into(),
            email: format!("{name}@team.dev"),
            phone: None,
        };
        Team {
            id: Uuid::new_v4(),
            name: name.into(),
            department: "CS".into(),
            year: "BE".into(),
            primary: member.clone(),
            supporting: member,
            supporting_department: None,
            supporting_year: None,
            created_at: SystemTime::now(),
        }
    }

    async fn round_three_state() -> (SharedState, Arc<MemoryQuizStore>, Uuid) {
        round_three_state_with(Arc::new(MemoryQuizStore::new())).await
    }

    async fn round_three_state_with<S: QuizStore + 'static>(
        store: Arc<S>,
    ) -> (SharedState, Arc<S>, Uuid) {
        let state = AppState::new(AppConfig::default(), Arc::new(LogMailer));
        state.set_quiz_store(store.clone()).await;
        state
            .restore_phase(GamePhase::new(Round::Three, RoundStatus::Ongoing))
            .await;
        let question = Round3Question::new(1, "Who wrote the borrow checker?".into());
        let id = question.id;
        let mut board = state.round3().write().await;
        board.insert(question);
        board.select(id);
        drop(board);
        (state, store, id)
    }

    #[tokio::test]
    async fn outside_round_three_is_rejected() {
        let state = AppState::new(AppConfig::default(), Arc::new(LogMailer));
        let err = record_hit(&state, &team("alpha")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(message) if message == "Round 3 not active"));
    }

    #[tokio::test]
    async fn third_false_start_costs_points() {
        let (state, store, _) = round_three_state().await;
        let alpha = team("alpha");

        for expected in 1..=2 {
            let response = record_hit(&state, &alpha).await.unwrap();
            assert_eq!(response.status, BerserkStatus::Illegal);
            assert_eq!(response.illegal_count, Some(expected));
            assert_eq!(response.message, "Illegal Hit (False Start)!");
        }
        let response = record_hit(&state, &alpha).await.unwrap();
        assert_eq!(response.message, "PENALTY! 3 Illegal Hits. -10 Points.");

        assert_eq!(state.scores().get(Round::Three, alpha.id).unwrap().score, -10);
        let stored = store.list_scores(Round::Three).await.unwrap();
        assert_eq!(stored[0].score, -10);
        assert_eq!(store.list_berserk_logs().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn legal_hit_is_logged_once() {
        let (state, store, id) = round_three_state().await;
        let at = state.ledger().now();
        state.round3().write().await.activate(id, at);

        let alpha = team("alpha");
        let first = record_hit(&state, &alpha).await.unwrap();
        assert_eq!(first.message, "Berserk Recorded!");
        let second = record_hit(&state, &alpha).await.unwrap();
        assert_eq!(second.message, "Already logged!");

        assert_eq!(state.ledger().leaderboard(id).len(), 1);
        assert_eq!(store.list_berserk_logs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_selection_is_rejected() {
        let (state, _, _) = round_three_state().await;
        state.round3().write().await.clear_selection();
        let err = record_hit(&state, &team("alpha")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(message) if message == "No question selected"));
    }

    #[tokio::test]
    async fn refused_legal_hit_keeps_its_place_on_retry() {
        let (state, store, id) = round_three_state_with(Arc::new(FlakyStore::default())).await;
        let at = state.ledger().now();
        state.round3().write().await.activate(id, at);
        let alpha = team("alpha");
        let beta = team("beta");

        store.fail_log_appends(1);
        let err = record_hit(&state, &alpha).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(state.ledger().leaderboard(id).is_empty());

        assert_eq!(record_hit(&state, &alpha).await.unwrap().message, "Berserk Recorded!");
        assert_eq!(record_hit(&state, &beta).await.unwrap().message, "Berserk Recorded!");

        let reloaded = AppState::new(AppConfig::default(), Arc::new(LogMailer));
        hydrate(&reloaded, store.as_ref()).await.unwrap();
        let order: Vec<Uuid> = reloaded
            .ledger()
            .leaderboard(id)
            .into_iter()
            .map(|log| log.team_id)
            .collect();
        assert_eq!(order, vec![alpha.id, beta.id]);
    }

    #[tokio::test]
    async fn refused_strike_undoes_its_penalty() {
        let (state, store, id) = round_three_state_with(Arc::new(FlakyStore::default())).await;
        let alpha = team("alpha");
        record_hit(&state, &alpha).await.unwrap();
        record_hit(&state, &alpha).await.unwrap();

        store.fail_log_appends(1);
        let err = record_hit(&state, &alpha).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(state.ledger().illegal_count(alpha.id, id), 2);
        assert_eq!(state.scores().get(Round::Three, alpha.id).unwrap().score, 0);
        assert_eq!(store.list_scores(Round::Three).await.unwrap()[0].score, 0);

        store.fail_score_saves(1);
        record_hit(&state, &alpha).await.unwrap_err();
        assert_eq!(state.ledger().illegal_count(alpha.id, id), 2);
        assert_eq!(store.list_berserk_logs().await.unwrap().len(), 2);

        let response = record_hit(&state, &alpha).await.unwrap();
        assert_eq!(response.illegal_count, Some(3));
        assert_eq!(store.list_scores(Round::Three).await.unwrap()[0].score, -10);
        assert_eq!(store.list_berserk_logs().await.unwrap().len(), 3);
    }
}
