pub mod berserk;
pub mod game;
pub mod ranking;
pub mod round3;
pub mod scores;
pub mod sessions;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::quiz_store::QuizStore,
    error::ServiceError,
    services::mailer::OtpMailer,
    state::{
        berserk::BerserkLedger,
        game::{McqQuestion, Round, Team},
        round3::Round3Board,
        scores::ScoreBoard,
        sessions::SessionRegistry,
        state_machine::GamePhase,
    },
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::{
    sse::SseState,
    state_machine::{GameEvent, GameStateMachine},
};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
/// Handle used to push messages to a connected buzzer.
pub struct BuzzerConnection {
    pub team_id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: live competition data, connections and the storage handle.
pub struct AppState {
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    sse: SseState,
    buzzers: DashMap<Uuid, BuzzerConnection>,
    game: RwLock<GameStateMachine>,
    round3: RwLock<Round3Board>,
    question_banks: DashMap<Round, Vec<McqQuestion>>,
    teams: DashMap<Uuid, Team>,
    ledger: BerserkLedger,
    scores: ScoreBoard,
    sessions: SessionRegistry,
    team_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    config: Arc<AppConfig>,
    mailer: Arc<dyn OtpMailer>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, mailer: Arc<dyn OtpMailer>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            quiz_store: RwLock::new(None),
            sse: SseState::new(64, 64),
            buzzers: DashMap::new(),
            game: RwLock::new(GameStateMachine::new()),
            round3: RwLock::new(Round3Board::default()),
            question_banks: DashMap::new(),
            teams: DashMap::new(),
            ledger: BerserkLedger::new(config.scoring.penalty_every),
            scores: ScoreBoard::new(),
            sessions: SessionRegistry::new(config.otp.ttl(), config.otp.max_attempts),
            team_locks: DashMap::new(),
            config: Arc::new(config),
            mailer,
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Quiz store usable for writes, failing while degraded.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new quiz store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin_token()
    }

    /// Registry of open buzzer sockets keyed by connection identifier.
    pub fn buzzers(&self) -> &DashMap<Uuid, BuzzerConnection> {
        &self.buzzers
    }

    /// Registered teams keyed by id.
    pub fn teams(&self) -> &DashMap<Uuid, Team> {
        &self.teams
    }

    /// Look a team up by its primary member email.
    pub fn team_by_primary_email(&self, email: &str) -> Option<Team> {
        self.teams
            .iter()
            .find(|entry| entry.value().is_primary_email(email))
            .map(|entry| entry.value().clone())
    }

    pub fn team_name(&self, team_id: Uuid) -> Option<String> {
        self.teams.get(&team_id).map(|team| team.name.clone())
    }

    pub fn ledger(&self) -> &BerserkLedger {
        &self.ledger
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn mailer(&self) -> Arc<dyn OtpMailer> {
        self.mailer.clone()
    }

    /// Round-3 questions and selection.
    pub fn round3(&self) -> &RwLock<Round3Board> {
        &self.round3
    }

    /// Question bank of a multiple-choice round; empty when none was imported.
    pub fn question_bank(&self, round: Round) -> Vec<McqQuestion> {
        self.question_banks
            .get(&round)
            .map(|bank| bank.value().clone())
            .unwrap_or_default()
    }

    pub fn set_question_bank(&self, round: Round, questions: Vec<McqQuestion>) {
        self.question_banks.insert(round, questions);
    }

    /// Snapshot the current phase of the shared game state machine.
    pub async fn state_machine_phase(&self) -> GamePhase {
        self.game.read().await.phase()
    }

    /// Reset the state machine to a persisted phase once no transition is in flight.
    pub async fn restore_phase(&self, phase: GamePhase) {
        let _gate = self.transition_gate.lock().await;
        self.game.write().await.restore(phase);
    }

    /// Serialise hit, submission and score persistence of one team.
    ///
    /// The guard must be held from the in-memory check until the store write finished.
    pub async fn lock_team(&self, team_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.team_locks.entry(team_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Plan a transition to the shared game state machine, returning the plan.
    async fn plan_transition(&self, event: GameEvent) -> Result<Plan, PlanError> {
        let mut sm = self.game.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition to the shared game state machine, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let mut sm = self.game.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the shared game state machine
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.game.write().await;
        sm.abort(plan_id)
    }

    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.game.read().await;
        sm.snapshot()
    }

    /// Plan `event`, run `work` with the planned target phase, then apply or abort.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: GameEvent,
        work: F,
    ) -> Result<(T, GamePhase), ServiceError>
    where
        F: FnOnce(Plan) -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let plan = self.plan_transition(event.clone()).await?;
        let plan_id = plan.id;

        let work_future = work(plan);
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::mailer::LogMailer,
        state::game::RoundStatus,
    };

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(LogMailer))
    }

    #[tokio::test]
    async fn failed_work_aborts_transition() {
        let state = state();
        let err = state
            .run_transition(GameEvent::StartRound, |_| async {
                Err::<(), _>(ServiceError::Degraded)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, GamePhase::default());
        assert!(snapshot.pending.is_none());
    }

    #[tokio::test]
    async fn work_sees_planned_target() {
        let state = state();
        let (seen, next) = state
            .run_transition(GameEvent::StartRound, |plan| async move { Ok(plan.to) })
            .await
            .unwrap();
        assert_eq!(seen, next);
        assert_eq!(next.status, RoundStatus::Ongoing);
    }

    #[tokio::test]
    async fn restore_waits_for_in_flight_transition() {
        let state = state();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let transition = tokio::spawn({
            let state = state.clone();
            async move {
                state
                    .run_transition(GameEvent::StartRound, |_| async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, ServiceError>(())
                    })
                    .await
                    .map(|(_, phase)| phase)
            }
        });
        started_rx.await.unwrap();

        let restore = tokio::spawn({
            let state = state.clone();
            async move {
                state
                    .restore_phase(GamePhase::new(Round::Two, RoundStatus::Waiting))
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert!(!restore.is_finished());

        release_tx.send(()).unwrap();
        let applied = transition.await.unwrap().unwrap();
        assert_eq!(applied.status, RoundStatus::Ongoing);
        restore.await.unwrap();

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, GamePhase::new(Round::Two, RoundStatus::Waiting));
        assert_eq!(snapshot.version, 2);
        assert!(snapshot.pending.is_none());
    }

    #[tokio::test]
    async fn degraded_flag_follows_store_installation() {
        let state = state();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_quiz_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_quiz_store(Arc::new(crate::dao::quiz_store::MemoryQuizStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(state.require_quiz_store().await.is_ok());
    }
}
