use std::{fmt, time::Instant};

use thiserror::Error;
use uuid::Uuid;

use crate::state::game::{Round, RoundStatus};

/// Position of the competition: which round is active and how far it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamePhase {
    /// Round currently shown to the teams.
    pub round: Round,
    /// Progress of that round.
    pub status: RoundStatus,
}

impl GamePhase {
    /// Build a phase from its parts.
    pub const fn new(round: Round, status: RoundStatus) -> Self {
        Self { round, status }
    }

    /// Whether buzzer hits may be accepted in this phase.
    pub fn is_buzzer_round(&self) -> bool {
        self.round == Round::Three
    }
}

impl Default for GamePhase {
    fn default() -> Self {
        Self::new(Round::One, RoundStatus::Waiting)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.round, self.status)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Open the waiting round to the teams.
    StartRound,
    /// Close the running round.
    FinishRound,
    /// Move from a finished round to the next one.
    AdvanceRound,
    /// Instructor forces an arbitrary phase.
    Override(GamePhase),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: GamePhase,
        /// Current phase.
        actual: GamePhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: GamePhase,
    /// Phase the state machine will transition to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: GamePhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<GamePhase>,
}

/// State machine driving the round flow of the competition.
#[derive(Debug, Clone, Default)]
pub struct GameStateMachine {
    phase: GamePhase,
    version: usize,
    pending: Option<Plan>,
}

impl GameStateMachine {
    /// Create a new state machine waiting for round one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state machine resuming from a persisted phase.
    pub fn resume(phase: GamePhase) -> Self {
        Self {
            phase,
            version: 0,
            pending: None,
        }
    }

    /// Jump to a persisted phase, keeping the version monotonic.
    ///
    /// Any pending plan is discarded; callers hold the transition gate so none is in flight.
    pub fn restore(&mut self, phase: GamePhase) {
        self.phase = phase;
        self.version += 1;
        self.pending = None;
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event.clone())
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let GamePhase { round, status } = self.phase;
        let next = match (status, &event) {
            (_, GameEvent::Override(target)) => *target,
            (RoundStatus::Waiting, GameEvent::StartRound) => {
                GamePhase::new(round, RoundStatus::Ongoing)
            }
            (RoundStatus::Ongoing, GameEvent::FinishRound) => {
                GamePhase::new(round, RoundStatus::Done)
            }
            (RoundStatus::Done, GameEvent::AdvanceRound) => match round.next() {
                Some(next) => GamePhase::new(next, RoundStatus::Waiting),
                None => {
                    return Err(InvalidTransition {
                        from: self.phase,
                        event,
                    });
                }
            },
            _ => {
                return Err(InvalidTransition {
                    from: self.phase,
                    event,
                });
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GamePhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_round_one_waiting() {
        let sm = GameStateMachine::new();
        assert_eq!(
            sm.phase(),
            GamePhase::new(Round::One, RoundStatus::Waiting)
        );
    }

    #[test]
    fn full_happy_path_through_competition() {
        let mut sm = GameStateMachine::new();

        for round in Round::ALL {
            assert_eq!(
                apply(&mut sm, GameEvent::StartRound),
                GamePhase::new(round, RoundStatus::Ongoing)
            );
            assert_eq!(
                apply(&mut sm, GameEvent::FinishRound),
                GamePhase::new(round, RoundStatus::Done)
            );
            if let Some(next) = round.next() {
                assert_eq!(
                    apply(&mut sm, GameEvent::AdvanceRound),
                    GamePhase::new(next, RoundStatus::Waiting)
                );
            }
        }
        assert_eq!(sm.snapshot().version, 8);
    }

    #[test]
    fn restore_keeps_version_increasing() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::StartRound);
        let before = sm.snapshot().version;

        sm.restore(GamePhase::new(Round::Two, RoundStatus::Waiting));

        let snapshot = sm.snapshot();
        assert_eq!(snapshot.phase, GamePhase::new(Round::Two, RoundStatus::Waiting));
        assert!(snapshot.version > before);
        assert!(snapshot.pending.is_none());
    }

    #[test]
    fn cannot_advance_past_round_three() {
        let mut sm = GameStateMachine::resume(GamePhase::new(Round::Three, RoundStatus::Done));
        let err = sm.plan(GameEvent::AdvanceRound).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));
        assert!(sm.snapshot().pending.is_none());
    }

    #[test]
    fn override_is_accepted_from_any_phase() {
        let mut sm = GameStateMachine::new();
        let target = GamePhase::new(Round::Three, RoundStatus::Ongoing);
        assert_eq!(apply(&mut sm, GameEvent::Override(target)), target);

        let back = GamePhase::new(Round::One, RoundStatus::Done);
        assert_eq!(apply(&mut sm, GameEvent::Override(back)), back);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = GameStateMachine::new();
        let err = sm.plan(GameEvent::FinishRound).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, GamePhase::default());
                assert_eq!(invalid.event, GameEvent::FinishRound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn second_plan_is_rejected_while_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::StartRound).unwrap();
        assert_eq!(
            sm.plan(GameEvent::StartRound).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(
            sm.snapshot().pending,
            Some(GamePhase::new(Round::One, RoundStatus::Ongoing))
        );
        sm.apply(plan.id).unwrap();
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::StartRound).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap().status, RoundStatus::Ongoing);
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::StartRound).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), GamePhase::default());
    }
}
