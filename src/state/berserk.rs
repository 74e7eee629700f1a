//! Round-3 buzzer ledger.
//!
//! Every hit is stamped by a single monotonic [`HitClock`] and recorded under
//! the map entry of its `(team, question)` pair, so the dedup check, the log
//! append, the strike count and the penalty happen as one step per pair while
//! hits of different teams proceed in parallel.

use std::{
    sync::{Mutex, PoisonError},
    time::SystemTime,
};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{dao::models::BerserkLogEntity, state::game::Round3Question};

/// Ordering stamp assigned to a hit on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitStamp {
    /// Global arrival order, strictly increasing.
    pub seq: u64,
    /// Wall-clock time, never earlier than the previous stamp.
    pub at: SystemTime,
}

/// Issues strictly ordered `(sequence, time)` stamps.
#[derive(Debug)]
pub struct HitClock {
    last: Mutex<(u64, SystemTime)>,
}

impl Default for HitClock {
    fn default() -> Self {
        Self {
            last: Mutex::new((0, SystemTime::UNIX_EPOCH)),
        }
    }
}

impl HitClock {
    /// Take the next stamp.
    pub fn stamp(&self) -> HitStamp {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = SystemTime::now().max(last.1);
        *last = (last.0 + 1, now);
        HitStamp {
            seq: last.0,
            at: now,
        }
    }

    /// Make sure later stamps sort after an already recorded one.
    fn observe(&self, seq: u64, at: SystemTime) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.0 = last.0.max(seq);
        last.1 = last.1.max(at);
    }
}

/// Why a hit did not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalReason {
    /// The question is locked.
    QuestionLocked,
    /// The question is flagged active but has no activation time.
    NotActivated,
    /// The hit arrived before the activation time.
    FalseStart,
}

/// Classification of a hit against the question state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legality {
    Legal,
    Illegal(IllegalReason),
}

/// Decide whether a hit stamped at `at` counts for `question`.
pub fn classify(question: &Round3Question, at: SystemTime) -> Legality {
    if !question.is_active {
        return Legality::Illegal(IllegalReason::QuestionLocked);
    }
    match question.activated_at {
        None => Legality::Illegal(IllegalReason::NotActivated),
        Some(activated_at) if at < activated_at => Legality::Illegal(IllegalReason::FalseStart),
        Some(_) => Legality::Legal,
    }
}

/// One buzzer press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BerserkLog {
    pub id: Uuid,
    pub team_id: Uuid,
    pub question_id: Uuid,
    pub at: SystemTime,
    pub seq: u64,
    pub illegal: bool,
}

impl From<BerserkLogEntity> for BerserkLog {
    fn from(value: BerserkLogEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            question_id: value.question_id,
            at: value.timestamp,
            seq: value.sequence,
            illegal: value.is_illegal,
        }
    }
}

impl From<BerserkLog> for BerserkLogEntity {
    fn from(value: BerserkLog) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            question_id: value.question_id,
            timestamp: value.at,
            sequence: value.seq,
            is_illegal: value.illegal,
        }
    }
}

/// Result of recording a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitOutcome {
    /// The team already holds a legal hit on this question; nothing was logged.
    AlreadyLogged,
    /// First legal hit of the team on this question.
    Logged(BerserkLog),
    /// Hit logged as illegal.
    Illegal {
        log: BerserkLog,
        /// Illegal hits of the team on this question, this one included.
        illegal_count: u32,
        /// Whether this hit triggered a penalty.
        penalty: bool,
    },
}

#[derive(Debug, Default)]
struct HitEntry {
    legal: Option<BerserkLog>,
    illegal: Vec<BerserkLog>,
}

/// In-memory record of all buzzer hits keyed by `(team, question)`.
#[derive(Debug)]
pub struct BerserkLedger {
    entries: DashMap<(Uuid, Uuid), HitEntry>,
    clock: HitClock,
    penalty_every: u32,
}

impl BerserkLedger {
    /// Create an empty ledger penalising every `penalty_every` illegal hits.
    pub fn new(penalty_every: u32) -> Self {
        Self {
            entries: DashMap::new(),
            clock: HitClock::default(),
            penalty_every: penalty_every.max(1),
        }
    }

    /// Current time on the ledger clock; used to stamp question activation.
    pub fn now(&self) -> SystemTime {
        self.clock.stamp().at
    }

    /// Record a hit of `team_id` on `question`.
    ///
    /// `on_penalty` runs while the pair is still locked, exactly once per
    /// penalised strike.
    pub fn record<F>(&self, team_id: Uuid, question: &Round3Question, on_penalty: F) -> HitOutcome
    where
        F: FnOnce(),
    {
        let mut entry = self.entries.entry((team_id, question.id)).or_default();
        if entry.legal.is_some() {
            return HitOutcome::AlreadyLogged;
        }

        let stamp = self.clock.stamp();
        let legality = classify(question, stamp.at);
        let log = BerserkLog {
            id: Uuid::new_v4(),
            team_id,
            question_id: question.id,
            at: stamp.at,
            seq: stamp.seq,
            illegal: legality != Legality::Legal,
        };

        if legality == Legality::Legal {
            entry.legal = Some(log.clone());
            return HitOutcome::Logged(log);
        }

        entry.illegal.push(log.clone());
        let illegal_count = u32::try_from(entry.illegal.len()).unwrap_or(u32::MAX);
        let penalty = illegal_count % self.penalty_every == 0;
        if penalty {
            on_penalty();
        }
        HitOutcome::Illegal {
            log,
            illegal_count,
            penalty,
        }
    }

    /// Drop a log the store refused, leaving the pair as it was before the hit.
    pub fn retract(&self, log: &BerserkLog) {
        if let Some(mut entry) = self.entries.get_mut(&(log.team_id, log.question_id)) {
            if entry.legal.as_ref().is_some_and(|legal| legal.id == log.id) {
                entry.legal = None;
            }
            entry.illegal.retain(|hit| hit.id != log.id);
        }
    }

    /// Legal hits on `question_id` in arrival order.
    pub fn leaderboard(&self, question_id: Uuid) -> Vec<BerserkLog> {
        let mut hits: Vec<BerserkLog> = self
            .entries
            .iter()
            .filter(|entry| entry.key().1 == question_id)
            .filter_map(|entry| entry.value().legal.clone())
            .collect();
        hits.sort_by_key(|log| log.seq);
        hits
    }

    /// Every hit on `question_id`, legal or not, in arrival order.
    pub fn logs_for(&self, question_id: Uuid) -> Vec<BerserkLog> {
        let mut logs: Vec<BerserkLog> = self
            .entries
            .iter()
            .filter(|entry| entry.key().1 == question_id)
            .flat_map(|entry| {
                let value = entry.value();
                value
                    .legal
                    .iter()
                    .chain(value.illegal.iter())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        logs.sort_by_key(|log| log.seq);
        logs
    }

    /// Illegal hit count of a team on a question.
    pub fn illegal_count(&self, team_id: Uuid, question_id: Uuid) -> u32 {
        self.entries
            .get(&(team_id, question_id))
            .map(|entry| u32::try_from(entry.illegal.len()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    /// Replace the ledger content with persisted logs.
    ///
    /// Only the first legal log of a pair is kept, matching live behaviour.
    pub fn restore(&self, mut logs: Vec<BerserkLog>) {
        self.entries.clear();
        logs.sort_by_key(|log| log.seq);
        for log in logs {
            self.clock.observe(log.seq, log.at);
            let mut entry = self
                .entries
                .entry((log.team_id, log.question_id))
                .or_default();
            if log.illegal {
                entry.illegal.push(log);
            } else if entry.legal.is_none() {
                entry.legal = Some(log);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        thread,
        time::Duration,
    };

    use super::*;

    fn active_question(ledger: &BerserkLedger) -> Round3Question {
        let mut question = Round3Question::new(1, "Name the protocol".into());
        question.is_active = true;
        question.activated_at = Some(ledger.now());
        question
    }

    #[test]
    fn clock_stamps_are_strictly_ordered() {
        let clock = HitClock::default();
        let first = clock.stamp();
        let second = clock.stamp();
        assert!(second.seq > first.seq);
        assert!(second.at >= first.at);
    }

    #[test]
    fn classify_flags_locked_and_early_hits() {
        let now = SystemTime::now();
        let mut question = Round3Question::new(1, "q".into());
        assert_eq!(
            classify(&question, now),
            Legality::Illegal(IllegalReason::QuestionLocked)
        );

        question.is_active = true;
        assert_eq!(
            classify(&question, now),
            Legality::Illegal(IllegalReason::NotActivated)
        );

        question.activated_at = Some(now + Duration::from_secs(1));
        assert_eq!(
            classify(&question, now),
            Legality::Illegal(IllegalReason::FalseStart)
        );
        assert_eq!(
            classify(&question, now + Duration::from_secs(2)),
            Legality::Legal
        );
    }

    #[test]
    fn second_legal_hit_is_deduplicated() {
        let ledger = BerserkLedger::new(3);
        let question = active_question(&ledger);
        let team = Uuid::new_v4();

        assert!(matches!(
            ledger.record(team, &question, || {}),
            HitOutcome::Logged(_)
        ));
        assert_eq!(
            ledger.record(team, &question, || {}),
            HitOutcome::AlreadyLogged
        );
        assert_eq!(ledger.logs_for(question.id).len(), 1);
    }

    #[test]
    fn retracted_hits_can_be_recorded_again() {
        let ledger = BerserkLedger::new(3);
        let question = active_question(&ledger);
        let team = Uuid::new_v4();

        let HitOutcome::Logged(first) = ledger.record(team, &question, || {}) else {
            panic!("expected a legal hit");
        };
        ledger.retract(&first);
        assert!(ledger.leaderboard(question.id).is_empty());
        assert!(matches!(
            ledger.record(team, &question, || {}),
            HitOutcome::Logged(_)
        ));

        let locked = Round3Question::new(2, "locked".into());
        let HitOutcome::Illegal { log, .. } = ledger.record(team, &locked, || {}) else {
            panic!("expected an illegal hit");
        };
        ledger.retract(&log);
        assert_eq!(ledger.illegal_count(team, locked.id), 0);
    }

    #[test]
    fn every_third_illegal_hit_is_penalised() {
        let ledger = BerserkLedger::new(3);
        let question = Round3Question::new(1, "locked".into());
        let team = Uuid::new_v4();
        let mut penalties = 0;

        let mut flags = Vec::new();
        for _ in 0..6 {
            match ledger.record(team, &question, || penalties += 1) {
                HitOutcome::Illegal {
                    illegal_count,
                    penalty,
                    ..
                } => flags.push((illegal_count, penalty)),
                other => panic!("expected illegal hit, got {other:?}"),
            }
        }

        assert_eq!(
            flags,
            vec![
                (1, false),
                (2, false),
                (3, true),
                (4, false),
                (5, false),
                (6, true)
            ]
        );
        assert_eq!(penalties, 2);
    }

    #[test]
    fn legal_hit_after_false_starts_is_still_logged() {
        let ledger = BerserkLedger::new(3);
        let mut question = Round3Question::new(1, "q".into());
        let team = Uuid::new_v4();

        ledger.record(team, &question, || {});
        question.is_active = true;
        question.activated_at = Some(ledger.now());

        assert!(matches!(
            ledger.record(team, &question, || {}),
            HitOutcome::Logged(_)
        ));
        assert_eq!(ledger.illegal_count(team, question.id), 1);
        assert_eq!(ledger.leaderboard(question.id).len(), 1);
    }

    #[test]
    fn leaderboard_follows_arrival_order() {
        let ledger = BerserkLedger::new(3);
        let question = active_question(&ledger);
        let teams: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for team in &teams {
            ledger.record(*team, &question, || {});
        }

        let order: Vec<Uuid> = ledger
            .leaderboard(question.id)
            .into_iter()
            .map(|log| log.team_id)
            .collect();
        assert_eq!(order, teams);
    }

    #[test]
    fn concurrent_hits_from_one_team_log_once() {
        let ledger = Arc::new(BerserkLedger::new(3));
        let question = active_question(&ledger);
        let team = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                let question = question.clone();
                thread::spawn(move || ledger.record(team, &question, || {}))
            })
            .collect();
        let logged = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|outcome| matches!(outcome, HitOutcome::Logged(_)))
            .count();

        assert_eq!(logged, 1);
        assert_eq!(ledger.leaderboard(question.id).len(), 1);
    }

    #[test]
    fn concurrent_illegal_hits_apply_each_penalty_once() {
        let ledger = Arc::new(BerserkLedger::new(3));
        let question = Round3Question::new(1, "locked".into());
        let team = Uuid::new_v4();
        let penalties = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..30)
            .map(|_| {
                let ledger = ledger.clone();
                let question = question.clone();
                let penalties = penalties.clone();
                thread::spawn(move || {
                    ledger.record(team, &question, || {
                        penalties.fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.illegal_count(team, question.id), 30);
        assert_eq!(penalties.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn restore_keeps_first_legal_log_and_advances_clock() {
        let ledger = BerserkLedger::new(3);
        let team = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        let at = SystemTime::now();
        let log = |seq, illegal| BerserkLog {
            id: Uuid::new_v4(),
            team_id: team,
            question_id,
            at,
            seq,
            illegal,
        };

        ledger.restore(vec![log(7, false), log(3, true), log(9, false)]);

        let legal = ledger.leaderboard(question_id);
        assert_eq!(legal.len(), 1);
        assert_eq!(legal[0].seq, 7);
        assert_eq!(ledger.illegal_count(team, question_id), 1);
        assert!(ledger.clock.stamp().seq > 9);
    }
}
