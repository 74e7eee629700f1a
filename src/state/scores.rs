use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use uuid::Uuid;

use crate::state::game::{Round, RoundScore};

/// Raised when a team tries to submit a round twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("team {team_id} already submitted {round}")]
pub struct AlreadySubmitted {
    pub round: Round,
    pub team_id: Uuid,
}

/// Per-round score tables, one row per team.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    tables: [DashMap<Uuid, RoundScore>; 3],
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, round: Round) -> &DashMap<Uuid, RoundScore> {
        &self.tables[round.index()]
    }

    /// Store a submitted score; a team gets exactly one row per round.
    pub fn submit(&self, round: Round, score: RoundScore) -> Result<(), AlreadySubmitted> {
        match self.table(round).entry(score.team_id) {
            Entry::Occupied(_) => Err(AlreadySubmitted {
                round,
                team_id: score.team_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(score);
                Ok(())
            }
        }
    }

    /// Add `delta` to a team's score, creating the row at zero when absent.
    pub fn adjust(&self, round: Round, team_id: Uuid, delta: i32) -> RoundScore {
        let mut row = self
            .table(round)
            .entry(team_id)
            .or_insert_with(|| RoundScore::empty(team_id));
        row.score = row.score.saturating_add(delta);
        row.clone()
    }

    /// Create an empty row for the team, returning it only when it was missing.
    pub fn ensure(&self, round: Round, team_id: Uuid) -> Option<RoundScore> {
        match self.table(round).entry(team_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let row = RoundScore::empty(team_id);
                slot.insert(row.clone());
                Some(row)
            }
        }
    }

    pub fn get(&self, round: Round, team_id: Uuid) -> Option<RoundScore> {
        self.table(round).get(&team_id).map(|row| row.clone())
    }

    /// Every row of `round`, unordered.
    pub fn all(&self, round: Round) -> Vec<RoundScore> {
        self.table(round)
            .iter()
            .map(|row| row.value().clone())
            .collect()
    }

    /// Replace the content of a round table.
    pub fn restore(&self, round: Round, rows: Vec<RoundScore>) {
        let table = self.table(round);
        table.clear();
        for row in rows {
            table.insert(row.team_id, row);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::SystemTime};

    use super::*;

    #[test]
    fn submit_rejects_second_row() {
        let board = ScoreBoard::new();
        let team = Uuid::new_v4();
        let row = RoundScore {
            team_id: team,
            score: 50,
            completed_at: Some(SystemTime::now()),
        };

        board.submit(Round::One, row.clone()).unwrap();
        let err = board.submit(Round::One, row.clone()).unwrap_err();
        assert_eq!(err.round, Round::One);
        assert_eq!(board.get(Round::One, team).unwrap().score, 50);

        board.submit(Round::Two, row).unwrap();
    }

    #[test]
    fn adjust_creates_row_and_goes_negative() {
        let board = ScoreBoard::new();
        let team = Uuid::new_v4();
        assert_eq!(board.adjust(Round::Three, team, -10).score, -10);
        assert_eq!(board.adjust(Round::Three, team, 25).score, 15);
    }

    #[test]
    fn ensure_only_reports_new_rows() {
        let board = ScoreBoard::new();
        let team = Uuid::new_v4();
        assert!(board.ensure(Round::Three, team).is_some());
        board.adjust(Round::Three, team, 5);
        assert!(board.ensure(Round::Three, team).is_none());
        assert_eq!(board.get(Round::Three, team).unwrap().score, 5);
    }

    #[test]
    fn concurrent_adjustments_are_not_lost() {
        let board = Arc::new(ScoreBoard::new());
        let team = Uuid::new_v4();
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let board = board.clone();
                thread::spawn(move || {
                    board.adjust(Round::Three, team, -10);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(board.get(Round::Three, team).unwrap().score, -200);
    }
}
