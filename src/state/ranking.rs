//! Ordering and qualification over round score tables.

use std::{cmp::Ordering, collections::HashSet};

use uuid::Uuid;

use crate::state::game::RoundScore;

/// Score row with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedScore {
    pub rank: usize,
    pub score: RoundScore,
}

/// Higher score first, then earlier completion (missing times last), then team id.
fn compare(a: &RoundScore, b: &RoundScore) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| match (a.completed_at, b.completed_at) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.team_id.cmp(&b.team_id))
}

/// Sort a round table and assign ranks.
pub fn rank_scores(mut scores: Vec<RoundScore>) -> Vec<RankedScore> {
    scores.sort_by(compare);
    scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| RankedScore {
            rank: index + 1,
            score,
        })
        .collect()
}

/// Rank of `team_id`, if it has a row.
pub fn rank_of(ranked: &[RankedScore], team_id: Uuid) -> Option<&RankedScore> {
    ranked.iter().find(|entry| entry.score.team_id == team_id)
}

/// Teams ranked within `cutoff`.
pub fn qualified_teams(ranked: &[RankedScore], cutoff: usize) -> HashSet<Uuid> {
    ranked
        .iter()
        .take_while(|entry| entry.rank <= cutoff)
        .map(|entry| entry.score.team_id)
        .collect()
}

/// Whether `team_id` is ranked within `cutoff`.
pub fn is_qualified(ranked: &[RankedScore], team_id: Uuid, cutoff: usize) -> bool {
    rank_of(ranked, team_id).is_some_and(|entry| entry.rank <= cutoff)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn row(score: i32, after_secs: Option<u64>) -> RoundScore {
        RoundScore {
            team_id: Uuid::new_v4(),
            score,
            completed_at: after_secs.map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    #[test]
    fn orders_by_score_then_completion_time() {
        let slow = row(80, Some(200));
        let fast = row(80, Some(100));
        let best = row(90, Some(500));
        let unfinished = row(80, None);

        let ranked = rank_scores(vec![
            unfinished.clone(),
            slow.clone(),
            best.clone(),
            fast.clone(),
        ]);
        let order: Vec<Uuid> = ranked.iter().map(|entry| entry.score.team_id).collect();
        assert_eq!(
            order,
            vec![best.team_id, fast.team_id, slow.team_id, unfinished.team_id]
        );
        assert_eq!(ranked[3].rank, 4);
    }

    #[test]
    fn exact_ties_are_broken_by_team_id() {
        let a = row(50, Some(10));
        let mut b = a.clone();
        b.team_id = Uuid::new_v4();
        let ranked = rank_scores(vec![a.clone(), b.clone()]);
        let first = a.team_id.min(b.team_id);
        assert_eq!(ranked[0].score.team_id, first);
    }

    #[test]
    fn qualification_respects_cutoff() {
        let rows: Vec<RoundScore> = (0..25).map(|i| row(100 - i, Some(1))).collect();
        let ranked = rank_scores(rows.clone());

        let qualified = qualified_teams(&ranked, 20);
        assert_eq!(qualified.len(), 20);
        assert!(is_qualified(&ranked, rows[19].team_id, 20));
        assert!(!is_qualified(&ranked, rows[20].team_id, 20));
        assert!(!is_qualified(&ranked, Uuid::new_v4(), 20));
    }
}
