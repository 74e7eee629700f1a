//! Read-only projections for teams and the projector screen.

use crate::{
    dto::public::{GameStatusResponse, LeaderboardEntry, LeaderboardResponse, ScoreCell},
    state::{
        SharedState,
        game::{Round, Team},
        ranking::{rank_of, rank_scores},
    },
};

/// Round progress as seen by `team` (anonymous visitors get neutral values).
pub async fn game_status(state: &SharedState, team: Option<&Team>) -> GameStatusResponse {
    let phase = state.state_machine_phase().await;
    let config = state.config();
    let bank_size = match phase.round {
        Round::Three => state.question_bank(Round::One).len(),
        round => state.question_bank(round).len(),
    };
    let total_score = config
        .scoring
        .points_per_correct(phase.round)
        .saturating_mul(i32::try_from(bank_size).unwrap_or(i32::MAX));

    let mut status = GameStatusResponse {
        active_round: phase.round.number(),
        round_status: phase.status,
        is_submitted: false,
        is_qualified: true,
        rank: None,
        last_score: 0,
        total_score,
        team_name: String::new(),
    };

    let Some(team) = team else {
        return status;
    };
    status.team_name = team.name.clone();

    if phase.round != Round::Three {
        status.is_submitted = state.scores().get(phase.round, team.id).is_some();
    }
    if let (Some(previous), Some(cutoff)) = (
        phase.round.previous(),
        config.scoring.cutoff_for(phase.round),
    ) {
        let ranked = rank_scores(state.scores().all(previous));
        match rank_of(&ranked, team.id) {
            Some(entry) => {
                status.rank = Some(entry.rank);
                status.last_score = entry.score.score;
                status.is_qualified = entry.rank <= cutoff;
            }
            None => status.is_qualified = false,
        }
    }

    status
}

/// Top entries of the active round.
pub async fn leaderboard(state: &SharedState) -> LeaderboardResponse {
    let phase = state.state_machine_phase().await;
    let config = state.config();
    let offset = config.display_offset();
    let name_of = |team_id| state.team_name(team_id).unwrap_or_else(|| "Unknown".into());

    let mut response = LeaderboardResponse {
        active_round: phase.round.number(),
        round_status: phase.status,
        leaderboard: Vec::new(),
        active_question_text: None,
        active_question_number: None,
        is_unlocked: false,
    };

    if phase.round == Round::Three {
        let board = state.round3().read().await;
        if let Some(question) = board.current() {
            response.active_question_text = Some(question.text.clone());
            response.active_question_number = Some(question.sequence_order);
            response.is_unlocked = question.is_active;
            response.leaderboard = state
                .ledger()
                .leaderboard(question.id)
                .into_iter()
                .take(config.leaderboard_size)
                .enumerate()
                .map(|(index, hit)| {
                    LeaderboardEntry::new(
                        index + 1,
                        name_of(hit.team_id),
                        ScoreCell::Label("LOGGED".into()),
                        Some(hit.at),
                        offset,
                    )
                })
                .collect();
        }
    } else {
        response.leaderboard = rank_scores(state.scores().all(phase.round))
            .into_iter()
            .take(config.leaderboard_size)
            .map(|entry| {
                LeaderboardEntry::new(
                    entry.rank,
                    name_of(entry.score.team_id),
                    ScoreCell::Points(entry.score.score),
                    entry.score.completed_at,
                    offset,
                )
            })
            .collect();
    }

    response
}
