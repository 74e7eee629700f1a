//! Multiple-choice rounds: question delivery and server-side scoring.

use std::{collections::HashMap, time::SystemTime};

use tracing::info;

use crate::{
    dao::models::RoundScoreEntity,
    dto::quiz::{QuizQuestion, QuizQuestionsResponse, SubmitRoundResponse, SubmittedAnswer},
    error::ServiceError,
    state::{
        SharedState,
        game::{McqQuestion, Round, RoundScore, RoundStatus, Team},
        ranking::{is_qualified, rank_scores},
        scores::AlreadySubmitted,
    },
};

/// Whether `team` may play `round` given the previous round's ranking.
fn qualifies_for(state: &SharedState, team: &Team, round: Round) -> bool {
    match (round.previous(), state.config().scoring.cutoff_for(round)) {
        (Some(previous), Some(cutoff)) => {
            let ranked = rank_scores(state.scores().all(previous));
            is_qualified(&ranked, team.id, cutoff)
        }
        _ => true,
    }
}

/// Questions of the active multiple-choice round, without the answer key.
pub async fn questions(
    state: &SharedState,
    team: &Team,
) -> Result<QuizQuestionsResponse, ServiceError> {
    let phase = state.state_machine_phase().await;
    if phase.round == Round::Three {
        return Err(ServiceError::InvalidInput(
            "Round 3 has no quiz questions".into(),
        ));
    }
    if !qualifies_for(state, team, phase.round) {
        return Err(ServiceError::Forbidden(format!(
            "team did not qualify for {}",
            phase.round
        )));
    }

    Ok(QuizQuestionsResponse {
        round: phase.round.number(),
        questions: state
            .question_bank(phase.round)
            .into_iter()
            .map(QuizQuestion::from)
            .collect(),
    })
}

/// Score `answers` against `bank`; unknown questions and unparsable options count as wrong.
pub fn score_answers(bank: &[McqQuestion], answers: &[SubmittedAnswer], points: i32) -> i32 {
    let key: HashMap<u32, usize> = bank
        .iter()
        .map(|question| (question.id, question.correct))
        .collect();

    let correct = answers
        .iter()
        .filter(|answer| {
            let Some(selected) = answer.selected_option else {
                return false;
            };
            key.get(&answer.question_id)
                .is_some_and(|&correct| i64::try_from(correct).is_ok_and(|c| c == selected))
        })
        .count();

    i32::try_from(correct)
        .unwrap_or(i32::MAX)
        .saturating_mul(points)
}

/// Record the team's answers for round one or two.
pub async fn submit_round(
    state: &SharedState,
    team: &Team,
    round: u8,
    answers: &[SubmittedAnswer],
) -> Result<SubmitRoundResponse, ServiceError> {
    let round = match Round::try_from(round) {
        Ok(round @ (Round::One | Round::Two)) => round,
        _ => return Err(ServiceError::InvalidInput("Invalid round number".into())),
    };

    let phase = state.state_machine_phase().await;
    if phase.round != round {
        return Err(ServiceError::InvalidState(format!(
            "{round} is not the active round"
        )));
    }
    if phase.status != RoundStatus::Ongoing {
        return Err(ServiceError::InvalidState(format!("{round} is not ongoing")));
    }
    if !qualifies_for(state, team, round) {
        return Err(ServiceError::Forbidden(format!(
            "team did not qualify for {round}"
        )));
    }

    let store = state.require_quiz_store().await?;
    let points = state.config().scoring.points_per_correct(round);
    let score = score_answers(&state.question_bank(round), answers, points);
    let row = RoundScore {
        team_id: team.id,
        score,
        completed_at: Some(SystemTime::now()),
    };

    let _team_guard = state.lock_team(team.id).await;
    if state.scores().get(round, team.id).is_some() {
        return Err(AlreadySubmitted {
            round,
            team_id: team.id,
        }
        .into());
    }
    store
        .save_score(RoundScoreEntity::from((round, row.clone())))
        .await?;
    state.scores().submit(round, row)?;

    info!(team = %team.name, %round, score, "round submitted");
    Ok(SubmitRoundResponse {
        success: true,
        qualified: true,
        score,
    })
}
