//! Store wrapper whose writes can be made to fail on demand.

use std::{
    io,
    sync::atomic::{AtomicU32, Ordering},
};

use futures::future::BoxFuture;

use super::{MemoryQuizStore, QuizStore};
use crate::{
    dao::{
        models::{
            BerserkLogEntity, GameStateEntity, McqQuestionEntity, Round3QuestionEntity,
            RoundScoreEntity, TeamEntity,
        },
        storage::{StorageError, StorageResult},
    },
    state::game::Round,
};

/// [`MemoryQuizStore`] failing the next `n` score saves or log appends.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryQuizStore,
    failing_scores: AtomicU32,
    failing_logs: AtomicU32,
}

impl FlakyStore {
    pub fn fail_score_saves(&self, count: u32) {
        self.failing_scores.store(count, Ordering::SeqCst);
    }

    pub fn fail_log_appends(&self, count: u32) {
        self.failing_logs.store(count, Ordering::SeqCst);
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

fn outage() -> StorageError {
    StorageError::unavailable(
        "write refused".into(),
        io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
    )
}

impl QuizStore for FlakyStore {
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        self.inner.list_teams()
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_team(team)
    }

    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        self.inner.load_game_state()
    }

    fn save_game_state(&self, state: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_game_state(state)
    }

    fn load_question_bank(
        &self,
        round: Round,
    ) -> BoxFuture<'static, StorageResult<Vec<McqQuestionEntity>>> {
        self.inner.load_question_bank(round)
    }

    fn replace_question_bank(
        &self,
        round: Round,
        questions: Vec<McqQuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.replace_question_bank(round, questions)
    }

    fn list_round3_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Round3QuestionEntity>>> {
        self.inner.list_round3_questions()
    }

    fn save_round3_questions(
        &self,
        questions: Vec<Round3QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_round3_questions(questions)
    }

    fn list_scores(&self, round: Round) -> BoxFuture<'static, StorageResult<Vec<RoundScoreEntity>>> {
        self.inner.list_scores(round)
    }

    fn save_score(&self, score: RoundScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        if take_failure(&self.failing_scores) {
            return Box::pin(async { Err(outage()) });
        }
        self.inner.save_score(score)
    }

    fn append_berserk_log(&self, log: BerserkLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        if take_failure(&self.failing_logs) {
            return Box::pin(async { Err(outage()) });
        }
        self.inner.append_berserk_log(log)
    }

    fn list_berserk_logs(&self) -> BoxFuture<'static, StorageResult<Vec<BerserkLogEntity>>> {
        self.inner.list_berserk_logs()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
