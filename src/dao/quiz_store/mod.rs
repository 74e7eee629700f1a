#[cfg(test)]
pub mod flaky;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    BerserkLogEntity, GameStateEntity, McqQuestionEntity, Round3QuestionEntity, RoundScoreEntity,
    TeamEntity,
};
use crate::dao::storage::StorageResult;
use crate::state::game::Round;
use futures::future::BoxFuture;

pub use memory::MemoryQuizStore;

/// Abstraction over the datastore backing the competition.
///
/// Every method returns a `'static` boxed future so the trait stays object
/// safe and callers can hold an `Arc<dyn QuizStore>` across awaits.
pub trait QuizStore: Send + Sync {
    /// Every registered team, in registration order.
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Insert or replace a team; rejects a primary email already used by another team.
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// The singleton game state record, if one was ever saved.
    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>>;
    /// Overwrite the singleton game state record.
    fn save_game_state(&self, state: GameStateEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Question bank of round one or two; empty when nothing was imported.
    fn load_question_bank(
        &self,
        round: Round,
    ) -> BoxFuture<'static, StorageResult<Vec<McqQuestionEntity>>>;
    /// Replace the whole question bank of a round.
    fn replace_question_bank(
        &self,
        round: Round,
        questions: Vec<McqQuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Every round-three question.
    fn list_round3_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Round3QuestionEntity>>>;
    /// Upsert round-three questions by id.
    fn save_round3_questions(
        &self,
        questions: Vec<Round3QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Score rows of a round.
    fn list_scores(&self, round: Round) -> BoxFuture<'static, StorageResult<Vec<RoundScoreEntity>>>;
    /// Upsert the row of `(round, team)` with the given total.
    fn save_score(&self, score: RoundScoreEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Append one buzzer hit, legal or not.
    fn append_berserk_log(&self, log: BerserkLogEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Every buzzer hit ever appended.
    fn list_berserk_logs(&self) -> BoxFuture<'static, StorageResult<Vec<BerserkLogEntity>>>;

    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection of an existing handle.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
