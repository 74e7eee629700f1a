//! Volatile quiz store used by tests and single-process demos.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::QuizStore;
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

/// In-process [`QuizStore`] keeping every record behind a single lock.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<RwLock<MemoryData>>,
}

#[derive(Default)]
struct MemoryData {
    teams: IndexMap<Uuid, TeamEntity>,
    game_state: Option<GameStateEntity>,
    question_banks: HashMap<Round, Vec<McqQuestionEntity>>,
    round3_questions: IndexMap<Uuid, Round3QuestionEntity>,
    scores: HashMap<(Round, Uuid), RoundScoreEntity>,
    berserk_logs: Vec<BerserkLogEntity>,
}

impl MemoryQuizStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuizStore for MemoryQuizStore {
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.teams.values().cloned().collect()) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut data = inner.write().await;
            let email = team.primary_member.email.trim().to_lowercase();
            let taken = data.teams.values().any(|existing| {
                existing.id != team.id
                    && existing.primary_member.email.trim().to_lowercase() == email
            });
            if taken {
                return Err(StorageError::Rejected(format!(
                    "primary member email `{email}` is already registered"
                )));
            }
            data.teams.insert(team.id, team);
            Ok(())
        })
    }

    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.game_state.clone()) })
    }

    fn save_game_state(&self, state: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.game_state = Some(state);
            Ok(())
        })
    }

    fn load_question_bank(
        &self,
        round: Round,
    ) -> BoxFuture<'static, StorageResult<Vec<McqQuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .question_banks
                .get(&round)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn replace_question_bank(
        &self,
        round: Round,
        questions: Vec<McqQuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.question_banks.insert(round, questions);
            Ok(())
        })
    }

    fn list_round3_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Round3QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .round3_questions
                .values()
                .cloned()
                .collect())
        })
    }

    fn save_round3_questions(
        &self,
        questions: Vec<Round3QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut data = inner.write().await;
            for question in questions {
                data.round3_questions.insert(question.id, question);
            }
            Ok(())
        })
    }

    fn list_scores(&self, round: Round) -> BoxFuture<'static, StorageResult<Vec<RoundScoreEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .scores
                .values()
                .filter(|score| score.round == round)
                .cloned()
                .collect())
        })
    }

    fn save_score(&self, score: RoundScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner
                .write()
                .await
                .scores
                .insert((score.round, score.team_id), score);
            Ok(())
        })
    }

    fn append_berserk_log(&self, log: BerserkLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.berserk_logs.push(log);
            Ok(())
        })
    }

    fn list_berserk_logs(&self) -> BoxFuture<'static, StorageResult<Vec<BerserkLogEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.berserk_logs.clone()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::MemberEntity;

    fn team(name: &str, email: &str) -> TeamEntity {
        TeamEntity {
            id: Uuid::new_v4(),
            team_name: name.into(),
            department: "IT".into(),
            year: "SE".into(),
            primary_member: MemberEntity {
                name: format!("{name} lead"),
                email: email.into(),
                phone: None,
            },
            supporting_member: MemberEntity {
                name: format!("{name} support"),
                email: format!("support.{email}"),
                phone: None,
            },
            supporting_member_dept: None,
            supporting_member_year: None,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn save_team_rejects_duplicate_primary_email() {
        let store = MemoryQuizStore::new();
        store.save_team(team("Alpha", "lead@alpha.dev")).await.unwrap();

        let err = store
            .save_team(team("Beta", "LEAD@alpha.dev"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert_eq!(store.list_teams().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_team_replaces_existing_record() {
        let store = MemoryQuizStore::new();
        let mut alpha = team("Alpha", "lead@alpha.dev");
        store.save_team(alpha.clone()).await.unwrap();

        alpha.team_name = "Alpha Prime".into();
        store.save_team(alpha.clone()).await.unwrap();

        let teams = store.list_teams().await.unwrap();
        assert_eq!(teams, vec![alpha]);
    }

    #[tokio::test]
    async fn scores_are_kept_per_round() {
        let store = MemoryQuizStore::new();
        let team_id = Uuid::new_v4();
        for (round, score) in [(Round::One, 40), (Round::Two, 60)] {
            store
                .save_score(RoundScoreEntity {
                    round,
                    team_id,
                    score,
                    completion_time: None,
                })
                .await
                .unwrap();
        }

        let round_two = store.list_scores(Round::Two).await.unwrap();
        assert_eq!(round_two.len(), 1);
        assert_eq!(round_two[0].score, 60);
        assert!(store.list_scores(Round::Three).await.unwrap().is_empty());
    }
}
