use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::doc,
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        GAME_STATE_ID, MongoBerserkLogDocument, MongoGameStateDocument, MongoQuestionBankDocument,
        MongoRound3QuestionDocument, MongoScoreDocument, MongoTeamDocument, doc_id, email_key,
        score_filter,
    },
};
use crate::{
    dao::{
        models::{
            BerserkLogEntity, GameStateEntity, McqQuestionEntity, Round3QuestionEntity,
            RoundScoreEntity, TeamEntity,
        },
        quiz_store::QuizStore,
        storage::StorageResult,
    },
    state::game::Round,
};

const TEAM_COLLECTION: &str = "teams";
const GAME_STATE_COLLECTION: &str = "game_state";
const QUESTION_BANK_COLLECTION: &str = "question_banks";
const ROUND3_QUESTION_COLLECTION: &str = "round3_questions";
const SCORE_COLLECTION: &str = "round_scores";
const BERSERK_LOG_COLLECTION: &str = "berserk_logs";

/// [`QuizStore`] backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let teams = self.collection::<MongoTeamDocument>(TEAM_COLLECTION).await;
        let email_index = IndexModel::builder()
            .keys(doc! {"primary_email_key": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("team_primary_email_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        teams
            .create_index(email_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TEAM_COLLECTION,
                index: "primary_email_key",
                source,
            })?;

        // One score row per (round, team).
        let scores = self.collection::<MongoScoreDocument>(SCORE_COLLECTION).await;
        let score_index = IndexModel::builder()
            .keys(doc! {"round": 1, "team_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("score_round_team_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        scores
            .create_index(score_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SCORE_COLLECTION,
                index: "round,team_id",
                source,
            })?;

        let logs = self
            .collection::<MongoBerserkLogDocument>(BERSERK_LOG_COLLECTION)
            .await;
        let log_index = IndexModel::builder()
            .keys(doc! {"question_id": 1, "sequence": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("berserk_question_seq_idx".to_owned()))
                    .build(),
            )
            .build();
        logs.create_index(log_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: BERSERK_LOG_COLLECTION,
                index: "question_id,sequence",
                source,
            })?;

        Ok(())
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.inner.database.read().await.collection::<T>(name)
    }

    async fn list_teams(&self) -> MongoResult<Vec<TeamEntity>> {
        let read_err = |source| MongoDaoError::Read {
            collection: TEAM_COLLECTION,
            source,
        };
        let documents: Vec<MongoTeamDocument> = self
            .collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .find(doc! {})
            .await
            .map_err(read_err)?
            .try_collect()
            .await
            .map_err(read_err)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_team(&self, team: TeamEntity) -> MongoResult<()> {
        let collection = self.collection::<MongoTeamDocument>(TEAM_COLLECTION).await;
        let key = email_key(&team.primary_member.email);
        let existing = collection
            .find_one(doc! {"primary_email_key": &key})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TEAM_COLLECTION,
                source,
            })?;
        if existing.is_some_and(|document| document.team_id() != team.id) {
            return Err(MongoDaoError::DuplicateTeamEmail { email: key });
        }

        let id = team.id;
        let document: MongoTeamDocument = team.into();
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn load_game_state(&self) -> MongoResult<Option<GameStateEntity>> {
        let document = self
            .collection::<MongoGameStateDocument>(GAME_STATE_COLLECTION)
            .await
            .find_one(doc! {"_id": GAME_STATE_ID})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GAME_STATE_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn save_game_state(&self, state: GameStateEntity) -> MongoResult<()> {
        let document: MongoGameStateDocument = state.into();
        self.collection::<MongoGameStateDocument>(GAME_STATE_COLLECTION)
            .await
            .replace_one(doc! {"_id": GAME_STATE_ID}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: GAME_STATE_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn load_question_bank(&self, round: Round) -> MongoResult<Vec<McqQuestionEntity>> {
        let document = self
            .collection::<MongoQuestionBankDocument>(QUESTION_BANK_COLLECTION)
            .await
            .find_one(doc! {"_id": i32::from(round.number())})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: QUESTION_BANK_COLLECTION,
                source,
            })?;
        Ok(document.map(|bank| bank.questions).unwrap_or_default())
    }

    async fn replace_question_bank(
        &self,
        round: Round,
        questions: Vec<McqQuestionEntity>,
    ) -> MongoResult<()> {
        let document = MongoQuestionBankDocument {
            round: i32::from(round.number()),
            questions,
        };
        self.collection::<MongoQuestionBankDocument>(QUESTION_BANK_COLLECTION)
            .await
            .replace_one(doc! {"_id": document.round}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: QUESTION_BANK_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn list_round3_questions(&self) -> MongoResult<Vec<Round3QuestionEntity>> {
        let read_err = |source| MongoDaoError::Read {
            collection: ROUND3_QUESTION_COLLECTION,
            source,
        };
        let documents: Vec<MongoRound3QuestionDocument> = self
            .collection::<MongoRound3QuestionDocument>(ROUND3_QUESTION_COLLECTION)
            .await
            .find(doc! {})
            .await
            .map_err(read_err)?
            .try_collect()
            .await
            .map_err(read_err)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_round3_questions(&self, questions: Vec<Round3QuestionEntity>) -> MongoResult<()> {
        let collection = self
            .collection::<MongoRound3QuestionDocument>(ROUND3_QUESTION_COLLECTION)
            .await;
        for question in questions {
            let id = question.id;
            let document: MongoRound3QuestionDocument = question.into();
            collection
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Write {
                    collection: ROUND3_QUESTION_COLLECTION,
                    source,
                })?;
        }
        Ok(())
    }

    async fn list_scores(&self, round: Round) -> MongoResult<Vec<RoundScoreEntity>> {
        let read_err = |source| MongoDaoError::Read {
            collection: SCORE_COLLECTION,
            source,
        };
        let documents: Vec<MongoScoreDocument> = self
            .collection::<MongoScoreDocument>(SCORE_COLLECTION)
            .await
            .find(doc! {"round": i32::from(round.number())})
            .await
            .map_err(read_err)?
            .try_collect()
            .await
            .map_err(read_err)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_score(&self, score: RoundScoreEntity) -> MongoResult<()> {
        let filter = score_filter(score.round, score.team_id);
        let document: MongoScoreDocument = score.into();
        self.collection::<MongoScoreDocument>(SCORE_COLLECTION)
            .await
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: SCORE_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn append_berserk_log(&self, log: BerserkLogEntity) -> MongoResult<()> {
        let document: MongoBerserkLogDocument = log.into();
        self.collection::<MongoBerserkLogDocument>(BERSERK_LOG_COLLECTION)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: BERSERK_LOG_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn list_berserk_logs(&self) -> MongoResult<Vec<BerserkLogEntity>> {
        let read_err = |source| MongoDaoError::Read {
            collection: BERSERK_LOG_COLLECTION,
            source,
        };
        let documents: Vec<MongoBerserkLogDocument> = self
            .collection::<MongoBerserkLogDocument>(BERSERK_LOG_COLLECTION)
            .await
            .find(doc! {})
            .sort(doc! {"sequence": 1})
            .await
            .map_err(read_err)?
            .try_collect()
            .await
            .map_err(read_err)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl QuizStore for MongoQuizStore {
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_teams().await.map_err(Into::into) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_team(team).await.map_err(Into::into) })
    }

    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_game_state().await.map_err(Into::into) })
    }

    fn save_game_state(&self, state: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game_state(state).await.map_err(Into::into) })
    }

    fn load_question_bank(
        &self,
        round: Round,
    ) -> BoxFuture<'static, StorageResult<Vec<McqQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_question_bank(round).await.map_err(Into::into) })
    }

    fn replace_question_bank(
        &self,
        round: Round,
        questions: Vec<McqQuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_question_bank(round, questions)
                .await
                .map_err(Into::into)
        })
    }

    fn list_round3_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Round3QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_round3_questions().await.map_err(Into::into) })
    }

    fn save_round3_questions(
        &self,
        questions: Vec<Round3QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_round3_questions(questions)
                .await
                .map_err(Into::into)
        })
    }

    fn list_scores(&self, round: Round) -> BoxFuture<'static, StorageResult<Vec<RoundScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_scores(round).await.map_err(Into::into) })
    }

    fn save_score(&self, score: RoundScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_score(score).await.map_err(Into::into) })
    }

    fn append_berserk_log(&self, log: BerserkLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_berserk_log(log).await.map_err(Into::into) })
    }

    fn list_berserk_logs(&self) -> BoxFuture<'static, StorageResult<Vec<BerserkLogEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_berserk_logs().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
