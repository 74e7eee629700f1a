/// Database model definitions.
pub mod models;
/// Persistence abstraction for teams, question banks, scores and buzzer logs.
pub mod quiz_store;
/// Backend-agnostic storage errors.
pub mod storage;
