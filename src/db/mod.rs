use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

#[cfg(test)]
pub mod memory;
pub mod models;
pub mod repo;

use models::{CompletedQuest, Submission, SubmissionStatus, User, XpLogEntry};

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[cfg(test)]
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point to persistent state. Every read and write happens inside a
/// transaction obtained from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// One open transaction. Dropping it without [`StoreTx::commit`] discards
/// every write made through it.
#[async_trait]
pub trait StoreTx: Send {
    /// Inserts the user if absent. Returns `true` when a row was created.
    async fn register_user(&mut self, user_id: i64, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn get_user(&mut self, user_id: i64) -> StoreResult<Option<User>>;

    /// Inserts a pending submission and bumps the owner's submission counter.
    async fn insert_submission(
        &mut self,
        user_id: i64,
        mission_code: &str,
        proof: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Reads a submission and locks it for the rest of the transaction.
    async fn get_submission(&mut self, submission_id: i64) -> StoreResult<Option<Submission>>;

    /// Moves a pending submission to approved. `false` when it was no longer pending.
    async fn mark_approved(&mut self, submission_id: i64, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Moves a pending submission to rejected. `false` when it was no longer pending.
    async fn mark_rejected(&mut self, submission_id: i64, reason: &str) -> StoreResult<bool>;

    /// Adds XP to the user; `approval` also bumps `approved_count`.
    async fn credit_xp(&mut self, user_id: i64, xp: i64, approval: bool) -> StoreResult<()>;

    async fn append_xp_log(
        &mut self,
        user_id: i64,
        mission_name: &str,
        xp: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Records a paid one-time or milestone reward. `false` if already recorded.
    async fn insert_completed(
        &mut self,
        user_id: i64,
        mission_code: &str,
        xp: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn is_completed(&mut self, user_id: i64, mission_code: &str) -> StoreResult<bool>;

    async fn completed_quests(&mut self, user_id: i64) -> StoreResult<Vec<CompletedQuest>>;

    /// All-time approved submissions of `mission_code` for the user.
    async fn approved_count(&mut self, user_id: i64, mission_code: &str) -> StoreResult<i64>;

    /// Newest first, optionally filtered by status.
    async fn user_submissions(
        &mut self,
        user_id: i64,
        status: Option<SubmissionStatus>,
    ) -> StoreResult<Vec<Submission>>;

    /// Oldest first.
    async fn pending_submissions(&mut self, limit: i64) -> StoreResult<Vec<Submission>>;

    /// Highest XP first, ties by user id.
    async fn leaderboard(&mut self, limit: i64) -> StoreResult<Vec<User>>;

    /// 1-based position of the user under the leaderboard ordering.
    async fn user_rank(&mut self, user_id: i64) -> StoreResult<Option<i64>>;

    /// Newest first.
    async fn xp_logs(&mut self, user_id: i64, limit: i64) -> StoreResult<Vec<XpLogEntry>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
