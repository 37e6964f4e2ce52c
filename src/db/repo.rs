use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::{CompletedQuest, Submission, SubmissionStatus, User, XpLogEntry};
use crate::db::{Store, StoreResult, StoreTx};

const SUBMISSION_COLUMNS: &str = "submission_id, user_id, mission_code, proof, status, submitted_at, approved_at, rejection_reason";
const USER_COLUMNS: &str = "user_id, total_submissions, approved_count, total_xp, registered_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn register_user(&mut self, user_id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (user_id, registered_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_user(&mut self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn insert_submission(
        &mut self,
        user_id: i64,
        mission_code: &str,
        proof: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let submission_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO submissions (user_id, mission_code, proof, status, submitted_at)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING submission_id
            "#,
        )
            .bind(user_id)
            .bind(mission_code)
            .bind(proof)
            .bind(at)
            .fetch_one(&mut *self.tx)
            .await?;

        sqlx::query("UPDATE users SET total_submissions = total_submissions + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(submission_id)
    }

    async fn get_submission(&mut self, submission_id: i64) -> StoreResult<Option<Submission>> {
        let sub = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE submission_id = $1 FOR UPDATE"
        ))
            .bind(submission_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(sub)
    }

    async fn mark_approved(&mut self, submission_id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE submissions
            SET status = 'approved', approved_at = $2
            WHERE submission_id = $1 AND status = 'pending'
            "#,
        )
            .bind(submission_id)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_rejected(&mut self, submission_id: i64, reason: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE submissions
            SET status = 'rejected', rejection_reason = $2
            WHERE submission_id = $1 AND status = 'pending'
            "#,
        )
            .bind(submission_id)
            .bind(reason)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn credit_xp(&mut self, user_id: i64, xp: i64, approval: bool) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET total_xp = total_xp + $2,
                approved_count = approved_count + CASE WHEN $3 THEN 1 ELSE 0 END
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .bind(xp)
            .bind(approval)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn append_xp_log(
        &mut self,
        user_id: i64,
        mission_name: &str,
        xp: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO xp_logs (user_id, mission_name, xp_amount, created_at) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(mission_name)
            .bind(xp)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_completed(
        &mut self,
        user_id: i64,
        mission_code: &str,
        xp: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO completed_quests (user_id, mission_code, xp_earned, completed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, mission_code) DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(mission_code)
            .bind(xp)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn is_completed(&mut self, user_id: i64, mission_code: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM completed_quests WHERE user_id = $1 AND mission_code = $2)",
        )
            .bind(user_id)
            .bind(mission_code)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn completed_quests(&mut self, user_id: i64) -> StoreResult<Vec<CompletedQuest>> {
        let rows = sqlx::query_as::<_, CompletedQuest>(
            r#"
            SELECT user_id, mission_code, xp_earned, completed_at
            FROM completed_quests
            WHERE user_id = $1
            ORDER BY completed_at ASC
            "#,
        )
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn approved_count(&mut self, user_id: i64, mission_code: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM submissions
            WHERE user_id = $1 AND mission_code = $2 AND status = 'approved'
            "#,
        )
            .bind(user_id)
            .bind(mission_code)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn user_submissions(
        &mut self,
        user_id: i64,
        status: Option<SubmissionStatus>,
    ) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(&format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM submissions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY submitted_at DESC, submission_id DESC
            "#
        ))
            .bind(user_id)
            .bind(status.map(SubmissionStatus::as_str))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn pending_submissions(&mut self, limit: i64) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(&format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM submissions
            WHERE status = 'pending'
            ORDER BY submitted_at ASC, submission_id ASC
            LIMIT $1
            "#
        ))
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn leaderboard(&mut self, limit: i64) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY total_xp DESC, user_id ASC LIMIT $1"
        ))
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn user_rank(&mut self, user_id: i64) -> StoreResult<Option<i64>> {
        let rank: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 + (
                SELECT COUNT(*) FROM users o
                WHERE o.total_xp > u.total_xp
                   OR (o.total_xp = u.total_xp AND o.user_id < u.user_id)
            )
            FROM users u
            WHERE u.user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(rank)
    }

    async fn xp_logs(&mut self, user_id: i64, limit: i64) -> StoreResult<Vec<XpLogEntry>> {
        let rows = sqlx::query_as::<_, XpLogEntry>(
            r#"
            SELECT id, user_id, mission_name, xp_amount, created_at
            FROM xp_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
