//! In-memory store for tests.
//!
//! A transaction holds the store lock and works on a copy of the state; commit
//! swaps the copy in, dropping the transaction throws it away.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::models::{CompletedQuest, Submission, SubmissionStatus, User, XpLogEntry};
use crate::db::{Store, StoreError, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    submissions: BTreeMap<i64, Submission>,
    completed: Vec<CompletedQuest>,
    xp_logs: Vec<XpLogEntry>,
    next_submission_id: i64,
    next_log_id: i64,
}

impl MemoryState {
    fn user_mut(&mut self, user_id: i64) -> StoreResult<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Unavailable(format!("foreign key: no user {user_id}")))
    }

    fn ranked_users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then(a.user_id.cmp(&b.user_id)));
        users
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_xp_log: Arc<AtomicBool>,
    conflict_completed: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every XP log write fail until switched off again.
    pub fn fail_xp_log_writes(&self, fail: bool) {
        self.fail_xp_log.store(fail, Ordering::SeqCst);
    }

    /// Makes `insert_completed` report a conflict, as if another transaction
    /// inserted the row first.
    pub fn conflict_completed_inserts(&self, conflict: bool) {
        self.conflict_completed.store(conflict, Ordering::SeqCst);
    }

    /// Makes `begin` fail until switched off again.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub async fn completed_rows(&self, user_id: i64, mission_code: &str) -> usize {
        let state = self.state.lock().await;
        state
            .completed
            .iter()
            .filter(|c| c.user_id == user_id && c.mission_code == mission_code)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let guard = self.state.clone().lock_owned().await;
        let scratch = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            scratch,
            fail_xp_log: self.fail_xp_log.clone(),
            conflict_completed: self.conflict_completed.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    scratch: MemoryState,
    fail_xp_log: Arc<AtomicBool>,
    conflict_completed: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn register_user(&mut self, user_id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        if self.scratch.users.contains_key(&user_id) {
            return Ok(false);
        }
        self.scratch.users.insert(user_id, User::new(user_id, at));
        Ok(true)
    }

    async fn get_user(&mut self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.scratch.users.get(&user_id).cloned())
    }

    async fn insert_submission(
        &mut self,
        user_id: i64,
        mission_code: &str,
        proof: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.scratch.user_mut(user_id)?.total_submissions += 1;
        self.scratch.next_submission_id += 1;
        let submission_id = self.scratch.next_submission_id;
        self.scratch.submissions.insert(
            submission_id,
            Submission {
                submission_id,
                user_id,
                mission_code: mission_code.to_string(),
                proof: proof.to_string(),
                status: SubmissionStatus::Pending,
                submitted_at: at,
                approved_at: None,
                rejection_reason: None,
            },
        );
        Ok(submission_id)
    }

    async fn get_submission(&mut self, submission_id: i64) -> StoreResult<Option<Submission>> {
        Ok(self.scratch.submissions.get(&submission_id).cloned())
    }

    async fn mark_approved(&mut self, submission_id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        match self.scratch.submissions.get_mut(&submission_id) {
            Some(sub) if sub.is_pending() => {
                sub.status = SubmissionStatus::Approved;
                sub.approved_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_rejected(&mut self, submission_id: i64, reason: &str) -> StoreResult<bool> {
        match self.scratch.submissions.get_mut(&submission_id) {
            Some(sub) if sub.is_pending() => {
                sub.status = SubmissionStatus::Rejected;
                sub.rejection_reason = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn credit_xp(&mut self, user_id: i64, xp: i64, approval: bool) -> StoreResult<()> {
        let user = self.scratch.user_mut(user_id)?;
        user.total_xp += xp;
        if approval {
            user.approved_count += 1;
        }
        Ok(())
    }

    async fn append_xp_log(
        &mut self,
        user_id: i64,
        mission_name: &str,
        xp: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if self.fail_xp_log.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("xp_logs write failed".into()));
        }
        self.scratch.next_log_id += 1;
        let id = self.scratch.next_log_id;
        self.scratch.xp_logs.push(XpLogEntry {
            id,
            user_id,
            mission_name: mission_name.to_string(),
            xp_amount: xp,
            created_at: at,
        });
        Ok(())
    }

    async fn insert_completed(
        &mut self,
        user_id: i64,
        mission_code: &str,
        xp: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if self.conflict_completed.load(Ordering::SeqCst)
            || self.is_completed(user_id, mission_code).await?
        {
            return Ok(false);
        }
        self.scratch.completed.push(CompletedQuest {
            user_id,
            mission_code: mission_code.to_string(),
            xp_earned: xp,
            completed_at: at,
        });
        Ok(true)
    }

    async fn is_completed(&mut self, user_id: i64, mission_code: &str) -> StoreResult<bool> {
        Ok(self
            .scratch
            .completed
            .iter()
            .any(|c| c.user_id == user_id && c.mission_code == mission_code))
    }

    async fn completed_quests(&mut self, user_id: i64) -> StoreResult<Vec<CompletedQuest>> {
        Ok(self
            .scratch
            .completed
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn approved_count(&mut self, user_id: i64, mission_code: &str) -> StoreResult<i64> {
        let count = self
            .scratch
            .submissions
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && s.mission_code == mission_code
                    && s.status == SubmissionStatus::Approved
            })
            .count();
        Ok(count as i64)
    }

    async fn user_submissions(
        &mut self,
        user_id: i64,
        status: Option<SubmissionStatus>,
    ) -> StoreResult<Vec<Submission>> {
        Ok(self
            .scratch
            .submissions
            .values()
            .rev()
            .filter(|s| s.user_id == user_id && status.map_or(true, |st| s.status == st))
            .cloned()
            .collect())
    }

    async fn pending_submissions(&mut self, limit: i64) -> StoreResult<Vec<Submission>> {
        Ok(self
            .scratch
            .submissions
            .values()
            .filter(|s| s.is_pending())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn leaderboard(&mut self, limit: i64) -> StoreResult<Vec<User>> {
        Ok(self
            .scratch
            .ranked_users()
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn user_rank(&mut self, user_id: i64) -> StoreResult<Option<i64>> {
        Ok(self
            .scratch
            .ranked_users()
            .iter()
            .position(|u| u.user_id == user_id)
            .map(|idx| idx as i64 + 1))
    }

    async fn xp_logs(&mut self, user_id: i64, limit: i64) -> StoreResult<Vec<XpLogEntry>> {
        Ok(self
            .scratch
            .xp_logs
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, scratch, .. } = *self;
        *guard = scratch;
        Ok(())
    }
}
