//! Quest progression: submissions, approvals, milestones and tiers.
//!
//! Every mutation runs in one store transaction. Returning early with an error
//! drops the transaction, so a failed approval never leaves XP credited on a
//! pending submission or the other way round.

mod error;
pub mod milestones;

use chrono::Utc;
use std::sync::Arc;

use crate::catalog::{Catalog, QuestDef, QuestKind, TierDef, TierLevel};
use crate::db::models::{Submission, SubmissionStatus, User, XpLogEntry};
use crate::db::Store;

pub use error::{EngineError, EngineResult};
pub use milestones::{MilestonePolicy, MilestoneReward};

/// What an approval changed.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub submission: Submission,
    pub quest: QuestDef,
    pub milestones: Vec<MilestoneReward>,
    /// The owner after every credit of this approval.
    pub user: User,
    pub tier: TierLevel,
}

impl ApprovalOutcome {
    pub fn xp_granted(&self) -> i64 {
        self.quest.xp + self.milestones.iter().map(|m| m.xp).sum::<i64>()
    }
}

/// One line of the quest board.
#[derive(Debug, Clone)]
pub struct BoardEntry {
    pub quest: QuestDef,
    pub completed: bool,
    /// Approved submissions of this quest (repeatable) or of its base quest (milestone).
    pub approved_count: i64,
    /// Threshold of the rule granting this milestone.
    pub threshold: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct QuestBoard {
    pub user: User,
    pub tier: TierLevel,
    pub entries: Vec<BoardEntry>,
    /// Newest first.
    pub rejected: Vec<Submission>,
}

impl QuestBoard {
    /// Quests the user may send proof for right now.
    pub fn submittable(&self) -> impl Iterator<Item = &QuestDef> {
        self.entries
            .iter()
            .filter(|e| e.quest.kind.is_submittable())
            .filter(|e| !(e.quest.kind == QuestKind::OneTime && e.completed))
            .map(|e| &e.quest)
    }
}

pub struct Engine {
    store: Arc<dyn Store>,
    catalog: Arc<Catalog>,
    policy: MilestonePolicy,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<Catalog>, policy: MilestonePolicy) -> Self {
        Self { store, catalog, policy }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> MilestonePolicy {
        self.policy
    }

    /// Registers a member if unknown. Returns `true` for a new row.
    pub async fn register_user(&self, user_id: i64) -> EngineResult<bool> {
        let mut tx = self.store.begin().await?;
        let created = tx.register_user(user_id, Utc::now()).await?;
        tx.commit().await?;
        if created {
            tracing::info!(user_id, "user registered");
        }
        Ok(created)
    }

    pub async fn get_user(&self, user_id: i64) -> EngineResult<Option<User>> {
        let mut tx = self.store.begin().await?;
        let user = tx.get_user(user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn get_or_create_user(&self, user_id: i64) -> EngineResult<User> {
        let mut tx = self.store.begin().await?;
        tx.register_user(user_id, Utc::now()).await?;
        let user = tx
            .get_user(user_id)
            .await?
            .ok_or(EngineError::UserNotFound(user_id))?;
        tx.commit().await?;
        Ok(user)
    }

    /// Stores a pending submission. One-time quests that were already paid are
    /// not refused here; approval refuses them. Milestone codes count as
    /// unknown, they are never submitted directly.
    pub async fn create_submission(
        &self,
        user_id: i64,
        mission_code: &str,
        proof: &str,
    ) -> EngineResult<i64> {
        let quest = self
            .catalog
            .quest(mission_code)
            .filter(|q| q.kind.is_submittable())
            .ok_or_else(|| EngineError::InvalidReference(mission_code.to_string()))?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        tx.register_user(user_id, now).await?;
        let submission_id = tx.insert_submission(user_id, &quest.code, proof, now).await?;
        tx.commit().await?;

        tracing::info!(user_id, submission_id, mission_code = %quest.code, "submission created");
        Ok(submission_id)
    }

    pub async fn approve_submission(&self, submission_id: i64) -> EngineResult<ApprovalOutcome> {
        let mut tx = self.store.begin().await?;

        let submission = tx
            .get_submission(submission_id)
            .await?
            .ok_or(EngineError::SubmissionNotFound(submission_id))?;
        if !submission.is_pending() {
            return Err(EngineError::InvalidState {
                submission_id,
                status: submission.status,
            });
        }
        let quest = self
            .catalog
            .quest(&submission.mission_code)
            .ok_or_else(|| EngineError::InvalidReference(submission.mission_code.clone()))?;
        let user_id = submission.user_id;
        let duplicate = || EngineError::DuplicateCompletion {
            user_id,
            mission_code: quest.code.clone(),
        };

        let one_time = quest.kind == QuestKind::OneTime;
        if one_time && tx.is_completed(user_id, &quest.code).await? {
            return Err(duplicate());
        }

        let now = Utc::now();
        if !tx.mark_approved(submission_id, now).await? {
            let status = tx
                .get_submission(submission_id)
                .await?
                .map_or(SubmissionStatus::Approved, |s| s.status);
            return Err(EngineError::InvalidState { submission_id, status });
        }
        tx.credit_xp(user_id, quest.xp, true).await?;
        tx.append_xp_log(user_id, &quest.log_label(), quest.xp, now).await?;
        if one_time && !tx.insert_completed(user_id, &quest.code, quest.xp, now).await? {
            return Err(duplicate());
        }

        let milestones =
            milestones::evaluate(tx.as_mut(), &self.catalog, self.policy, user_id, &quest.code, now)
                .await?;

        let user = tx
            .get_user(user_id)
            .await?
            .ok_or(EngineError::UserNotFound(user_id))?;
        let submission = tx
            .get_submission(submission_id)
            .await?
            .ok_or(EngineError::SubmissionNotFound(submission_id))?;
        tx.commit().await?;

        let outcome = ApprovalOutcome {
            tier: self.catalog.tier_for(user.total_xp),
            submission,
            quest: quest.clone(),
            milestones,
            user,
        };
        tracing::info!(
            user_id,
            submission_id,
            mission_code = %quest.code,
            xp = outcome.xp_granted(),
            milestones = outcome.milestones.len(),
            total_xp = outcome.user.total_xp,
            tier = outcome.tier,
            "submission approved"
        );
        Ok(outcome)
    }

    /// Rejects a pending submission, keeping `reason` verbatim.
    pub async fn reject_submission(&self, submission_id: i64, reason: &str) -> EngineResult<Submission> {
        let mut tx = self.store.begin().await?;
        let submission = tx
            .get_submission(submission_id)
            .await?
            .ok_or(EngineError::SubmissionNotFound(submission_id))?;
        if !submission.is_pending() || !tx.mark_rejected(submission_id, reason).await? {
            return Err(EngineError::InvalidState {
                submission_id,
                status: submission.status,
            });
        }
        let submission = tx
            .get_submission(submission_id)
            .await?
            .ok_or(EngineError::SubmissionNotFound(submission_id))?;
        tx.commit().await?;

        tracing::info!(
            user_id = submission.user_id,
            submission_id,
            mission_code = %submission.mission_code,
            "submission rejected"
        );
        Ok(submission)
    }

    pub async fn get_submission(&self, submission_id: i64) -> EngineResult<Option<Submission>> {
        let mut tx = self.store.begin().await?;
        let sub = tx.get_submission(submission_id).await?;
        tx.commit().await?;
        Ok(sub)
    }

    pub fn user_tier(&self, total_xp: i64) -> TierLevel {
        self.catalog.tier_for(total_xp)
    }

    pub fn next_tier(&self, total_xp: i64) -> Option<&TierDef> {
        self.catalog.next_tier(total_xp)
    }

    pub async fn is_quest_completed(&self, user_id: i64, mission_code: &str) -> EngineResult<bool> {
        let mut tx = self.store.begin().await?;
        let done = tx.is_completed(user_id, mission_code).await?;
        tx.commit().await?;
        Ok(done)
    }

    /// `true` when `mission_code` is a one-time quest the user was already
    /// paid for. Repeatable quests and milestones are always open.
    pub async fn one_time_done(&self, user_id: i64, mission_code: &str) -> EngineResult<bool> {
        match self.catalog.quest(mission_code) {
            Some(q) if q.kind == QuestKind::OneTime => self.is_quest_completed(user_id, &q.code).await,
            _ => Ok(false),
        }
    }

    pub async fn approved_count(&self, user_id: i64, mission_code: &str) -> EngineResult<i64> {
        let mut tx = self.store.begin().await?;
        let count = tx.approved_count(user_id, mission_code).await?;
        tx.commit().await?;
        Ok(count)
    }

    pub async fn leaderboard(&self, limit: i64) -> EngineResult<Vec<User>> {
        let mut tx = self.store.begin().await?;
        let rows = tx.leaderboard(limit).await?;
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn user_rank(&self, user_id: i64) -> EngineResult<Option<i64>> {
        let mut tx = self.store.begin().await?;
        let rank = tx.user_rank(user_id).await?;
        tx.commit().await?;
        Ok(rank)
    }

    pub async fn xp_logs(&self, user_id: i64, limit: i64) -> EngineResult<Vec<XpLogEntry>> {
        let mut tx = self.store.begin().await?;
        let logs = tx.xp_logs(user_id, limit).await?;
        tx.commit().await?;
        Ok(logs)
    }

    pub async fn user_submissions(
        &self,
        user_id: i64,
        status: Option<SubmissionStatus>,
    ) -> EngineResult<Vec<Submission>> {
        let mut tx = self.store.begin().await?;
        let subs = tx.user_submissions(user_id, status).await?;
        tx.commit().await?;
        Ok(subs)
    }

    pub async fn rejected_submissions(&self, user_id: i64) -> EngineResult<Vec<Submission>> {
        self.user_submissions(user_id, Some(SubmissionStatus::Rejected)).await
    }

    pub async fn pending_submissions(&self, limit: i64) -> EngineResult<Vec<Submission>> {
        let mut tx = self.store.begin().await?;
        let subs = tx.pending_submissions(limit).await?;
        tx.commit().await?;
        Ok(subs)
    }

    /// Snapshot behind the `/sz` board. Registers the user on first use.
    pub async fn quest_board(&self, user_id: i64) -> EngineResult<QuestBoard> {
        let mut tx = self.store.begin().await?;
        tx.register_user(user_id, Utc::now()).await?;
        let user = tx
            .get_user(user_id)
            .await?
            .ok_or(EngineError::UserNotFound(user_id))?;
        let completed = tx.completed_quests(user_id).await?;

        let mut entries = Vec::new();
        for quest in self.catalog.quests() {
            let rule = self.catalog.rule_for_milestone(&quest.code);
            let counted_code = match (quest.kind, rule) {
                (QuestKind::Repeatable, _) => Some(quest.code.as_str()),
                (QuestKind::Milestone, Some(rule)) => Some(rule.base.as_str()),
                _ => None,
            };
            let approved_count = match counted_code {
                Some(code) => tx.approved_count(user_id, code).await?,
                None => 0,
            };
            entries.push(BoardEntry {
                quest: quest.clone(),
                completed: completed.iter().any(|c| c.mission_code == quest.code),
                approved_count,
                threshold: rule.map(|r| r.threshold),
            });
        }
        let rejected = tx
            .user_submissions(user_id, Some(SubmissionStatus::Rejected))
            .await?;
        tx.commit().await?;

        Ok(QuestBoard {
            tier: self.catalog.tier_for(user.total_xp),
            user,
            entries,
            rejected,
        })
    }
}
