//! Count-based milestone grants.
//!
//! Runs inside the approval transaction of a base mission. The
//! `completed_quests` row doubles as the guard: a milestone whose row already
//! exists is skipped whatever the policy says.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::catalog::Catalog;
use crate::db::{StoreResult, StoreTx};

/// When a milestone threshold counts as reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MilestonePolicy {
    /// Only the approval that makes the count equal the threshold grants it.
    #[default]
    ExactCount,
    /// Any approval at or past the threshold grants it if still unpaid, which
    /// also catches counts that jumped over the threshold.
    AtLeast,
}

impl MilestonePolicy {
    pub fn triggers(self, count: i64, threshold: i64) -> bool {
        match self {
            MilestonePolicy::ExactCount => count == threshold,
            MilestonePolicy::AtLeast => count >= threshold,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown milestone policy {0:?}, expected `exact` or `at_least`")]
pub struct UnknownPolicy(String);

impl FromStr for MilestonePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "exact_count" => Ok(MilestonePolicy::ExactCount),
            "at_least" | "at-least" | "atleast" => Ok(MilestonePolicy::AtLeast),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneReward {
    pub mission_code: String,
    pub name: String,
    pub xp: i64,
}

pub(crate) async fn evaluate(
    tx: &mut dyn StoreTx,
    catalog: &Catalog,
    policy: MilestonePolicy,
    user_id: i64,
    base_code: &str,
    at: DateTime<Utc>,
) -> StoreResult<Vec<MilestoneReward>> {
    let rules: Vec<_> = catalog.milestones_for(base_code).collect();
    if rules.is_empty() {
        return Ok(Vec::new());
    }

    let count = tx.approved_count(user_id, base_code).await?;
    let mut rewards = Vec::new();
    for rule in rules {
        if !policy.triggers(count, rule.threshold) {
            continue;
        }
        let Some(quest) = catalog.quest(&rule.milestone) else {
            continue;
        };
        if !tx.insert_completed(user_id, &quest.code, quest.xp, at).await? {
            tracing::debug!(user_id, milestone = %quest.code, "milestone already granted");
            continue;
        }
        tx.credit_xp(user_id, quest.xp, false).await?;
        tx.append_xp_log(user_id, &quest.milestone_log_label(), quest.xp, at)
            .await?;
        tracing::info!(user_id, milestone = %quest.code, xp = quest.xp, count, "milestone granted");
        rewards.push(MilestoneReward {
            mission_code: quest.code.clone(),
            name: quest.name.clone(),
            xp: quest.xp,
        });
    }
    Ok(rewards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_policy_only_fires_on_equality() {
        let p = MilestonePolicy::ExactCount;
        assert!(!p.triggers(4, 5));
        assert!(p.triggers(5, 5));
        assert!(!p.triggers(6, 5));
    }

    #[test]
    fn at_least_policy_fires_past_threshold() {
        let p = MilestonePolicy::AtLeast;
        assert!(!p.triggers(4, 5));
        assert!(p.triggers(5, 5));
        assert!(p.triggers(6, 5));
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("exact".parse::<MilestonePolicy>().unwrap(), MilestonePolicy::ExactCount);
        assert_eq!(" AT_LEAST ".parse::<MilestonePolicy>().unwrap(), MilestonePolicy::AtLeast);
        assert!("sometimes".parse::<MilestonePolicy>().is_err());
    }
}
