use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered member and their running totals.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub total_submissions: i64,
    pub approved_count: i64,
    pub total_xp: i64,
    pub registered_at: DateTime<Utc>,
}

#[cfg(test)]
impl User {
    pub fn new(user_id: i64, registered_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_submissions: 0,
            approved_count: 0,
            total_xp: 0,
            registered_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown submission status {0:?}")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for SubmissionStatus {
    type Error = UnknownStatus;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            _ => Err(UnknownStatus(s)),
        }
    }
}

/// One proof sent in by a user for a mission.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub submission_id: i64,
    pub user_id: i64,
    pub mission_code: String,
    pub proof: String,
    #[sqlx(try_from = "String")]
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl Submission {
    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }
}

/// Marks a one-time or milestone reward as paid.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompletedQuest {
    pub user_id: i64,
    pub mission_code: String,
    pub xp_earned: i64,
    pub completed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct XpLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub mission_name: String,
    pub xp_amount: i64,
    pub created_at: DateTime<Utc>,
}
