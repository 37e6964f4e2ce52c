use crate::db::models::SubmissionStatus;
use crate::db::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Submission #{0} was not found.")]
    SubmissionNotFound(i64),

    #[error("User {0} is not registered.")]
    UserNotFound(i64),

    #[error("Submission #{submission_id} was already {status}.")]
    InvalidState {
        submission_id: i64,
        status: SubmissionStatus,
    },

    #[error("Unknown mission code `{0}`.")]
    InvalidReference(String),

    #[error("Mission {mission_code} was already completed by this user.")]
    DuplicateCompletion { user_id: i64, mission_code: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Expected outcomes that are shown to the user as-is. Anything else is a
    /// storage failure that gets logged and answered with a generic message.
    pub fn is_business(&self) -> bool {
        !matches!(self, EngineError::Storage(_))
    }

    pub fn user_message(&self) -> String {
        if self.is_business() {
            self.to_string()
        } else {
            "Something went wrong while processing this. Please try again later.".to_string()
        }
    }
}
