use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReviewError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Pull request {0} is already merged")]
    PrAlreadyMerged(String),

    #[error("Member {reviewer_id} is not assigned as reviewer of pull request {pr_id}")]
    ReviewerNotAssigned { pr_id: String, reviewer_id: String },

    #[error("No available candidates to review pull request {0}")]
    NoCandidatesAvailable(String),

    #[error("Storage backend does not support transactions: {0}")]
    TransactionUnsupported(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReviewError {
    pub fn not_found(what: &str, id: &str) -> Self {
        Self::NotFound(format!("{} '{}'", what, id))
    }

    pub fn conflict(what: &str, id: &str) -> Self {
        Self::Conflict(format!("{} '{}' already exists", what, id))
    }

    /// Whether this error is a business outcome rather than a backend failure.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::TransactionUnsupported(_)
        )
    }
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.message().to_string())
            }
            // A dangling team/member reference means the referenced record is absent.
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::NotFound(db_err.message().to_string())
            }
            other => Self::Storage(format!("Database error: {}", other)),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for ReviewError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(format!("Migration error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: ReviewError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ReviewError::NotFound(_)));
    }

    #[test]
    fn pool_errors_are_storage_failures() {
        let err: ReviewError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ReviewError::Storage(_)));
        assert!(!err.is_domain());
    }

    #[test]
    fn display_names_the_reviewer_and_pr() {
        let err = ReviewError::ReviewerNotAssigned {
            pr_id: "pr-1".to_string(),
            reviewer_id: "u2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Member u2 is not assigned as reviewer of pull request pr-1"
        );
        assert!(err.is_domain());
    }
}
