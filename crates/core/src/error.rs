use thiserror::Error;

pub type RewardsResult<T> = Result<T, RewardsError>;

#[derive(Error, Debug)]
pub enum RewardsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage read failed for key '{key}': {message}")]
    StorageRead { key: String, message: String },

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Rewards engine used before initialize() completed")]
    NotInitialized,

    #[error("Developer tools are disabled in this build")]
    DevToolsDisabled,

    #[error("Missing-points claim rejected: {0}")]
    ClaimRejected(#[from] ClaimRejection),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RewardsError {
    /// True when the persistent store failed and the action may not have been saved.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            RewardsError::StorageRead { .. } | RewardsError::StorageWrite(_) | RewardsError::Io(_)
        )
    }
}

/// Why a missing-points claim was turned down. Messages are user-facing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimRejection {
    #[error("Enter a valid {expected_len}-digit code.")]
    InvalidCode { expected_len: usize },

    #[error("Enter a valid amount (e.g., 12.34).")]
    InvalidAmount,

    #[error("Enter the purchase date as YYYY-MM-DD.")]
    InvalidDate,

    #[error("Purchase date is in the future.")]
    FutureDate,

    #[error("Code expired (over {grace_days} days).")]
    Expired { grace_days: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_failures_are_distinguishable() {
        assert!(RewardsError::StorageWrite("disk full".into()).is_storage_failure());
        assert!(RewardsError::StorageRead {
            key: "rewards.points".into(),
            message: "eio".into()
        }
        .is_storage_failure());
        assert!(!RewardsError::NotInitialized.is_storage_failure());
        assert!(!RewardsError::from(ClaimRejection::InvalidDate).is_storage_failure());
    }

    #[test]
    fn test_claim_rejection_messages() {
        let err = RewardsError::from(ClaimRejection::Expired { grace_days: 30 });
        assert_eq!(
            err.to_string(),
            "Missing-points claim rejected: Code expired (over 30 days)."
        );
        assert_eq!(
            ClaimRejection::InvalidCode { expected_len: 6 }.to_string(),
            "Enter a valid 6-digit code."
        );
    }
}
