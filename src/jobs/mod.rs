pub mod queue;
pub mod retry;
pub mod runner;

pub use queue::*;
pub use retry::*;
pub use runner::*;

use crate::entities::vendor::ReviewStatus;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Background work scheduled once the originating transaction commits.
/// Serializes as `{"job_type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum Job {
    ModeratePost { post_id: i64 },
    RecordPostView { post_id: i64, user_id: i64 },
    SendVerificationCode { code_id: i64 },
    SendLoginCode { code_id: i64 },
    VendorNotification { vendor_id: i64, notice: VendorNotice },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VendorNotice {
    Created,
    StatusChanged { old_status: ReviewStatus },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::ModeratePost { .. } => "moderate_post",
            Job::RecordPostView { .. } => "record_post_view",
            Job::SendVerificationCode { .. } => "send_verification_code",
            Job::SendLoginCode { .. } => "send_login_code",
            Job::VendorNotification { .. } => "vendor_notification",
        }
    }

    /// Partition key keeping jobs of one subject in order.
    pub fn key(&self) -> String {
        match self {
            Job::ModeratePost { post_id } | Job::RecordPostView { post_id, .. } => {
                format!("post:{}", post_id)
            }
            Job::SendVerificationCode { code_id } => format!("verification_code:{}", code_id),
            Job::SendLoginCode { code_id } => format!("login_code:{}", code_id),
            Job::VendorNotification { vendor_id, .. } => format!("vendor:{}", vendor_id),
        }
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Retryable(String),
    #[error("{0}")]
    Fatal(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Retryable(_) | JobError::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_are_tagged_by_type() {
        let job = Job::VendorNotification {
            vendor_id: 3,
            notice: VendorNotice::StatusChanged {
                old_status: ReviewStatus::Pending,
            },
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["job_type"], "vendor_notification");
        assert_eq!(value["notice"]["kind"], "status_changed");
        assert_eq!(value["notice"]["old_status"], "pending");

        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
        assert_eq!(back.key(), "vendor:3");
    }
}
