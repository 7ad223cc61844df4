use super::{Job, JobError, RetryPolicy};
use crate::config::Config;
use crate::db::DbPool;
use crate::services::moderation::{moderate_post, ContentClassifier};
use crate::services::notification::WebhookNotifier;
use crate::services::{accounts, posts, vendor_review};
use std::sync::Arc;

/// Executes jobs against the database and the outbound integrations.
pub struct JobRunner {
    db: DbPool,
    config: Config,
    classifier: Arc<dyn ContentClassifier>,
    notifier: Arc<dyn WebhookNotifier>,
}

impl JobRunner {
    pub fn new(
        db: DbPool,
        config: Config,
        classifier: Arc<dyn ContentClassifier>,
        notifier: Arc<dyn WebhookNotifier>,
    ) -> Self {
        JobRunner {
            db,
            config,
            classifier,
            notifier,
        }
    }

    pub fn retry_policy(&self, job: &Job) -> RetryPolicy {
        let jobs = &self.config.jobs;
        match job {
            Job::ModeratePost { .. } => RetryPolicy::exponential(
                jobs.moderation_max_retries,
                jobs.moderation_backoff_max_secs,
            ),
            Job::VendorNotification { .. }
            | Job::SendVerificationCode { .. }
            | Job::SendLoginCode { .. } => {
                RetryPolicy::exponential(jobs.webhook_max_retries, jobs.webhook_backoff_max_secs)
            }
            Job::RecordPostView { .. } => RetryPolicy::NONE,
        }
    }

    /// Runs a job once, returning any jobs its own writes scheduled.
    pub async fn run(&self, job: &Job) -> Result<Vec<Job>, JobError> {
        match job {
            Job::ModeratePost { post_id } => {
                moderate_post(&self.db, self.classifier.as_ref(), *post_id).await
            }
            Job::RecordPostView { post_id, user_id } => {
                posts::record_view(&self.db, *post_id, *user_id).await?;
                Ok(Vec::new())
            }
            Job::SendVerificationCode { code_id } => {
                accounts::send_verification_code(
                    &self.db,
                    self.notifier.as_ref(),
                    &self.config.discord.codes_webhook_url,
                    *code_id,
                )
                .await?;
                Ok(Vec::new())
            }
            Job::SendLoginCode { code_id } => {
                accounts::send_login_code(
                    &self.db,
                    self.notifier.as_ref(),
                    &self.config.discord.codes_webhook_url,
                    *code_id,
                )
                .await?;
                Ok(Vec::new())
            }
            Job::VendorNotification { vendor_id, notice } => {
                vendor_review::send_vendor_notification(
                    &self.db,
                    self.notifier.as_ref(),
                    &self.config.discord.vendors_webhook_url,
                    *vendor_id,
                    notice,
                )
                .await?;
                Ok(Vec::new())
            }
        }
    }

    /// Runs a job under its retry policy. After the last attempt the error is logged and dropped.
    pub async fn execute(&self, job: &Job) -> Vec<Job> {
        let policy = self.retry_policy(job);
        let mut attempt = 0;
        loop {
            match self.run(job).await {
                Ok(follow_ups) => {
                    log::info!("Job {} ({}) completed", job.name(), job.key());
                    return follow_ups;
                }
                Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                    let delay = policy.delay(attempt);
                    log::warn!(
                        "Job {} ({}) failed: {}; retry {}/{} in {:?}",
                        job.name(),
                        job.key(),
                        e,
                        attempt + 1,
                        policy.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Job {} ({}) failed permanently: {}", job.name(), job.key(), e);
                    return Vec::new();
                }
            }
        }
    }
}
