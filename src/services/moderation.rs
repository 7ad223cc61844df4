use crate::entities::post;
use crate::jobs::{Job, JobError};
use crate::services::posts::{after_post_save, PostField, PostSave};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Transport(String),
    #[error("Classifier responded with status {0}")]
    Rejected(u16),
    #[error("Classifier returned an unexpected body: {0}")]
    Malformed(String),
    #[error("Moderation API key is not configured")]
    NotConfigured,
}

impl ClassifierError {
    fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Transport(_) => true,
            ClassifierError::Rejected(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// External judge of whether text is potentially harmful.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn is_potentially_harmful(&self, content: &str) -> Result<bool, ClassifierError>;
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
}

pub struct OpenAiModerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiModerator {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(OpenAiModerator {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ContentClassifier for OpenAiModerator {
    async fn is_potentially_harmful(&self, content: &str) -> Result<bool, ClassifierError> {
        if self.api_key.is_empty() {
            return Err(ClassifierError::NotConfigured);
        }
        let preview: String = content.chars().take(50).collect();
        log::info!("Checking content for harmfulness: {}...", preview);

        let response = self
            .client
            .post(format!("{}/moderations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": content }))
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClassifierError::Rejected(response.status().as_u16()));
        }

        let body: ModerationResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        body.results
            .first()
            .map(|result| result.flagged)
            .ok_or_else(|| ClassifierError::Malformed("empty results".to_string()))
    }
}

/// Runs the classifier over a post and stores the verdict in its flag.
///
/// Returns the follow-up jobs of the flag-only save, which the post-save
/// hook resolves to none.
pub async fn moderate_post<C: ConnectionTrait>(
    db: &C,
    classifier: &dyn ContentClassifier,
    post_id: i64,
) -> Result<Vec<Job>, JobError> {
    let Some(found) = post::Entity::find_by_id(post_id).one(db).await? else {
        log::warn!("Post {} no longer exists, skipping moderation", post_id);
        return Ok(Vec::new());
    };
    if found.content.trim().is_empty() {
        log::debug!("Post {} has no content, skipping moderation", post_id);
        return Ok(Vec::new());
    }

    let harmful = classifier
        .is_potentially_harmful(&found.content)
        .await
        .map_err(|e| {
            if e.is_transient() {
                JobError::Retryable(e.to_string())
            } else {
                JobError::Fatal(e.to_string())
            }
        })?;

    post::Entity::update_many()
        .col_expr(post::Column::IsPotentiallyHarmful, Expr::value(harmful))
        .filter(post::Column::Id.eq(post_id))
        .exec(db)
        .await?;
    log::info!("Post {} moderated, potentially harmful: {}", post_id, harmful);

    let save = PostSave {
        created: false,
        touched: &[PostField::IsPotentiallyHarmful],
        old_content: &found.content,
        new_content: &found.content,
    };
    Ok(after_post_save(post_id, &save).into_iter().collect())
}
