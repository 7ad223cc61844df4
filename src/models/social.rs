use super::UserSummary;
use crate::entities::post::Privacy;
use crate::entities::report::{self, ReportReason};
use crate::services::storage::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const MAX_POST_IMAGES: usize = 10;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    /// One of `public`, `friends`, `only_me`; defaults to `public`.
    pub privacy: Option<String>,
    #[serde(default)]
    pub images: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub privacy: Option<String>,
    #[serde(default)]
    pub images: Vec<UploadedFile>,
    #[serde(default)]
    pub delete_image_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PostQuery {
    /// Case-insensitive match on post content.
    pub search: Option<String>,
    pub user_id: Option<i64>,
    pub profile_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub id: i64,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub slug: String,
    pub content: String,
    pub privacy: Privacy,
    pub images: Vec<ImageResponse>,
    pub views_count: u64,
    pub likes_count: u64,
    pub is_liked: bool,
    pub is_saved: bool,
    pub comments_count: u64,
    pub shared_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub content: String,
    /// Id of the comment being replied to.
    pub parent: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i64,
    pub post: String,
    pub parent: Option<i64>,
    pub content: String,
    pub user: UserSummary,
    pub likes_count: u64,
    pub is_liked: bool,
    pub replies_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportRequest {
    pub reason: ReportReason,
    pub detail_reason: Option<String>,
    #[serde(default)]
    pub restrict_user: bool,
    #[serde(default)]
    pub block_user: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportCreatedResponse {
    pub message: String,
    pub report_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportResponse {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub reason: ReportReason,
    pub reason_display: String,
    pub detail_reason: Option<String>,
    pub restrict_user: bool,
    pub block_user: bool,
    pub is_approved: bool,
    pub approved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<report::Model> for ReportResponse {
    fn from(model: report::Model) -> Self {
        ReportResponse {
            id: model.id,
            post_id: model.post_id,
            user_id: model.user_id,
            reason_display: model.reason.display().to_string(),
            reason: model.reason,
            detail_reason: model.detail_reason,
            restrict_user: model.restrict_user,
            block_user: model.block_user,
            is_approved: model.is_approved,
            approved_by: model.approved_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveReportRequest {
    pub is_approved: bool,
}
