use crate::auth::TokenPair;
use crate::entities::profile::{self, IdCardValidationStatus, ProfileType};
use crate::entities::user;
use crate::services::storage::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Budi Santoso")]
    pub name: String,
    #[schema(example = "budi@example.com")]
    pub email: String,
    #[schema(example = "081234567890")]
    pub phone_number: String,
    pub id_card_file: Option<UploadedFile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmCodeRequest {
    pub phone_number: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivationResponse {
    pub message: String,
    pub data: TokenPair,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub profile_type: ProfileType,
    pub id_card_validation_status: IdCardValidationStatus,
    pub headline: Option<String>,
    pub farmer_community: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_picture_url: Option<String>,
    pub cover_picture_url: Option<String>,
    pub followers_count: u64,
    pub following_count: u64,
    /// Whether the caller follows this profile; absent for anonymous callers.
    pub is_following: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Compact profile card used in follower listings.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileSummary {
    pub id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub headline: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_following: bool,
}

impl ProfileSummary {
    pub fn new(profile: profile::Model, is_following: bool) -> Self {
        ProfileSummary {
            id: profile.id,
            user_id: profile.user_id,
            full_name: profile.full_name,
            headline: profile.headline,
            profile_picture_url: profile.profile_picture_url,
            is_following,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FollowActionResponse {
    pub message: String,
    pub is_following: bool,
    pub followers_count: u64,
}

/// Author block embedded in posts and comments.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl UserSummary {
    pub fn new(user: &user::Model, profile: Option<&profile::Model>) -> Self {
        UserSummary {
            id: user.id,
            username: user.username.clone(),
            full_name: profile.map(|p| p.full_name.clone()),
            profile_picture_url: profile.and_then(|p| p.profile_picture_url.clone()),
        }
    }
}
