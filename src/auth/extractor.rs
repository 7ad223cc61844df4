use crate::auth::{verify_token, TokenType};
use crate::config::Config;
use crate::db::DbPool;
use crate::entities::user;
use crate::error::{ApiError, ApiResult};
use actix_web::{web, FromRequest, HttpRequest};
use sea_orm::EntityTrait;
use std::future::{ready, Ready};

/// Caller identified by a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl AuthenticatedUser {
    /// Loads the account and rejects callers without staff rights.
    pub async fn require_staff(&self, db: &DbPool) -> ApiResult<user::Model> {
        let account = user::Entity::find_by_id(self.user_id)
            .one(db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
        if !account.is_staff {
            return Err(ApiError::forbidden());
        }
        Ok(account)
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, ApiError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::Forbidden("Authentication credentials were not provided.".to_string())
        })?;

    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Config is not registered")))?;

    let claims = verify_token(token, &config.jwt.secret, TokenType::Access)
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

    Ok(AuthenticatedUser { user_id })
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Viewer of a read endpoint; anonymous when no valid token was sent.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<i64> {
        self.0.map(|u| u.user_id)
    }
}

impl FromRequest for MaybeUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(MaybeUser(authenticate(req).ok())))
    }
}
