use super::{or_discard, store_upload};
use crate::auth::{
    create_token_pair, verify_token, AuthenticatedUser, MaybeUser, TokenPair, TokenType,
    DEBUG_BYPASS_CODE,
};
use crate::config::Config;
use crate::db::DbPool;
use crate::entities::profile::{self, IdCardValidationStatus, ProfileType};
use crate::entities::{follow, user};
use crate::error::{unique_or, ApiError, ApiResult, Validator};
use crate::jobs::{dispatch, Job, JobQueue};
use crate::models::{
    ActivationResponse, ConfirmCodeRequest, FollowActionResponse, LoginRequest, MessageResponse,
    ProfileResponse, ProfileSummary, RefreshRequest, RegisterRequest,
};
use crate::pagination::{self, paginate, CursorPage, CursorParams};
use crate::services::accounts::{
    check_login_code, check_verification_code, issue_login_code, issue_verification_code,
    CodeCheck,
};
use crate::services::storage::FileStorage;
use crate::services::visibility::{is_following, profile_of};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, Order, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

async fn find_by_phone(pool: &DbPool, phone_number: &str) -> ApiResult<Option<user::Model>> {
    Ok(user::Entity::find()
        .filter(user::Column::Username.eq(phone_number.trim()))
        .one(pool)
        .await?)
}

/// Account behind a phone number that is allowed to sign in.
async fn active_user(pool: &DbPool, phone_number: &str) -> ApiResult<user::Model> {
    let account = find_by_phone(pool, phone_number)
        .await?
        .ok_or_else(|| ApiError::field("phone_number", "User not found"))?;
    if !account.is_active {
        return Err(ApiError::field("phone_number", "User is not active"));
    }
    Ok(account)
}

fn tokens(user_id: i64, config: &Config) -> ApiResult<TokenPair> {
    Ok(create_token_pair(user_id, &config.jwt)?)
}

#[utoipa::path(
    post,
    path = "/api/accounts/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Inactive account created, verification code sent", body = MessageResponse),
        (status = 400, description = "Invalid or duplicate registration data")
    ),
    tag = "accounts"
)]
pub async fn register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let req = req.into_inner();
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let phone_number = req.phone_number.trim().to_string();

    let mut v = Validator::new();
    v.check(!name.is_empty(), "name", "This field may not be blank.");
    v.check(email.contains('@'), "email", "Enter a valid email address.");
    v.check(!phone_number.is_empty(), "phone_number", "This field may not be blank.");
    if !email.is_empty() {
        let taken = profile::Entity::find()
            .filter(profile::Column::Email.eq(email.as_str()))
            .count(pool.get_ref())
            .await?;
        v.check(taken == 0, "email", "Email already exists");
    }
    if !phone_number.is_empty() {
        let taken = profile::Entity::find()
            .filter(profile::Column::PhoneNumber.eq(phone_number.as_str()))
            .count(pool.get_ref())
            .await?
            + user::Entity::find()
                .filter(user::Column::Username.eq(phone_number.as_str()))
                .count(pool.get_ref())
                .await?;
        v.check(taken == 0, "phone_number", "Phone number already exists");
    }
    v.finish()?;

    let id_card_file = match &req.id_card_file {
        Some(file) => Some(store_upload(&storage, "id_cards", "id_card_file", file).await?),
        None => None,
    };

    let stored: Vec<String> = id_card_file.iter().cloned().collect();

    let now = Utc::now();
    let saved = async {
        let txn = pool.begin().await?;
        let account = user::ActiveModel {
            username: Set(phone_number.clone()),
            email: Set(email.clone()),
            name: Set(name.clone()),
            is_active: Set(false),
            is_staff: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| unique_or(e, "Phone number already exists"))?;

        profile::ActiveModel {
            user_id: Set(account.id),
            full_name: Set(name),
            email: Set(email),
            phone_number: Set(phone_number),
            profile_type: Set(ProfileType::Farmer),
            id_card_file: Set(id_card_file),
            id_card_validation_status: Set(IdCardValidationStatus::Pending),
            headline: Set(None),
            farmer_community: Set(None),
            country: Set(None),
            city: Set(None),
            profile_picture_url: Set(None),
            cover_picture_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| unique_or(e, "Email or phone number already exists"))?;

        let code = issue_verification_code(&txn, account.id).await?;
        txn.commit().await?;
        Ok::<_, ApiError>((account, code))
    }
    .await;
    let (account, code) = or_discard(&storage, &stored, saved).await?;

    log::info!("Registered user {} awaiting verification", account.id);
    dispatch(queue.get_ref(), vec![Job::SendVerificationCode { code_id: code.id }]).await;

    Ok(HttpResponse::Created().json(MessageResponse::new("User registered successfully")))
}

#[utoipa::path(
    post,
    path = "/api/accounts/register/confirm",
    request_body = ConfirmCodeRequest,
    responses(
        (status = 200, description = "Account activated", body = ActivationResponse),
        (status = 400, description = "Unknown phone number, already active account or bad code")
    ),
    tag = "accounts"
)]
pub async fn confirm_registration(
    req: web::Json<ConfirmCodeRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let account = find_by_phone(&pool, &req.phone_number)
        .await?
        .ok_or_else(|| ApiError::field("phone_number", "Phone number does not exist"))?;
    if account.is_active {
        return Err(ApiError::field("phone_number", "User already activated"));
    }

    let bypass = config.server.debug && req.code == DEBUG_BYPASS_CODE;
    if !bypass {
        match check_verification_code(pool.get_ref(), account.id, &req.code).await? {
            CodeCheck::Valid => {}
            CodeCheck::Invalid => return Err(ApiError::field("code", "Invalid code")),
            CodeCheck::Expired => return Err(ApiError::field("code", "Code is expired")),
        }
    }

    let user_id = account.id;
    let mut active = account.into_active_model();
    active.is_active = Set(true);
    active.updated_at = Set(Utc::now());
    active.update(pool.get_ref()).await?;
    log::info!("User {} activated", user_id);

    Ok(HttpResponse::Ok().json(ActivationResponse {
        message: "User activated successfully".to_string(),
        data: tokens(user_id, &config)?,
    }))
}

#[utoipa::path(
    post,
    path = "/api/accounts/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login code sent", body = MessageResponse),
        (status = 400, description = "Unknown or inactive account")
    ),
    tag = "accounts"
)]
pub async fn login(
    req: web::Json<LoginRequest>,
    pool: web::Data<DbPool>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let account = active_user(&pool, &req.phone_number).await?;
    let code = issue_login_code(pool.get_ref(), account.id).await?;
    dispatch(queue.get_ref(), vec![Job::SendLoginCode { code_id: code.id }]).await;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Login code sent successfully")))
}

#[utoipa::path(
    post,
    path = "/api/accounts/login/confirm",
    request_body = ConfirmCodeRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenPair),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "accounts"
)]
pub async fn confirm_login(
    req: web::Json<ConfirmCodeRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let account = active_user(&pool, &req.phone_number).await?;
    match check_login_code(pool.get_ref(), account.id, &req.code).await? {
        CodeCheck::Valid => Ok(HttpResponse::Ok().json(tokens(account.id, &config)?)),
        CodeCheck::Invalid => Err(ApiError::field("code", "Invalid code")),
        CodeCheck::Expired => Err(ApiError::field("code", "Code is expired")),
    }
}

#[utoipa::path(
    post,
    path = "/api/accounts/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh token pair", body = TokenPair),
        (status = 400, description = "Refresh token missing"),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "accounts"
)]
pub async fn refresh_token(
    req: web::Json<RefreshRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let token = req
        .refresh
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Refresh token is required".to_string()))?;

    let invalid = || ApiError::Unauthorized("Invalid or expired refresh token".to_string());
    let claims =
        verify_token(token, &config.jwt.secret, TokenType::Refresh).map_err(|_| invalid())?;
    let user_id = claims.user_id().ok_or_else(invalid)?;
    let account = user::Entity::find_by_id(user_id)
        .one(pool.get_ref())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;

    Ok(HttpResponse::Ok().json(tokens(account.id, &config)?))
}

async fn follow_counts(pool: &DbPool, profile_id: i64) -> ApiResult<(u64, u64)> {
    let followers = follow::Entity::find()
        .filter(follow::Column::FollowingId.eq(profile_id))
        .count(pool)
        .await?;
    let following = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(profile_id))
        .count(pool)
        .await?;
    Ok((followers, following))
}

async fn profile_response(
    pool: &DbPool,
    profile: profile::Model,
    viewer: Option<i64>,
) -> ApiResult<ProfileResponse> {
    let account = user::Entity::find_by_id(profile.user_id)
        .one(pool)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let (followers_count, following_count) = follow_counts(pool, profile.id).await?;
    let is_following = match viewer {
        Some(viewer_id) => match profile_of(pool, viewer_id).await? {
            Some(own) => Some(is_following(pool, own.id, profile.id).await?),
            None => Some(false),
        },
        None => None,
    };

    Ok(ProfileResponse {
        id: profile.id,
        user_id: profile.user_id,
        username: account.username,
        full_name: profile.full_name,
        email: profile.email,
        phone_number: profile.phone_number,
        profile_type: profile.profile_type,
        id_card_validation_status: profile.id_card_validation_status,
        headline: profile.headline,
        farmer_community: profile.farmer_community,
        country: profile.country,
        city: profile.city,
        profile_picture_url: profile.profile_picture_url,
        cover_picture_url: profile.cover_picture_url,
        followers_count,
        following_count,
        is_following,
        created_at: profile.created_at,
    })
}

#[utoipa::path(
    get,
    path = "/api/accounts/profile",
    responses(
        (status = 200, description = "Profile of the caller", body = ProfileResponse),
        (status = 404, description = "Profile not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "accounts"
)]
pub async fn my_profile(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let profile = profile_of(pool.get_ref(), user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    let response = profile_response(&pool, profile, Some(user.user_id)).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/accounts/profiles/{profile_id}",
    params(
        ("profile_id" = i64, Path, description = "Profile id")
    ),
    responses(
        (status = 200, description = "Public profile", body = ProfileResponse),
        (status = 404, description = "Profile not found")
    ),
    tag = "accounts"
)]
pub async fn profile_detail(
    path: web::Path<i64>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let profile = profile::Entity::find_by_id(path.into_inner())
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;
    let response = profile_response(&pool, profile, viewer.user_id()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Resolves the caller's and the target's profiles for a follow action.
async fn follow_parties(
    pool: &DbPool,
    caller: i64,
    target_user_id: i64,
) -> ApiResult<(profile::Model, profile::Model)> {
    user::Entity::find_by_id(target_user_id)
        .one(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let profile_missing = || ApiError::NotFound("Profile not found".to_string());
    let target = profile_of(pool, target_user_id)
        .await?
        .ok_or_else(profile_missing)?;
    let own = profile_of(pool, caller).await?.ok_or_else(profile_missing)?;
    Ok((own, target))
}

#[utoipa::path(
    post,
    path = "/api/accounts/users/{user_id}/follow",
    params(
        ("user_id" = i64, Path, description = "User to follow")
    ),
    responses(
        (status = 201, description = "Now following", body = FollowActionResponse),
        (status = 400, description = "Already following or following yourself"),
        (status = 404, description = "User or profile not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "accounts"
)]
pub async fn follow_user(
    path: web::Path<i64>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (own, target) = follow_parties(&pool, user.user_id, path.into_inner()).await?;

    if is_following(pool.get_ref(), own.id, target.id).await? {
        return Err(ApiError::BadRequest("Already following this user".to_string()));
    }
    if own.id == target.id {
        return Err(ApiError::BadRequest("Cannot follow yourself".to_string()));
    }

    follow::ActiveModel {
        follower_id: Set(own.id),
        following_id: Set(target.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map_err(|e| unique_or(e, "Already following this user"))?;

    let (followers_count, _) = follow_counts(&pool, target.id).await?;
    Ok(HttpResponse::Created().json(FollowActionResponse {
        message: "Successfully followed user".to_string(),
        is_following: true,
        followers_count,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/accounts/users/{user_id}/follow",
    params(
        ("user_id" = i64, Path, description = "User to unfollow")
    ),
    responses(
        (status = 200, description = "No longer following", body = FollowActionResponse),
        (status = 400, description = "Not following this user"),
        (status = 404, description = "User or profile not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "accounts"
)]
pub async fn unfollow_user(
    path: web::Path<i64>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (own, target) = follow_parties(&pool, user.user_id, path.into_inner()).await?;

    let removed = follow::Entity::delete_many()
        .filter(follow::Column::FollowerId.eq(own.id))
        .filter(follow::Column::FollowingId.eq(target.id))
        .exec(pool.get_ref())
        .await?;
    if removed.rows_affected == 0 {
        return Err(ApiError::BadRequest("Not following this user".to_string()));
    }

    let (followers_count, _) = follow_counts(&pool, target.id).await?;
    Ok(HttpResponse::Ok().json(FollowActionResponse {
        message: "Successfully unfollowed user".to_string(),
        is_following: false,
        followers_count,
    }))
}

#[derive(Clone, Copy)]
enum Direction {
    Following,
    Followers,
}

async fn follow_list(
    pool: &DbPool,
    user_id: i64,
    viewer: Option<i64>,
    params: &CursorParams,
    direction: Direction,
) -> ApiResult<CursorPage<ProfileSummary>> {
    let Some(subject) = profile_of(pool, user_id).await? else {
        return Ok(CursorPage::empty());
    };

    let edges = match direction {
        Direction::Following => {
            follow::Entity::find().filter(follow::Column::FollowerId.eq(subject.id))
        }
        Direction::Followers => {
            follow::Entity::find().filter(follow::Column::FollowingId.eq(subject.id))
        }
    };
    let page = paginate(
        pool,
        edges,
        follow::Column::CreatedAt,
        follow::Column::Id,
        Order::Desc,
        params,
        pagination::FOLLOWS,
    )
    .await?;

    let other = |edge: &follow::Model| match direction {
        Direction::Following => edge.following_id,
        Direction::Followers => edge.follower_id,
    };
    let ids: Vec<i64> = page.results.iter().map(other).collect();
    let mut profiles: HashMap<i64, profile::Model> = profile::Entity::find()
        .filter(profile::Column::Id.is_in(ids.clone()))
        .all(pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let followed_by_viewer: HashSet<i64> = match viewer {
        Some(viewer_id) => match profile_of(pool, viewer_id).await? {
            Some(own) => follow::Entity::find()
                .filter(follow::Column::FollowerId.eq(own.id))
                .filter(follow::Column::FollowingId.is_in(ids))
                .all(pool)
                .await?
                .into_iter()
                .map(|edge| edge.following_id)
                .collect(),
            None => HashSet::new(),
        },
        None => HashSet::new(),
    };

    let CursorPage {
        next,
        previous,
        results,
    } = page;
    let results = results
        .iter()
        .filter_map(|edge| profiles.remove(&other(edge)))
        .map(|p| {
            let following = followed_by_viewer.contains(&p.id);
            ProfileSummary::new(p, following)
        })
        .collect();
    Ok(CursorPage {
        next,
        previous,
        results,
    })
}

#[utoipa::path(
    get,
    path = "/api/accounts/users/{user_id}/following",
    params(
        ("user_id" = i64, Path, description = "User whose follows are listed"),
        CursorParams
    ),
    responses(
        (status = 200, description = "Profiles the user follows", body = ProfilePage)
    ),
    tag = "accounts"
)]
pub async fn following_list(
    path: web::Path<i64>,
    query: web::Query<CursorParams>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let page = follow_list(
        &pool,
        path.into_inner(),
        viewer.user_id(),
        &query,
        Direction::Following,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/accounts/users/{user_id}/followers",
    params(
        ("user_id" = i64, Path, description = "User whose followers are listed"),
        CursorParams
    ),
    responses(
        (status = 200, description = "Profiles following the user", body = ProfilePage)
    ),
    tag = "accounts"
)]
pub async fn followers_list(
    path: web::Path<i64>,
    query: web::Query<CursorParams>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let page = follow_list(
        &pool,
        path.into_inner(),
        viewer.user_id(),
        &query,
        Direction::Followers,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}
