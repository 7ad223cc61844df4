use super::comments::find_comment;
use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::entities::{post_comment_like, post_like, post_saved};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::MessageResponse;
use crate::services::posts::record_view;
use crate::services::visibility::find_visible_post;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};

/// Maps the outcome of a get-or-create insert to the reaction response.
fn created_or(
    result: Result<(), DbErr>,
    done: &str,
    duplicate: &str,
) -> ApiResult<HttpResponse> {
    match result {
        Ok(()) => Ok(HttpResponse::Created().json(MessageResponse::new(done))),
        Err(e) if is_unique_violation(&e) => Err(ApiError::BadRequest(duplicate.to_string())),
        Err(e) => Err(e.into()),
    }
}

fn removed_or(rows: u64, done: &str, missing: &str) -> ApiResult<HttpResponse> {
    if rows == 0 {
        return Err(ApiError::BadRequest(missing.to_string()));
    }
    Ok(HttpResponse::Ok().json(MessageResponse::new(done)))
}

#[utoipa::path(
    post,
    path = "/api/social-media/posts/{slug}/like",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 201, description = "Post liked", body = MessageResponse),
        (status = 400, description = "Already liked"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn like_post(
    path: web::Path<String>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    let result = post_like::ActiveModel {
        post_id: Set(post.id),
        user_id: Set(user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map(|_| ());
    created_or(
        result,
        "Post liked successfully",
        "You have already liked this post",
    )
}

#[utoipa::path(
    delete,
    path = "/api/social-media/posts/{slug}/like",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 200, description = "Like removed", body = MessageResponse),
        (status = 400, description = "Post was not liked"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn unlike_post(
    path: web::Path<String>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    let deleted = post_like::Entity::delete_many()
        .filter(post_like::Column::PostId.eq(post.id))
        .filter(post_like::Column::UserId.eq(user.user_id))
        .exec(pool.get_ref())
        .await?;
    removed_or(
        deleted.rows_affected,
        "Post unliked successfully",
        "You have not liked this post",
    )
}

#[utoipa::path(
    post,
    path = "/api/social-media/posts/{slug}/save",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 201, description = "Post saved", body = MessageResponse),
        (status = 400, description = "Already saved"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn save_post(
    path: web::Path<String>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    let result = post_saved::ActiveModel {
        post_id: Set(post.id),
        user_id: Set(user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map(|_| ());
    created_or(
        result,
        "Post saved successfully",
        "You have already saved this post",
    )
}

#[utoipa::path(
    delete,
    path = "/api/social-media/posts/{slug}/save",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 200, description = "Post removed from saved", body = MessageResponse),
        (status = 400, description = "Post was not saved"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn unsave_post(
    path: web::Path<String>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    let deleted = post_saved::Entity::delete_many()
        .filter(post_saved::Column::PostId.eq(post.id))
        .filter(post_saved::Column::UserId.eq(user.user_id))
        .exec(pool.get_ref())
        .await?;
    removed_or(
        deleted.rows_affected,
        "Post unsaved successfully",
        "You have not saved this post",
    )
}

#[utoipa::path(
    post,
    path = "/api/social-media/posts/{slug}/view",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 201, description = "View recorded", body = MessageResponse),
        (status = 400, description = "Already viewed"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn view_post(
    path: web::Path<String>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    if !record_view(pool.get_ref(), post.id, user.user_id).await? {
        return Err(ApiError::BadRequest(
            "You have already viewed this post".to_string(),
        ));
    }
    Ok(HttpResponse::Created().json(MessageResponse::new("Post view recorded successfully")))
}

#[utoipa::path(
    post,
    path = "/api/social-media/posts/{slug}/comments/{comment_id}/like",
    params(
        ("slug" = String, Path, description = "Post slug"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 201, description = "Comment liked", body = MessageResponse),
        (status = 400, description = "Already liked"),
        (status = 404, description = "Post or comment not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn like_comment(
    path: web::Path<(String, i64)>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &slug).await?;
    let comment = find_comment(&pool, post.id, comment_id).await?;
    let result = post_comment_like::ActiveModel {
        comment_id: Set(comment.id),
        user_id: Set(user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map(|_| ());
    created_or(
        result,
        "Comment liked successfully",
        "You have already liked this comment",
    )
}

#[utoipa::path(
    delete,
    path = "/api/social-media/posts/{slug}/comments/{comment_id}/like",
    params(
        ("slug" = String, Path, description = "Post slug"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Like removed", body = MessageResponse),
        (status = 400, description = "Comment was not liked"),
        (status = 404, description = "Post or comment not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn unlike_comment(
    path: web::Path<(String, i64)>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &slug).await?;
    let comment = find_comment(&pool, post.id, comment_id).await?;
    let deleted = post_comment_like::Entity::delete_many()
        .filter(post_comment_like::Column::CommentId.eq(comment.id))
        .filter(post_comment_like::Column::UserId.eq(user.user_id))
        .exec(pool.get_ref())
        .await?;
    removed_or(
        deleted.rows_affected,
        "Comment unliked successfully",
        "You have not liked this comment",
    )
}
