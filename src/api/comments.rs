use super::{count_by, summary_of, user_summaries};
use crate::auth::{AuthenticatedUser, MaybeUser};
use crate::db::DbPool;
use crate::entities::{post, post_comment, post_comment_like};
use crate::error::{ApiError, ApiResult, Validator};
use crate::models::{CommentRequest, CommentResponse, UpdateCommentRequest};
use crate::pagination::{self, paginate, CommentPage, CursorParams};
use crate::services::visibility::{can_view, find_visible_post};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, Order, QueryFilter, QuerySelect,
    Select, Set,
};
use std::collections::HashSet;

/// Loads a comment, answering 404 unless it belongs to the post.
pub(crate) async fn find_comment(
    db: &DbPool,
    post_id: i64,
    comment_id: i64,
) -> ApiResult<post_comment::Model> {
    post_comment::Entity::find_by_id(comment_id)
        .filter(post_comment::Column::PostId.eq(post_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))
}

async fn comment_responses(
    db: &DbPool,
    slug: &str,
    comments: Vec<post_comment::Model>,
    viewer: Option<i64>,
) -> ApiResult<Vec<CommentResponse>> {
    let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    let likes =
        count_by::<post_comment_like::Entity>(db, post_comment_like::Column::CommentId, &ids)
            .await?;
    let replies =
        count_by::<post_comment::Entity>(db, post_comment::Column::ParentId, &ids).await?;
    let liked: HashSet<i64> = match viewer {
        Some(user_id) if !ids.is_empty() => post_comment_like::Entity::find()
            .select_only()
            .column(post_comment_like::Column::CommentId)
            .filter(post_comment_like::Column::CommentId.is_in(ids.clone()))
            .filter(post_comment_like::Column::UserId.eq(user_id))
            .into_tuple::<i64>()
            .all(db)
            .await?
            .into_iter()
            .collect(),
        _ => HashSet::new(),
    };
    let authors = user_summaries(db, comments.iter().map(|c| c.user_id).collect()).await?;

    Ok(comments
        .into_iter()
        .map(|c| CommentResponse {
            user: summary_of(&authors, c.user_id),
            likes_count: likes.get(&c.id).copied().unwrap_or(0),
            is_liked: liked.contains(&c.id),
            replies_count: replies.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            post: slug.to_string(),
            parent: c.parent_id,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

/// Comment listings stay empty on flagged posts instead of answering 404.
async fn listable_post(
    db: &DbPool,
    viewer: Option<i64>,
    slug: &str,
) -> ApiResult<Option<post::Model>> {
    let post = post::Entity::find()
        .filter(post::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(ApiError::not_found)?;
    if post.is_potentially_harmful {
        return Ok(None);
    }
    if !can_view(db, viewer, &post).await? {
        return Err(ApiError::not_found());
    }
    Ok(Some(post))
}

async fn comment_page(
    db: &DbPool,
    post: &post::Model,
    select: Select<post_comment::Entity>,
    params: &CursorParams,
    viewer: Option<i64>,
) -> ApiResult<CommentPage> {
    let found = paginate(
        db,
        select,
        post_comment::Column::CreatedAt,
        post_comment::Column::Id,
        Order::Asc,
        params,
        pagination::COMMENTS,
    )
    .await?;
    let results = comment_responses(db, &post.slug, found.results, viewer).await?;
    Ok(CommentPage {
        next: found.next,
        previous: found.previous,
        results,
    })
}

#[utoipa::path(
    get,
    path = "/api/social-media/posts/{slug}/comments",
    params(
        ("slug" = String, Path, description = "Post slug"),
        CursorParams
    ),
    responses(
        (status = 200, description = "Top-level comments, oldest first", body = CommentPage),
        (status = 404, description = "Post not found")
    ),
    tag = "social_media"
)]
pub async fn list_comments(
    path: web::Path<String>,
    page: web::Query<CursorParams>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let Some(post) = listable_post(&pool, viewer.user_id(), &path).await? else {
        return Ok(HttpResponse::Ok().json(CommentPage::empty()));
    };
    let select = post_comment::Entity::find()
        .filter(post_comment::Column::PostId.eq(post.id))
        .filter(post_comment::Column::ParentId.is_null());
    let body = comment_page(&pool, &post, select, &page, viewer.user_id()).await?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/social-media/posts/{slug}/comments/{comment_id}/replies",
    params(
        ("slug" = String, Path, description = "Post slug"),
        ("comment_id" = i64, Path, description = "Parent comment id"),
        CursorParams
    ),
    responses(
        (status = 200, description = "Replies to the comment, oldest first", body = CommentPage),
        (status = 404, description = "Post or comment not found")
    ),
    tag = "social_media"
)]
pub async fn list_replies(
    path: web::Path<(String, i64)>,
    page: web::Query<CursorParams>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let Some(post) = listable_post(&pool, viewer.user_id(), &slug).await? else {
        return Ok(HttpResponse::Ok().json(CommentPage::empty()));
    };
    let parent = find_comment(&pool, post.id, comment_id).await?;
    let select =
        post_comment::Entity::find().filter(post_comment::Column::ParentId.eq(parent.id));
    let body = comment_page(&pool, &post, select, &page, viewer.user_id()).await?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    post,
    path = "/api/social-media/posts/{slug}/comments",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Empty content or invalid parent"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn create_comment(
    path: web::Path<String>,
    req: web::Json<CommentRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    let content = req.content.trim();

    let mut errors = Validator::new();
    errors.check(!content.is_empty(), "content", "This field may not be blank.");
    if let Some(parent_id) = req.parent {
        let parent = post_comment::Entity::find_by_id(parent_id)
            .one(pool.get_ref())
            .await?;
        match parent {
            Some(p) if p.post_id != post.id => {
                errors.add("parent", "Parent comment must belong to the same post.")
            }
            Some(p) if p.parent_id.is_some() => {
                errors.add("parent", "Replies cannot be nested more than one level.")
            }
            Some(_) => {}
            None => errors.add("parent", "Parent comment does not exist."),
        }
    }
    errors.finish()?;

    let now = Utc::now();
    let comment = post_comment::ActiveModel {
        post_id: Set(post.id),
        user_id: Set(user.user_id),
        content: Set(content.to_string()),
        parent_id: Set(req.parent),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await?;

    let mut body = comment_responses(&pool, &post.slug, vec![comment], Some(user.user_id)).await?;
    let body = body.pop().ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Created().json(body))
}

#[utoipa::path(
    get,
    path = "/api/social-media/posts/{slug}/comments/{comment_id}",
    params(
        ("slug" = String, Path, description = "Post slug"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment detail", body = CommentResponse),
        (status = 404, description = "Post or comment not found")
    ),
    tag = "social_media"
)]
pub async fn get_comment(
    path: web::Path<(String, i64)>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let post = find_visible_post(pool.get_ref(), viewer.user_id(), &slug).await?;
    let comment = find_comment(&pool, post.id, comment_id).await?;
    let mut body = comment_responses(&pool, &post.slug, vec![comment], viewer.user_id()).await?;
    let body = body.pop().ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(body))
}

/// Comments are only visible for editing to their author.
async fn own_comment(
    pool: &DbPool,
    user: AuthenticatedUser,
    slug: &str,
    comment_id: i64,
) -> ApiResult<(post::Model, post_comment::Model)> {
    let post = find_visible_post(pool, Some(user.user_id), slug).await?;
    let comment = find_comment(pool, post.id, comment_id).await?;
    if comment.user_id != user.user_id {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }
    Ok((post, comment))
}

#[utoipa::path(
    patch,
    path = "/api/social-media/posts/{slug}/comments/{comment_id}",
    params(
        ("slug" = String, Path, description = "Post slug"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated comment", body = CommentResponse),
        (status = 400, description = "Empty content"),
        (status = 404, description = "Comment not found or not owned")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn update_comment(
    path: web::Path<(String, i64)>,
    req: web::Json<UpdateCommentRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let (post, comment) = own_comment(&pool, user, &slug, comment_id).await?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::field("content", "This field may not be blank."));
    }

    let mut active = comment.into_active_model();
    active.content = Set(content.to_string());
    active.updated_at = Set(Utc::now());
    let updated = active.update(pool.get_ref()).await?;

    let mut body = comment_responses(&pool, &post.slug, vec![updated], Some(user.user_id)).await?;
    let body = body.pop().ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    delete,
    path = "/api/social-media/posts/{slug}/comments/{comment_id}",
    params(
        ("slug" = String, Path, description = "Post slug"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 404, description = "Comment not found or not owned")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn delete_comment(
    path: web::Path<(String, i64)>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let (_, comment) = own_comment(&pool, user, &slug, comment_id).await?;
    post_comment::Entity::delete_by_id(comment.id)
        .exec(pool.get_ref())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
