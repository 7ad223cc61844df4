use super::{count_by, or_discard, store_uploads, summary_of, user_summaries};
use crate::auth::{random_slug, AuthenticatedUser, MaybeUser};
use crate::db::DbPool;
use crate::entities::post::{self, Privacy};
use crate::entities::{post_comment, post_image, post_like, post_saved, post_view, profile};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{dispatch, Job, JobQueue};
use crate::models::{
    CreatePostRequest, ImageResponse, PostQuery, PostResponse, UpdatePostRequest,
    MAX_POST_IMAGES,
};
use crate::pagination::{self, paginate, CursorParams, PostPage};
use crate::services::posts::{after_post_save, PostField, PostSave};
use crate::services::storage::FileStorage;
use crate::services::visibility::{find_visible_post, visible_posts_condition};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Order,
    PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

const SLUG_LENGTH: usize = 10;

fn parse_privacy(value: Option<&str>) -> ApiResult<Option<Privacy>> {
    match value {
        None => Ok(None),
        Some(raw) => Privacy::parse(raw).map(Some).ok_or_else(|| {
            ApiError::field(
                "privacy",
                "Invalid privacy option. Valid choices are: public, friends, only_me",
            )
        }),
    }
}

async fn unused_slug<C: ConnectionTrait>(db: &C) -> ApiResult<String> {
    loop {
        let slug = random_slug(SLUG_LENGTH);
        let taken = post::Entity::find()
            .filter(post::Column::Slug.eq(slug.as_str()))
            .count(db)
            .await?;
        if taken == 0 {
            return Ok(slug);
        }
    }
}

async fn user_set<E: EntityTrait>(
    db: &DbPool,
    viewer: Option<i64>,
    post_col: E::Column,
    user_col: E::Column,
    ids: &[i64],
) -> ApiResult<HashSet<i64>> {
    let Some(viewer_id) = viewer else {
        return Ok(HashSet::new());
    };
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let found: Vec<i64> = E::find()
        .select_only()
        .column(post_col)
        .filter(post_col.is_in(ids.iter().copied()))
        .filter(user_col.eq(viewer_id))
        .into_tuple()
        .all(db)
        .await?;
    Ok(found.into_iter().collect())
}

/// Serializes posts with their images, counters and the viewer's reactions.
pub(crate) async fn post_responses(
    db: &DbPool,
    storage: &FileStorage,
    posts: Vec<post::Model>,
    viewer: Option<i64>,
) -> ApiResult<Vec<PostResponse>> {
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

    let mut images: HashMap<i64, Vec<ImageResponse>> = HashMap::new();
    if !ids.is_empty() {
        for image in post_image::Entity::find()
            .filter(post_image::Column::PostId.is_in(ids.clone()))
            .all(db)
            .await?
        {
            images.entry(image.post_id).or_default().push(ImageResponse {
                id: image.id,
                image: storage.url(&image.image),
            });
        }
    }

    let views = count_by::<post_view::Entity>(db, post_view::Column::PostId, &ids).await?;
    let likes = count_by::<post_like::Entity>(db, post_like::Column::PostId, &ids).await?;
    let comments =
        count_by::<post_comment::Entity>(db, post_comment::Column::PostId, &ids).await?;
    let liked = user_set::<post_like::Entity>(
        db,
        viewer,
        post_like::Column::PostId,
        post_like::Column::UserId,
        &ids,
    )
    .await?;
    let saved = user_set::<post_saved::Entity>(
        db,
        viewer,
        post_saved::Column::PostId,
        post_saved::Column::UserId,
        &ids,
    )
    .await?;
    let authors = user_summaries(db, posts.iter().map(|p| p.user_id).collect()).await?;

    Ok(posts
        .into_iter()
        .map(|p| PostResponse {
            images: images.remove(&p.id).unwrap_or_default(),
            views_count: views.get(&p.id).copied().unwrap_or(0),
            likes_count: likes.get(&p.id).copied().unwrap_or(0),
            is_liked: liked.contains(&p.id),
            is_saved: saved.contains(&p.id),
            comments_count: comments.get(&p.id).copied().unwrap_or(0),
            user: summary_of(&authors, p.user_id),
            slug: p.slug,
            content: p.content,
            privacy: p.privacy,
            shared_count: p.shared_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect())
}

async fn post_response(
    db: &DbPool,
    storage: &FileStorage,
    post: post::Model,
    viewer: Option<i64>,
) -> ApiResult<PostResponse> {
    post_responses(db, storage, vec![post], viewer)
        .await?
        .pop()
        .ok_or_else(ApiError::not_found)
}

#[utoipa::path(
    get,
    path = "/api/social-media/posts",
    params(CursorParams, PostQuery),
    responses(
        (status = 200, description = "Posts visible to the caller, newest first", body = PostPage)
    ),
    tag = "social_media"
)]
pub async fn list_posts(
    viewer: MaybeUser,
    query: web::Query<PostQuery>,
    page: web::Query<CursorParams>,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let mut select = post::Entity::find()
        .filter(visible_posts_condition(pool.get_ref(), viewer.user_id()).await?);
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(post::Column::Content.contains(search));
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(post::Column::UserId.eq(user_id));
    }
    if let Some(profile_id) = query.profile_id {
        let owner = profile::Entity::find_by_id(profile_id)
            .one(pool.get_ref())
            .await?
            .map(|p| p.user_id)
            .unwrap_or(-1);
        select = select.filter(post::Column::UserId.eq(owner));
    }

    let found = paginate(
        pool.get_ref(),
        select,
        post::Column::CreatedAt,
        post::Column::Id,
        Order::Desc,
        &page,
        pagination::POSTS,
    )
    .await?;
    let results = post_responses(&pool, &storage, found.results, viewer.user_id()).await?;

    Ok(HttpResponse::Ok().json(PostPage {
        next: found.next,
        previous: found.previous,
        results,
    }))
}

#[utoipa::path(
    post,
    path = "/api/social-media/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created, moderation scheduled", body = PostResponse),
        (status = 400, description = "Invalid privacy or too many images"),
        (status = 403, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn create_post(
    req: web::Json<CreatePostRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let req = req.into_inner();
    let privacy = parse_privacy(req.privacy.as_deref())?.unwrap_or(Privacy::Public);
    if req.images.len() > MAX_POST_IMAGES {
        return Err(ApiError::field(
            "images",
            "You can only upload a maximum of 10 images.",
        ));
    }

    let stored = store_uploads(&storage, "post_images", "images", &req.images).await?;

    let now = Utc::now();
    let saved = async {
        let txn = pool.begin().await?;
        let created = post::ActiveModel {
            user_id: Set(user.user_id),
            slug: Set(unused_slug(&txn).await?),
            content: Set(req.content.clone()),
            privacy: Set(privacy),
            shared_count: Set(0),
            is_potentially_harmful: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        for path in &stored {
            post_image::ActiveModel {
                post_id: Set(created.id),
                image: Set(path.clone()),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        let job = after_post_save(
            created.id,
            &PostSave {
                created: true,
                touched: &[],
                old_content: "",
                new_content: &created.content,
            },
        );
        txn.commit().await?;
        Ok::<_, ApiError>((created, job))
    }
    .await;
    let (created, job) = or_discard(&storage, &stored, saved).await?;

    log::info!("User {} created post {}", user.user_id, created.slug);
    dispatch(queue.get_ref(), job.into_iter().collect()).await;

    let response = post_response(&pool, &storage, created, Some(user.user_id)).await?;
    Ok(HttpResponse::Created().json(response))
}

#[utoipa::path(
    get,
    path = "/api/social-media/posts/{slug}",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 200, description = "Post detail", body = PostResponse),
        (status = 404, description = "Missing, hidden by privacy or flagged by moderation")
    ),
    tag = "social_media"
)]
pub async fn get_post(
    path: web::Path<String>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), viewer.user_id(), &path).await?;
    if let Some(user_id) = viewer.user_id() {
        dispatch(
            queue.get_ref(),
            vec![Job::RecordPostView {
                post_id: post.id,
                user_id,
            }],
        )
        .await;
    }
    let response = post_response(&pool, &storage, post, viewer.user_id()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Loads a post the caller can see and insists they wrote it.
async fn owned_post(
    pool: &DbPool,
    user: AuthenticatedUser,
    slug: &str,
    denied: &str,
) -> ApiResult<post::Model> {
    let post = find_visible_post(pool, Some(user.user_id), slug).await?;
    if post.user_id != user.user_id {
        return Err(ApiError::Forbidden(denied.to_string()));
    }
    Ok(post)
}

#[utoipa::path(
    patch,
    path = "/api/social-media/posts/{slug}",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post", body = PostResponse),
        (status = 400, description = "Invalid privacy or image changes"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn update_post(
    path: web::Path<String>,
    req: web::Json<UpdatePostRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let req = req.into_inner();
    let existing = owned_post(
        &pool,
        user,
        &path,
        "You do not have permission to update this post.",
    )
    .await?;
    let privacy = parse_privacy(req.privacy.as_deref())?;

    let current: Vec<post_image::Model> = post_image::Entity::find()
        .filter(post_image::Column::PostId.eq(existing.id))
        .all(pool.get_ref())
        .await?;
    let owned_ids: HashSet<i64> = current.iter().map(|i| i.id).collect();
    let mut invalid: Vec<i64> = req
        .delete_image_ids
        .iter()
        .copied()
        .filter(|id| !owned_ids.contains(id))
        .collect();
    if !invalid.is_empty() {
        invalid.sort_unstable();
        return Err(ApiError::field(
            "delete_image_ids",
            format!(
                "Invalid image IDs: {:?}. These images don't belong to this post.",
                invalid
            ),
        ));
    }
    if req.images.len() > MAX_POST_IMAGES {
        return Err(ApiError::field(
            "images",
            "You can only upload a maximum of 10 images.",
        ));
    }
    let deleting: HashSet<i64> = req.delete_image_ids.iter().copied().collect();
    if current.len() - deleting.len() + req.images.len() > MAX_POST_IMAGES {
        return Err(ApiError::field(
            "images",
            format!(
                "Total images cannot exceed {}. Current: {}, Adding: {}, Deleting: {}",
                MAX_POST_IMAGES,
                current.len(),
                req.images.len(),
                deleting.len()
            ),
        ));
    }

    let stored = store_uploads(&storage, "post_images", "images", &req.images).await?;

    let mut touched = Vec::new();
    let old_content = existing.content.clone();
    let mut active = existing.clone().into_active_model();
    if let Some(content) = req.content.as_ref().filter(|c| **c != existing.content) {
        active.content = Set(content.clone());
        touched.push(PostField::Content);
    }
    if let Some(privacy) = privacy.filter(|p| *p != existing.privacy) {
        active.privacy = Set(privacy);
        touched.push(PostField::Privacy);
    }

    let now = Utc::now();
    let saved = async {
        let txn = pool.begin().await?;
        let updated = if touched.is_empty() {
            existing
        } else {
            active.updated_at = Set(now);
            active.update(&txn).await?
        };
        if !deleting.is_empty() {
            post_image::Entity::delete_many()
                .filter(post_image::Column::Id.is_in(deleting.iter().copied()))
                .exec(&txn)
                .await?;
        }
        for path in &stored {
            post_image::ActiveModel {
                post_id: Set(updated.id),
                image: Set(path.clone()),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        let job = after_post_save(
            updated.id,
            &PostSave {
                created: false,
                touched: &touched,
                old_content: &old_content,
                new_content: &updated.content,
            },
        );
        txn.commit().await?;
        Ok::<_, ApiError>((updated, job))
    }
    .await;
    let (updated, job) = or_discard(&storage, &stored, saved).await?;

    for image in current.iter().filter(|i| deleting.contains(&i.id)) {
        storage.delete(&image.image).await;
    }
    dispatch(queue.get_ref(), job.into_iter().collect()).await;

    let response = post_response(&pool, &storage, updated, Some(user.user_id)).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    delete,
    path = "/api/social-media/posts/{slug}",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn delete_post(
    path: web::Path<String>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let post = owned_post(
        &pool,
        user,
        &path,
        "You do not have permission to delete this post.",
    )
    .await?;
    let images = post_image::Entity::find()
        .filter(post_image::Column::PostId.eq(post.id))
        .all(pool.get_ref())
        .await?;

    post::Entity::delete_by_id(post.id)
        .exec(pool.get_ref())
        .await?;
    for image in images {
        storage.delete(&image.image).await;
    }
    log::info!("User {} deleted post {}", user.user_id, post.slug);

    Ok(HttpResponse::NoContent().finish())
}
