use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::entities::report;
use crate::error::{unique_or, ApiError, ApiResult};
use crate::models::{ApproveReportRequest, ReportCreatedResponse, ReportRequest, ReportResponse};
use crate::pagination::{self, paginate, CursorParams};
use crate::services::visibility::find_visible_post;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Order, Set};

#[utoipa::path(
    post,
    path = "/api/social-media/posts/{slug}/report",
    params(
        ("slug" = String, Path, description = "Post slug")
    ),
    request_body = ReportRequest,
    responses(
        (status = 201, description = "Report submitted", body = ReportCreatedResponse),
        (status = 400, description = "Invalid reason or post already reported"),
        (status = 404, description = "Post not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn report_post(
    path: web::Path<String>,
    req: web::Json<ReportRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let post = find_visible_post(pool.get_ref(), Some(user.user_id), &path).await?;
    let req = req.into_inner();
    let now = Utc::now();

    let created = report::ActiveModel {
        post_id: Set(post.id),
        user_id: Set(user.user_id),
        reason: Set(req.reason),
        detail_reason: Set(req.detail_reason.filter(|d| !d.trim().is_empty())),
        restrict_user: Set(req.restrict_user),
        block_user: Set(req.block_user),
        is_approved: Set(false),
        approved_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map_err(|e| unique_or(e, "You have already reported this post"))?;

    log::info!(
        "User {} reported post {} ({})",
        user.user_id,
        post.slug,
        created.reason.display()
    );
    Ok(HttpResponse::Created().json(ReportCreatedResponse {
        message: format!("Report for post '{}' submitted successfully.", post.slug),
        report_id: created.id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/social-media/reports",
    params(CursorParams),
    responses(
        (status = 200, description = "All reports, newest first", body = ReportPage),
        (status = 403, description = "Staff only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn list_reports(
    page: web::Query<CursorParams>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    user.require_staff(&pool).await?;
    let found = paginate(
        pool.get_ref(),
        report::Entity::find(),
        report::Column::CreatedAt,
        report::Column::Id,
        Order::Desc,
        &page,
        pagination::POSTS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(found.map(ReportResponse::from)))
}

#[utoipa::path(
    patch,
    path = "/api/social-media/reports/{report_id}/approval",
    params(
        ("report_id" = i64, Path, description = "Report id")
    ),
    request_body = ApproveReportRequest,
    responses(
        (status = 200, description = "Report approval updated", body = ReportResponse),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Report not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "social_media"
)]
pub async fn approve_report(
    path: web::Path<i64>,
    req: web::Json<ApproveReportRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let staff = user.require_staff(&pool).await?;
    let existing = report::Entity::find_by_id(path.into_inner())
        .one(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))?;

    let mut active = existing.into_active_model();
    active.is_approved = Set(req.is_approved);
    active.approved_by = Set(req.is_approved.then_some(staff.id));
    active.updated_at = Set(Utc::now());
    let updated = active.update(pool.get_ref()).await?;

    log::info!(
        "Staff {} set report {} approval to {}",
        staff.id,
        updated.id,
        updated.is_approved
    );
    Ok(HttpResponse::Ok().json(ReportResponse::from(updated)))
}
