use super::location::Locations;
use super::{or_discard, store_upload};
use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::entities::vendor::{self, ReviewStatus, VendorType};
use crate::entities::{city, district, province, user};
use crate::error::{unique_or, ApiError, ApiResult, Validator};
use crate::jobs::{dispatch, JobQueue};
use crate::models::{
    CreateVendorRequest, ReviewVendorRequest, UpdateVendorRequest, VendorQuery, VendorResponse,
};
use crate::pagination::{self, paginate, CursorParams, VendorPage};
use crate::services::storage::{FileStorage, UploadedFile};
use crate::services::vendor_review::{
    after_vendor_save, check_required_documents, record_history, VendorDocuments,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, Order,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use std::collections::HashMap;

const LOGO_DIR: &str = "vendors/logos";
const ID_CARD_DIR: &str = "vendors/individual";
const NIB_DIR: &str = "vendors/company/nib";

async fn vendor_responses(
    db: &DbPool,
    storage: &FileStorage,
    vendors: Vec<vendor::Model>,
) -> ApiResult<Vec<VendorResponse>> {
    if vendors.is_empty() {
        return Ok(Vec::new());
    }
    let usernames: HashMap<i64, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(vendors.iter().map(|v| v.user_id)))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();
    let district_ids: Vec<i64> = vendors.iter().filter_map(|v| v.district_id).collect();
    let districts: HashMap<i64, district::Model> = if district_ids.is_empty() {
        HashMap::new()
    } else {
        district::Entity::find()
            .filter(district::Column::Id.is_in(district_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect()
    };
    let mut city_ids: Vec<i64> = vendors.iter().filter_map(|v| v.city_id).collect();
    city_ids.extend(districts.values().map(|d| d.city_id));
    let locations = Locations::load(
        db,
        vendors.iter().filter_map(|v| v.province_id).collect(),
        city_ids,
    )
    .await?;

    Ok(vendors
        .into_iter()
        .map(|v| VendorResponse {
            user: usernames.get(&v.user_id).cloned().unwrap_or_default(),
            vendor_type_display: v.vendor_type.display().to_string(),
            logo: storage.url(&v.logo),
            id_card_photo: storage.url(&v.id_card_photo),
            business_nib: storage.url(&v.business_nib),
            province: v.province_id.and_then(|id| locations.province(id)),
            city: v.city_id.and_then(|id| locations.city(id)),
            district: v
                .district_id
                .and_then(|id| districts.get(&id).cloned())
                .and_then(|d| locations.district(d)),
            review_status_display: v.review_status.display().to_string(),
            id: v.id,
            name: v.name,
            vendor_type: v.vendor_type,
            phone_number: v.phone_number,
            address: v.address,
            full_name: v.full_name,
            business_name: v.business_name,
            business_number: v.business_number,
            npwp: v.npwp,
            latitude: v.latitude,
            longitude: v.longitude,
            address_detail: v.address_detail,
            postal_code: v.postal_code,
            review_status: v.review_status,
            review_notes: v.review_notes,
            created_at: v.created_at,
            updated_at: v.updated_at,
        })
        .collect())
}

async fn vendor_response(
    db: &DbPool,
    storage: &FileStorage,
    vendor: vendor::Model,
) -> ApiResult<VendorResponse> {
    vendor_responses(db, storage, vec![vendor])
        .await?
        .pop()
        .ok_or_else(ApiError::not_found)
}

/// Checks that the referenced locations exist and nest inside each other.
async fn check_location(
    db: &DbPool,
    errors: &mut Validator,
    province_id: Option<i64>,
    city_id: Option<i64>,
    district_id: Option<i64>,
) -> ApiResult<()> {
    if let Some(id) = province_id {
        let found = province::Entity::find_by_id(id).one(db).await?;
        errors.check(found.is_some(), "province", "Province does not exist.");
    }
    if let Some(id) = city_id {
        match city::Entity::find_by_id(id).one(db).await? {
            Some(c) if province_id.is_some_and(|p| p != c.province_id) => {
                errors.add("city", "City must belong to the selected province.")
            }
            Some(_) => {}
            None => errors.add("city", "City does not exist."),
        }
    }
    if let Some(id) = district_id {
        match district::Entity::find_by_id(id).one(db).await? {
            Some(d) if city_id.is_some_and(|c| c != d.city_id) => {
                errors.add("district", "District must belong to the selected city.")
            }
            Some(_) => {}
            None => errors.add("district", "District does not exist."),
        }
    }
    Ok(())
}

fn check_contact(errors: &mut Validator, name: &str, phone_number: &str, address: &str) {
    errors.check(!name.trim().is_empty(), "name", "This field may not be blank.");
    errors.check(
        !phone_number.trim().is_empty(),
        "phone_number",
        "This field may not be blank.",
    );
    errors.check(!address.trim().is_empty(), "address", "This field may not be blank.");
}

/// Stores an optional document, recording the written path in `stored`.
async fn store_optional(
    storage: &FileStorage,
    dir: &str,
    field: &str,
    file: Option<&UploadedFile>,
    stored: &mut Vec<String>,
) -> ApiResult<Option<String>> {
    let Some(file) = file else {
        return Ok(None);
    };
    let path = store_upload(storage, dir, field, file).await?;
    stored.push(path.clone());
    Ok(Some(path))
}

/// Stores the logo, identity card and NIB uploads of a vendor form.
async fn store_documents(
    storage: &FileStorage,
    logo: Option<&UploadedFile>,
    id_card: Option<&UploadedFile>,
    nib: Option<&UploadedFile>,
) -> ApiResult<(Vec<String>, [Option<String>; 3])> {
    let mut stored = Vec::new();
    let written = async {
        let logo = store_optional(storage, LOGO_DIR, "logo", logo, &mut stored).await?;
        let id_card =
            store_optional(storage, ID_CARD_DIR, "id_card_photo", id_card, &mut stored).await?;
        let nib = store_optional(storage, NIB_DIR, "business_nib", nib, &mut stored).await?;
        Ok::<_, ApiError>([logo, id_card, nib])
    }
    .await;
    let written = or_discard(storage, &stored, written).await?;
    Ok((stored, written))
}

fn upload_name(file: &Option<UploadedFile>) -> &str {
    file.as_ref().map(|f| f.filename.as_str()).unwrap_or("")
}

async fn find_my_vendor(db: &DbPool, user_id: i64) -> ApiResult<vendor::Model> {
    vendor::Entity::find()
        .filter(vendor::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not have a vendor profile.".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/vendors",
    params(CursorParams, VendorQuery),
    responses(
        (status = 200, description = "Vendors, newest first", body = VendorPage),
        (status = 403, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn list_vendors(
    _user: AuthenticatedUser,
    query: web::Query<VendorQuery>,
    page: web::Query<CursorParams>,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let mut select = vendor::Entity::find();
    if let Some(vendor_type) = query.vendor_type {
        select = select.filter(vendor::Column::VendorType.eq(vendor_type));
    }
    if let Some(review_status) = query.review_status {
        select = select.filter(vendor::Column::ReviewStatus.eq(review_status));
    }
    if let Some(province_id) = query.province {
        select = select.filter(vendor::Column::ProvinceId.eq(province_id));
    }
    if let Some(city_id) = query.city {
        select = select.filter(vendor::Column::CityId.eq(city_id));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(vendor::Column::Name.contains(search))
                .add(vendor::Column::BusinessName.contains(search))
                .add(vendor::Column::FullName.contains(search)),
        );
    }

    let found = paginate(
        pool.get_ref(),
        select,
        vendor::Column::CreatedAt,
        vendor::Column::Id,
        Order::Desc,
        &page,
        pagination::CATALOG,
    )
    .await?;
    let results = vendor_responses(&pool, &storage, found.results).await?;
    Ok(HttpResponse::Ok().json(VendorPage {
        next: found.next,
        previous: found.previous,
        results,
    }))
}

async fn create_vendor(
    vendor_type: VendorType,
    req: CreateVendorRequest,
    user: AuthenticatedUser,
    pool: &DbPool,
    storage: &FileStorage,
    queue: &dyn JobQueue,
) -> ApiResult<HttpResponse> {
    let existing = vendor::Entity::find()
        .filter(vendor::Column::UserId.eq(user.user_id))
        .count(pool)
        .await?;
    if existing > 0 {
        return Err(ApiError::BadRequest(
            "User already has a vendor profile.".to_string(),
        ));
    }

    let mut errors = Validator::new();
    check_contact(&mut errors, &req.name, &req.phone_number, &req.address);
    check_required_documents(
        &mut errors,
        vendor_type,
        &VendorDocuments {
            full_name: &req.full_name,
            id_card_photo: upload_name(&req.id_card_photo),
            business_name: &req.business_name,
            business_number: &req.business_number,
            business_nib: upload_name(&req.business_nib),
            npwp: &req.npwp,
        },
    );
    check_location(pool, &mut errors, req.province, req.city, req.district).await?;
    errors.finish()?;

    let (stored, [logo, id_card, nib]) = store_documents(
        storage,
        req.logo.as_ref(),
        req.id_card_photo.as_ref(),
        req.business_nib.as_ref(),
    )
    .await?;

    let now = Utc::now();
    let saved = async {
        let txn = pool.begin().await?;
        let created = vendor::ActiveModel {
            user_id: Set(user.user_id),
            vendor_type: Set(vendor_type),
            review_status: Set(ReviewStatus::Pending),
            review_notes: Set(None),
            full_name: Set(req.full_name),
            id_card_photo: Set(id_card.unwrap_or_default()),
            business_name: Set(req.business_name),
            business_number: Set(req.business_number),
            business_nib: Set(nib.unwrap_or_default()),
            npwp: Set(req.npwp),
            name: Set(req.name),
            logo: Set(logo.unwrap_or_default()),
            address: Set(req.address),
            phone_number: Set(req.phone_number),
            province_id: Set(req.province),
            city_id: Set(req.city),
            district_id: Set(req.district),
            latitude: Set(req.latitude),
            longitude: Set(req.longitude),
            address_detail: Set(req.address_detail),
            postal_code: Set(req.postal_code),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| unique_or(e, "User already has a vendor profile."))?;
        record_history(&txn, &created, true, Some(user.user_id)).await?;
        let job = after_vendor_save(&txn, &created, true, false).await?;
        txn.commit().await?;
        Ok::<_, ApiError>((created, job))
    }
    .await;
    let (created, job) = or_discard(storage, &stored, saved).await?;

    log::info!(
        "User {} applied as {} vendor {}",
        user.user_id,
        vendor_type.display(),
        created.id
    );
    dispatch(queue, job.into_iter().collect()).await;

    let body = vendor_response(pool, storage, created).await?;
    Ok(HttpResponse::Created().json(body))
}

#[utoipa::path(
    post,
    path = "/api/vendors/create/individual",
    request_body = CreateVendorRequest,
    responses(
        (status = 201, description = "Individual vendor created pending review", body = VendorResponse),
        (status = 400, description = "Validation failed or vendor already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn create_individual_vendor(
    req: web::Json<CreateVendorRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    create_vendor(
        VendorType::Individual,
        req.into_inner(),
        user,
        &pool,
        &storage,
        queue.get_ref(),
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/vendors/create/company",
    request_body = CreateVendorRequest,
    responses(
        (status = 201, description = "Company vendor created pending review", body = VendorResponse),
        (status = 400, description = "Validation failed or vendor already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn create_company_vendor(
    req: web::Json<CreateVendorRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    create_vendor(
        VendorType::Company,
        req.into_inner(),
        user,
        &pool,
        &storage,
        queue.get_ref(),
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/vendors/{vendor_id}",
    params(
        ("vendor_id" = i64, Path, description = "Vendor id")
    ),
    responses(
        (status = 200, description = "Vendor detail", body = VendorResponse),
        (status = 404, description = "Vendor not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn get_vendor(
    path: web::Path<i64>,
    _user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let found = vendor::Entity::find_by_id(path.into_inner())
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(vendor_response(&pool, &storage, found).await?))
}

#[utoipa::path(
    get,
    path = "/api/vendors/me",
    responses(
        (status = 200, description = "The caller's vendor profile", body = VendorResponse),
        (status = 404, description = "Caller has no vendor profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn my_vendor(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let found = find_my_vendor(&pool, user.user_id).await?;
    Ok(HttpResponse::Ok().json(vendor_response(&pool, &storage, found).await?))
}

#[utoipa::path(
    patch,
    path = "/api/vendors/me",
    request_body = UpdateVendorRequest,
    responses(
        (status = 200, description = "Updated vendor profile", body = VendorResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Caller has no vendor profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn update_my_vendor(
    req: web::Json<UpdateVendorRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let existing = find_my_vendor(&pool, user.user_id).await?;
    let req = req.into_inner();

    let name = req.name.clone().unwrap_or_else(|| existing.name.clone());
    let phone_number = req
        .phone_number
        .clone()
        .unwrap_or_else(|| existing.phone_number.clone());
    let address = req.address.clone().unwrap_or_else(|| existing.address.clone());
    let full_name = req.full_name.clone().unwrap_or_else(|| existing.full_name.clone());
    let business_name = req
        .business_name
        .clone()
        .unwrap_or_else(|| existing.business_name.clone());
    let business_number = req
        .business_number
        .clone()
        .unwrap_or_else(|| existing.business_number.clone());
    let npwp = req.npwp.clone().unwrap_or_else(|| existing.npwp.clone());
    let province_id = req.province.or(existing.province_id);
    let city_id = req.city.or(existing.city_id);
    let district_id = req.district.or(existing.district_id);

    let mut errors = Validator::new();
    check_contact(&mut errors, &name, &phone_number, &address);
    check_required_documents(
        &mut errors,
        existing.vendor_type,
        &VendorDocuments {
            full_name: &full_name,
            id_card_photo: req
                .id_card_photo
                .as_ref()
                .map(|f| f.filename.as_str())
                .unwrap_or(&existing.id_card_photo),
            business_name: &business_name,
            business_number: &business_number,
            business_nib: req
                .business_nib
                .as_ref()
                .map(|f| f.filename.as_str())
                .unwrap_or(&existing.business_nib),
            npwp: &npwp,
        },
    );
    check_location(&pool, &mut errors, province_id, city_id, district_id).await?;
    errors.finish()?;

    let (stored, [logo, id_card, nib]) = store_documents(
        &storage,
        req.logo.as_ref(),
        req.id_card_photo.as_ref(),
        req.business_nib.as_ref(),
    )
    .await?;

    let mut replaced = Vec::new();
    let mut active = existing.clone().into_active_model();
    active.name = Set(name);
    active.phone_number = Set(phone_number);
    active.address = Set(address);
    active.full_name = Set(full_name);
    active.business_name = Set(business_name);
    active.business_number = Set(business_number);
    active.npwp = Set(npwp);
    active.province_id = Set(province_id);
    active.city_id = Set(city_id);
    active.district_id = Set(district_id);
    if let Some(path) = logo {
        replaced.push(existing.logo.clone());
        active.logo = Set(path);
    }
    if let Some(path) = id_card {
        replaced.push(existing.id_card_photo.clone());
        active.id_card_photo = Set(path);
    }
    if let Some(path) = nib {
        replaced.push(existing.business_nib.clone());
        active.business_nib = Set(path);
    }
    if let Some(latitude) = req.latitude {
        active.latitude = Set(latitude);
    }
    if let Some(longitude) = req.longitude {
        active.longitude = Set(longitude);
    }
    if let Some(detail) = req.address_detail {
        active.address_detail = Set(detail);
    }
    if let Some(postal_code) = req.postal_code {
        active.postal_code = Set(postal_code);
    }
    active.updated_at = Set(Utc::now());

    let saved = async {
        let txn = pool.begin().await?;
        let updated = active.update(&txn).await?;
        record_history(&txn, &updated, false, Some(user.user_id)).await?;
        let job = after_vendor_save(&txn, &updated, false, false).await?;
        txn.commit().await?;
        Ok::<_, ApiError>((updated, job))
    }
    .await;
    let (updated, job) = or_discard(&storage, &stored, saved).await?;

    for path in replaced {
        storage.delete(&path).await;
    }
    dispatch(queue.get_ref(), job.into_iter().collect()).await;

    Ok(HttpResponse::Ok().json(vendor_response(&pool, &storage, updated).await?))
}

#[utoipa::path(
    patch,
    path = "/api/vendors/{vendor_id}/review",
    params(
        ("vendor_id" = i64, Path, description = "Vendor id")
    ),
    request_body = ReviewVendorRequest,
    responses(
        (status = 200, description = "Review status recorded", body = VendorResponse),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Vendor not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "vendors"
)]
pub async fn review_vendor(
    path: web::Path<i64>,
    req: web::Json<ReviewVendorRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    queue: web::Data<dyn JobQueue>,
) -> ApiResult<HttpResponse> {
    let staff = user.require_staff(&pool).await?;
    let existing = vendor::Entity::find_by_id(path.into_inner())
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;
    let req = req.into_inner();

    let mut active = existing.into_active_model();
    active.review_status = Set(req.review_status);
    if req.review_notes.is_some() {
        active.review_notes = Set(req.review_notes);
    }
    active.updated_at = Set(Utc::now());

    let txn = pool.begin().await?;
    let updated = active.update(&txn).await?;
    record_history(&txn, &updated, false, Some(staff.id)).await?;
    let job = after_vendor_save(&txn, &updated, false, true).await?;
    txn.commit().await?;

    log::info!(
        "Staff {} set vendor {} review status to {}",
        staff.id,
        updated.id,
        updated.review_status.as_str()
    );
    dispatch(queue.get_ref(), job.into_iter().collect()).await;

    Ok(HttpResponse::Ok().json(vendor_response(&pool, &storage, updated).await?))
}
