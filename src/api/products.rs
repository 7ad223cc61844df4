use super::{or_discard, store_uploads, summary_of, user_summaries};
use crate::auth::{AuthenticatedUser, MaybeUser};
use crate::db::DbPool;
use crate::entities::product::{self, ApprovalStatus, ProductStatus};
use crate::entities::vendor::{self, ReviewStatus};
use crate::entities::{category, product_image, product_price, subcategory, unit_of_measure};
use crate::error::{unique_or, ApiError, ApiResult, Validator};
use crate::models::{
    AddImagesRequest, ApproveProductRequest, CreatePriceRequest, CreateProductRequest,
    ProductImageResponse, ProductPriceResponse, ProductQuery, ProductResponse,
    RemoveImageRequest, UnitOfMeasureRef, UpdatePriceRequest, UpdateProductRequest,
    MAX_PRODUCT_IMAGES,
};
use crate::pagination::{self, paginate, CursorParams, ProductPage};
use crate::services::catalog::product_slug;
use crate::services::storage::FileStorage;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    Order, PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Serializes products with their images, active prices and owner.
pub(crate) async fn product_responses(
    db: &DbPool,
    storage: &FileStorage,
    products: Vec<product::Model>,
) -> ApiResult<Vec<ProductResponse>> {
    if products.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();

    let mut images: HashMap<i64, Vec<ProductImageResponse>> = HashMap::new();
    for image in product_image::Entity::find()
        .filter(product_image::Column::ProductId.is_in(ids.clone()))
        .order_by_asc(product_image::Column::SortOrder)
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await?
    {
        let url = storage.url(&image.image);
        images
            .entry(image.product_id)
            .or_default()
            .push(ProductImageResponse::new(image, url));
    }

    let mut prices: HashMap<i64, Vec<ProductPriceResponse>> = HashMap::new();
    for (price, unit) in product_price::Entity::find()
        .filter(product_price::Column::ProductId.is_in(ids.clone()))
        .filter(product_price::Column::IsActive.eq(true))
        .find_also_related(unit_of_measure::Entity)
        .all(db)
        .await?
    {
        prices
            .entry(price.product_id)
            .or_default()
            .push(price_response(price, unit));
    }

    let category_names: HashMap<i64, String> = category::Entity::find()
        .filter(category::Column::Id.is_in(products.iter().map(|p| p.category_id)))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let owners = user_summaries(db, products.iter().map(|p| p.user_id).collect()).await?;

    Ok(products
        .into_iter()
        .map(|p| {
            let images = images.remove(&p.id).unwrap_or_default();
            let primary_image = images
                .iter()
                .find(|i| i.is_primary)
                .or_else(|| images.first())
                .and_then(|i| i.image.clone());
            ProductResponse {
                uuid: p.uuid,
                user: summary_of(&owners, p.user_id),
                category_name: category_names.get(&p.category_id).cloned(),
                category_id: p.category_id,
                subcategory_id: p.subcategory_id,
                name: p.name,
                slug: p.slug,
                description: p.description,
                available_stock: p.available_stock,
                status: p.status,
                approval_status: p.approval_status,
                primary_image,
                image_count: images.len(),
                images,
                prices: prices.remove(&p.id).unwrap_or_default(),
                created_at: p.created_at,
                updated_at: p.updated_at,
            }
        })
        .collect())
}

fn price_response(
    price: product_price::Model,
    unit: Option<unit_of_measure::Model>,
) -> ProductPriceResponse {
    ProductPriceResponse {
        id: price.id,
        unit_of_measure: unit.map(|u| UnitOfMeasureRef {
            id: u.id,
            name: u.name,
            abbreviation: u.abbreviation,
        }),
        price: price.price,
        is_active: price.is_active,
        created_at: price.created_at,
        updated_at: price.updated_at,
    }
}

async fn product_response(
    db: &DbPool,
    storage: &FileStorage,
    product: product::Model,
) -> ApiResult<ProductResponse> {
    product_responses(db, storage, vec![product])
        .await?
        .pop()
        .ok_or_else(ApiError::not_found)
}

/// Products the viewer may look at: approved ones plus their own.
fn visible_products(viewer: Option<i64>) -> Select<product::Entity> {
    let approved = product::Column::ApprovalStatus.eq(ApprovalStatus::Approved);
    let condition = match viewer {
        Some(user_id) => Condition::any()
            .add(approved)
            .add(product::Column::UserId.eq(user_id)),
        None => Condition::all().add(approved),
    };
    product::Entity::find().filter(condition)
}

fn apply_query(mut select: Select<product::Entity>, query: &ProductQuery) -> Select<product::Entity> {
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(product::Column::Name.contains(search))
                .add(product::Column::Description.contains(search)),
        );
    }
    if let Some(category_id) = query.category_id {
        select = select.filter(product::Column::CategoryId.eq(category_id));
    }
    if let Some(status) = query.status {
        select = select.filter(product::Column::Status.eq(status));
    }
    select
}

async fn product_page(
    db: &DbPool,
    storage: &FileStorage,
    select: Select<product::Entity>,
    params: &CursorParams,
) -> ApiResult<ProductPage> {
    let found = paginate(
        db,
        select,
        product::Column::CreatedAt,
        product::Column::Id,
        Order::Desc,
        params,
        pagination::CATALOG,
    )
    .await?;
    let results = product_responses(db, storage, found.results).await?;
    Ok(ProductPage {
        next: found.next,
        previous: found.previous,
        results,
    })
}

async fn find_visible_product(
    db: &DbPool,
    viewer: Option<i64>,
    uuid: Uuid,
) -> ApiResult<product::Model> {
    visible_products(viewer)
        .filter(product::Column::Uuid.eq(uuid))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found.".to_string()))
}

/// Loads a visible product and insists the caller owns it.
async fn owned_product(
    db: &DbPool,
    user: AuthenticatedUser,
    uuid: Uuid,
    denied: &str,
) -> ApiResult<product::Model> {
    let product = find_visible_product(db, Some(user.user_id), uuid).await?;
    if product.user_id != user.user_id {
        return Err(ApiError::Forbidden(denied.to_string()));
    }
    Ok(product)
}

/// Checks the category exists and is active, and that the subcategory belongs to it.
async fn check_classification<C: ConnectionTrait>(
    db: &C,
    errors: &mut Validator,
    category_id: i64,
    subcategory_id: Option<i64>,
) -> ApiResult<()> {
    let category = category::Entity::find_by_id(category_id)
        .filter(category::Column::IsActive.eq(true))
        .one(db)
        .await?;
    errors.check(category.is_some(), "category_id", "Category does not exist.");
    if let Some(subcategory_id) = subcategory_id {
        match subcategory::Entity::find_by_id(subcategory_id).one(db).await? {
            Some(sub) if sub.category_id != category_id => errors.add(
                "subcategory_id",
                "Subcategory must belong to the selected category.",
            ),
            Some(_) => {}
            None => errors.add("subcategory_id", "Subcategory does not exist."),
        }
    }
    Ok(())
}

async fn insert_images<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    paths: Vec<String>,
    first_sort_order: i32,
    first_is_primary: bool,
) -> ApiResult<Vec<product_image::Model>> {
    let now = Utc::now();
    let mut created = Vec::with_capacity(paths.len());
    for (index, path) in paths.into_iter().enumerate() {
        let image = product_image::ActiveModel {
            product_id: Set(product_id),
            image: Set(path),
            caption: Set(String::new()),
            is_primary: Set(first_is_primary && index == 0),
            sort_order: Set(first_sort_order + index as i32),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        created.push(image);
    }
    Ok(created)
}

async fn next_sort_order<C: ConnectionTrait>(db: &C, product_id: i64) -> ApiResult<i32> {
    let last = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .order_by_desc(product_image::Column::SortOrder)
        .one(db)
        .await?;
    Ok(last.map(|i| i.sort_order).unwrap_or(0) + 1)
}

async fn image_count<C: ConnectionTrait>(db: &C, product_id: i64) -> ApiResult<u64> {
    Ok(product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .count(db)
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/products",
    params(CursorParams, ProductQuery),
    responses(
        (status = 200, description = "Approved products plus the caller's own", body = ProductPage)
    ),
    tag = "ecommerce"
)]
pub async fn list_products(
    viewer: MaybeUser,
    query: web::Query<ProductQuery>,
    page: web::Query<CursorParams>,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let select = apply_query(visible_products(viewer.user_id()), &query);
    let body = product_page(&pool, &storage, select, &page).await?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/products/public-list",
    params(CursorParams, ProductQuery),
    responses(
        (status = 200, description = "Approved products only", body = ProductPage)
    ),
    tag = "ecommerce"
)]
pub async fn public_products(
    query: web::Query<ProductQuery>,
    page: web::Query<CursorParams>,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let select = apply_query(visible_products(None), &query);
    let body = product_page(&pool, &storage, select, &page).await?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/products/my-products",
    params(CursorParams, ProductQuery),
    responses(
        (status = 200, description = "The caller's products in any approval state", body = ProductPage),
        (status = 403, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn my_products(
    user: AuthenticatedUser,
    query: web::Query<ProductQuery>,
    page: web::Query<CursorParams>,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let select = apply_query(
        product::Entity::find().filter(product::Column::UserId.eq(user.user_id)),
        &query,
    );
    let body = product_page(&pool, &storage, select, &page).await?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/products/{uuid}",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    responses(
        (status = 200, description = "Product detail", body = ProductResponse),
        (status = 404, description = "Product not found")
    ),
    tag = "ecommerce"
)]
pub async fn get_product(
    path: web::Path<Uuid>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let product = find_visible_product(&pool, viewer.user_id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product_response(&pool, &storage, product).await?))
}

#[utoipa::path(
    post,
    path = "/api/ecommerce/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created pending approval", body = ProductResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Caller has no approved vendor profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn create_product(
    req: web::Json<CreateProductRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let approved_vendor = vendor::Entity::find()
        .filter(vendor::Column::UserId.eq(user.user_id))
        .filter(vendor::Column::ReviewStatus.eq(ReviewStatus::Approved))
        .count(pool.get_ref())
        .await?;
    if approved_vendor == 0 {
        return Err(ApiError::Forbidden(
            "An approved vendor profile is required to sell products.".to_string(),
        ));
    }

    let req = req.into_inner();
    let name = req.name.trim().to_string();
    let mut errors = Validator::new();
    errors.check(!name.is_empty(), "name", "This field may not be blank.");
    errors.check(req.available_stock >= 0, "available_stock", "Stock cannot be negative.");
    check_classification(pool.get_ref(), &mut errors, req.category_id, req.subcategory_id).await?;
    if req.images.is_empty() {
        errors.add("images", "At least 1 image is required for a product.");
    } else if req.images.len() > MAX_PRODUCT_IMAGES {
        errors.add("images", "Maximum 10 images are allowed per product.");
    }
    errors.finish()?;

    let stored = store_uploads(&storage, "product_images", "images", &req.images).await?;

    let now = Utc::now();
    let uuid = Uuid::new_v4();
    let saved = async {
        let txn = pool.begin().await?;
        let created = product::ActiveModel {
            uuid: Set(uuid),
            user_id: Set(user.user_id),
            category_id: Set(req.category_id),
            subcategory_id: Set(req.subcategory_id),
            slug: Set(product_slug(&name, &uuid)),
            name: Set(name),
            description: Set(req.description),
            available_stock: Set(req.available_stock),
            status: Set(req.status.unwrap_or(ProductStatus::Draft)),
            approval_status: Set(ApprovalStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        insert_images(&txn, created.id, stored.clone(), 0, true).await?;
        txn.commit().await?;
        Ok::<_, ApiError>(created)
    }
    .await;
    let created = or_discard(&storage, &stored, saved).await?;

    log::info!("User {} created product {}", user.user_id, created.uuid);
    let body = product_response(&pool, &storage, created).await?;
    Ok(HttpResponse::Created().json(body))
}

#[utoipa::path(
    patch,
    path = "/api/ecommerce/products/{uuid}",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ProductResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn update_product(
    path: web::Path<Uuid>,
    req: web::Json<UpdateProductRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let existing = owned_product(
        &pool,
        user,
        path.into_inner(),
        "You can only update your own products.",
    )
    .await?;
    let req = req.into_inner();

    let mut errors = Validator::new();
    if let Some(name) = &req.name {
        errors.check(!name.trim().is_empty(), "name", "This field may not be blank.");
    }
    if let Some(stock) = req.available_stock {
        errors.check(stock >= 0, "available_stock", "Stock cannot be negative.");
    }
    if req.category_id.is_some() || req.subcategory_id.is_some() {
        let category_id = req.category_id.unwrap_or(existing.category_id);
        let subcategory_id = req.subcategory_id.or(existing.subcategory_id);
        check_classification(pool.get_ref(), &mut errors, category_id, subcategory_id).await?;
    }
    let current_images = image_count(pool.get_ref(), existing.id).await?;
    if current_images as usize + req.images.len() > MAX_PRODUCT_IMAGES {
        errors.add(
            "images",
            format!(
                "Adding {} images would exceed the maximum of {} images per product.",
                req.images.len(),
                MAX_PRODUCT_IMAGES
            ),
        );
    }
    errors.finish()?;

    let stored = store_uploads(&storage, "product_images", "images", &req.images).await?;

    let mut active = existing.clone().into_active_model();
    if let Some(name) = req.name {
        let name = name.trim().to_string();
        active.slug = Set(product_slug(&name, &existing.uuid));
        active.name = Set(name);
    }
    if let Some(description) = req.description {
        active.description = Set(description);
    }
    if let Some(stock) = req.available_stock {
        active.available_stock = Set(stock);
    }
    if let Some(category_id) = req.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(subcategory_id) = req.subcategory_id {
        active.subcategory_id = Set(Some(subcategory_id));
    }
    if let Some(status) = req.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now());

    let saved = async {
        let txn = pool.begin().await?;
        let updated = active.update(&txn).await?;
        if !stored.is_empty() {
            let first = next_sort_order(&txn, updated.id).await?;
            insert_images(&txn, updated.id, stored.clone(), first, current_images == 0).await?;
        }
        txn.commit().await?;
        Ok::<_, ApiError>(updated)
    }
    .await;
    let updated = or_discard(&storage, &stored, saved).await?;

    let body = product_response(&pool, &storage, updated).await?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    delete,
    path = "/api/ecommerce/products/{uuid}",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn delete_product(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let product = owned_product(
        &pool,
        user,
        path.into_inner(),
        "You can only delete your own products.",
    )
    .await?;
    let images = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product.id))
        .all(pool.get_ref())
        .await?;
    product::Entity::delete_by_id(product.id)
        .exec(pool.get_ref())
        .await?;
    for image in images {
        storage.delete(&image.image).await;
    }
    log::info!("User {} deleted product {}", user.user_id, product.uuid);
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/ecommerce/products/{uuid}/add-images",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    request_body = AddImagesRequest,
    responses(
        (status = 201, description = "Images added", body = [ProductImageResponse]),
        (status = 400, description = "No images or too many images"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn add_images(
    path: web::Path<Uuid>,
    req: web::Json<AddImagesRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let product = owned_product(
        &pool,
        user,
        path.into_inner(),
        "You can only add images to your own products.",
    )
    .await?;
    if req.images.is_empty() {
        return Err(ApiError::BadRequest("No images provided.".to_string()));
    }
    let current = image_count(pool.get_ref(), product.id).await?;
    if current as usize + req.images.len() > MAX_PRODUCT_IMAGES {
        return Err(ApiError::BadRequest(format!(
            "Cannot add {} images. Maximum {} images allowed per product.",
            req.images.len(),
            MAX_PRODUCT_IMAGES
        )));
    }

    let stored = store_uploads(&storage, "product_images", "images", &req.images).await?;
    let saved = async {
        let txn = pool.begin().await?;
        let first = next_sort_order(&txn, product.id).await?;
        let created = insert_images(&txn, product.id, stored.clone(), first, false).await?;
        txn.commit().await?;
        Ok::<_, ApiError>(created)
    }
    .await;
    let created = or_discard(&storage, &stored, saved).await?;

    let body: Vec<ProductImageResponse> = created
        .into_iter()
        .map(|image| {
            let url = storage.url(&image.image);
            ProductImageResponse::new(image, url)
        })
        .collect();
    Ok(HttpResponse::Created().json(body))
}

#[utoipa::path(
    delete,
    path = "/api/ecommerce/products/{uuid}/remove-image",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    request_body = RemoveImageRequest,
    responses(
        (status = 204, description = "Image removed"),
        (status = 400, description = "Missing image id or last remaining image"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product or image not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn remove_image(
    path: web::Path<Uuid>,
    req: web::Json<RemoveImageRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let product = owned_product(
        &pool,
        user,
        path.into_inner(),
        "You can only remove images from your own products.",
    )
    .await?;
    let image_id = req
        .image_id
        .ok_or_else(|| ApiError::BadRequest("image_id is required.".to_string()))?;
    let image = product_image::Entity::find_by_id(image_id)
        .filter(product_image::Column::ProductId.eq(product.id))
        .one(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found.".to_string()))?;
    if image_count(pool.get_ref(), product.id).await? <= 1 {
        return Err(ApiError::BadRequest(
            "Cannot remove the last image. At least 1 image is required.".to_string(),
        ));
    }

    product_image::Entity::delete_by_id(image.id)
        .exec(pool.get_ref())
        .await?;
    storage.delete(&image.image).await;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    patch,
    path = "/api/ecommerce/products/{uuid}/approval",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    request_body = ApproveProductRequest,
    responses(
        (status = 200, description = "Approval status changed", body = ProductResponse),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn approve_product(
    path: web::Path<Uuid>,
    req: web::Json<ApproveProductRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let staff = user.require_staff(&pool).await?;
    let existing = product::Entity::find()
        .filter(product::Column::Uuid.eq(path.into_inner()))
        .one(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found.".to_string()))?;

    let mut active = existing.into_active_model();
    active.approval_status = Set(req.approval_status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(pool.get_ref()).await?;

    log::info!(
        "Staff {} set product {} approval to {:?}",
        staff.id,
        updated.uuid,
        updated.approval_status
    );
    Ok(HttpResponse::Ok().json(product_response(&pool, &storage, updated).await?))
}

/// Prices are addressed through any product uuid, with no approval filter.
async fn product_by_uuid(db: &DbPool, uuid: Uuid) -> ApiResult<product::Model> {
    product::Entity::find()
        .filter(product::Column::Uuid.eq(uuid))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found.".to_string()))
}

async fn find_price(
    db: &DbPool,
    product_id: i64,
    price_id: i64,
) -> ApiResult<(product_price::Model, Option<unit_of_measure::Model>)> {
    product_price::Entity::find_by_id(price_id)
        .filter(product_price::Column::ProductId.eq(product_id))
        .find_also_related(unit_of_measure::Entity)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Price not found.".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/products/{uuid}/prices",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    responses(
        (status = 200, description = "Active prices of the product", body = [ProductPriceResponse]),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn list_prices(
    path: web::Path<Uuid>,
    _user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let product = product_by_uuid(&pool, path.into_inner()).await?;
    let body: Vec<ProductPriceResponse> = product_price::Entity::find()
        .filter(product_price::Column::ProductId.eq(product.id))
        .filter(product_price::Column::IsActive.eq(true))
        .find_also_related(unit_of_measure::Entity)
        .all(pool.get_ref())
        .await?
        .into_iter()
        .map(|(price, unit)| price_response(price, unit))
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    post,
    path = "/api/ecommerce/products/{uuid}/prices",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid")
    ),
    request_body = CreatePriceRequest,
    responses(
        (status = 201, description = "Price created", body = ProductPriceResponse),
        (status = 400, description = "Invalid price or unit, or duplicate unit"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn create_price(
    path: web::Path<Uuid>,
    req: web::Json<CreatePriceRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let product = product_by_uuid(&pool, path.into_inner()).await?;
    if product.user_id != user.user_id {
        return Err(ApiError::Forbidden(
            "You can only add prices to your own products.".to_string(),
        ));
    }

    let unit = unit_of_measure::Entity::find_by_id(req.unit_of_measure)
        .filter(unit_of_measure::Column::IsActive.eq(true))
        .one(pool.get_ref())
        .await?;
    let mut errors = Validator::new();
    errors.check(req.price > 0, "price", "Price must be greater than 0.");
    errors.check(unit.is_some(), "unit_of_measure", "Unit of measure does not exist.");
    errors.finish()?;

    let now = Utc::now();
    let created = product_price::ActiveModel {
        product_id: Set(product.id),
        unit_of_measure_id: Set(req.unit_of_measure),
        price: Set(req.price),
        is_active: Set(req.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map_err(|e| unique_or(e, "A price for this unit of measure already exists."))?;

    Ok(HttpResponse::Created().json(price_response(created, unit)))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/products/{uuid}/prices/{price_id}",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid"),
        ("price_id" = i64, Path, description = "Price id")
    ),
    responses(
        (status = 200, description = "Price detail", body = ProductPriceResponse),
        (status = 404, description = "Product or price not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn get_price(
    path: web::Path<(Uuid, i64)>,
    _user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (uuid, price_id) = path.into_inner();
    let product = product_by_uuid(&pool, uuid).await?;
    let (price, unit) = find_price(&pool, product.id, price_id).await?;
    Ok(HttpResponse::Ok().json(price_response(price, unit)))
}

#[utoipa::path(
    patch,
    path = "/api/ecommerce/products/{uuid}/prices/{price_id}",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid"),
        ("price_id" = i64, Path, description = "Price id")
    ),
    request_body = UpdatePriceRequest,
    responses(
        (status = 200, description = "Updated price", body = ProductPriceResponse),
        (status = 400, description = "Invalid price"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product or price not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn update_price(
    path: web::Path<(Uuid, i64)>,
    req: web::Json<UpdatePriceRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (uuid, price_id) = path.into_inner();
    let product = product_by_uuid(&pool, uuid).await?;
    let (price, unit) = find_price(&pool, product.id, price_id).await?;
    if product.user_id != user.user_id {
        return Err(ApiError::Forbidden(
            "You can only update prices for your own products.".to_string(),
        ));
    }
    if let Some(amount) = req.price {
        if amount <= 0 {
            return Err(ApiError::field("price", "Price must be greater than 0."));
        }
    }

    let mut active = price.into_active_model();
    if let Some(amount) = req.price {
        active.price = Set(amount);
    }
    if let Some(is_active) = req.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(price_response(updated, unit)))
}

#[utoipa::path(
    delete,
    path = "/api/ecommerce/products/{uuid}/prices/{price_id}",
    params(
        ("uuid" = Uuid, Path, description = "Product uuid"),
        ("price_id" = i64, Path, description = "Price id")
    ),
    responses(
        (status = 204, description = "Price deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product or price not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn delete_price(
    path: web::Path<(Uuid, i64)>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let (uuid, price_id) = path.into_inner();
    let product = product_by_uuid(&pool, uuid).await?;
    let (price, _) = find_price(&pool, product.id, price_id).await?;
    if product.user_id != user.user_id {
        return Err(ApiError::Forbidden(
            "You can only delete prices for your own products.".to_string(),
        ));
    }
    product_price::Entity::delete_by_id(price.id)
        .exec(pool.get_ref())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
