use super::products::product_responses;
use super::{summary_of, user_summaries};
use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::entities::{cart, product};
use crate::error::{is_unique_violation, ApiError, ApiResult, Validator};
use crate::models::{AddToCartRequest, CartResponse, UpdateCartRequest};
use crate::pagination::{self, paginate, CartPage, CursorParams};
use crate::services::storage::FileStorage;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, Order, QueryFilter, Set};
use std::collections::HashMap;

async fn find_line(db: &DbPool, user_id: i64, product_id: i64) -> ApiResult<Option<cart::Model>> {
    Ok(cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .filter(cart::Column::ProductId.eq(product_id))
        .one(db)
        .await?)
}

async fn set_quantity(db: &DbPool, item: cart::Model, quantity: i32) -> ApiResult<cart::Model> {
    let mut active = item.into_active_model();
    active.quantity = Set(quantity);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

fn stock_message(available: i32) -> String {
    format!("Quantity exceeds available stock ({}).", available)
}

async fn cart_responses(
    db: &DbPool,
    storage: &FileStorage,
    items: Vec<cart::Model>,
) -> ApiResult<Vec<CartResponse>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let found = product::Entity::find()
        .filter(product::Column::Id.is_in(items.iter().map(|i| i.product_id)))
        .all(db)
        .await?;
    let ids: Vec<i64> = found.iter().map(|p| p.id).collect();
    let mut products: HashMap<i64, _> = ids
        .into_iter()
        .zip(product_responses(db, storage, found).await?)
        .collect();
    let owners = user_summaries(db, items.iter().map(|i| i.user_id).collect()).await?;

    let mut responses = Vec::with_capacity(items.len());
    for item in items {
        // Product deleted since the page was read
        let Some(product) = products.remove(&item.product_id) else {
            continue;
        };
        responses.push(CartResponse {
            id: item.id,
            user: summary_of(&owners, item.user_id),
            product,
            quantity: item.quantity,
            created_at: item.created_at,
            updated_at: item.updated_at,
        });
    }
    Ok(responses)
}

async fn cart_response(
    db: &DbPool,
    storage: &FileStorage,
    item: cart::Model,
) -> ApiResult<CartResponse> {
    cart_responses(db, storage, vec![item])
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound("Cart item not found.".to_string()))
}

async fn own_item(db: &DbPool, user: AuthenticatedUser, id: i64) -> ApiResult<cart::Model> {
    cart::Entity::find_by_id(id)
        .filter(cart::Column::UserId.eq(user.user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cart item not found.".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/carts",
    params(CursorParams),
    responses(
        (status = 200, description = "The caller's cart, newest first", body = CartPage),
        (status = 403, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn list_cart(
    page: web::Query<CursorParams>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let found = paginate(
        pool.get_ref(),
        cart::Entity::find().filter(cart::Column::UserId.eq(user.user_id)),
        cart::Column::CreatedAt,
        cart::Column::Id,
        Order::Desc,
        &page,
        pagination::CATALOG,
    )
    .await?;
    let results = cart_responses(&pool, &storage, found.results).await?;
    Ok(HttpResponse::Ok().json(CartPage {
        next: found.next,
        previous: found.previous,
        results,
    }))
}

#[utoipa::path(
    post,
    path = "/api/ecommerce/carts",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Product added to the cart", body = CartResponse),
        (status = 200, description = "Quantity of an existing item replaced", body = CartResponse),
        (status = 400, description = "Unknown or unavailable product, or invalid quantity")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn add_to_cart(
    req: web::Json<AddToCartRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let product = product::Entity::find()
        .filter(product::Column::Uuid.eq(req.product_uuid))
        .one(pool.get_ref())
        .await?
        .filter(|p| p.is_purchasable());

    let mut errors = Validator::new();
    errors.check(
        product.is_some(),
        "product_uuid",
        "Product with the given UUID does not exist or is inactive.",
    );
    errors.check(req.quantity > 0, "quantity", "Quantity must be greater than 0.");
    if let Some(p) = &product {
        if req.quantity > p.available_stock {
            errors.add("quantity", stock_message(p.available_stock));
        }
    }
    errors.finish()?;
    let product = product.ok_or_else(ApiError::not_found)?;

    let now = Utc::now();
    let (item, created) = match find_line(&pool, user.user_id, product.id).await? {
        Some(item) => (set_quantity(&pool, item, req.quantity).await?, false),
        None => {
            let inserted = cart::ActiveModel {
                user_id: Set(user.user_id),
                product_id: Set(product.id),
                quantity: Set(req.quantity),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(pool.get_ref())
            .await;
            match inserted {
                Ok(item) => (item, true),
                // A concurrent add for the same product won the insert.
                Err(e) if is_unique_violation(&e) => {
                    let item = find_line(&pool, user.user_id, product.id)
                        .await?
                        .ok_or(ApiError::Database(e))?;
                    (set_quantity(&pool, item, req.quantity).await?, false)
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let body = cart_response(&pool, &storage, item).await?;
    if created {
        Ok(HttpResponse::Created().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/carts/{cart_id}",
    params(
        ("cart_id" = i64, Path, description = "Cart item id")
    ),
    responses(
        (status = 200, description = "Cart item", body = CartResponse),
        (status = 404, description = "Cart item not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn get_cart_item(
    path: web::Path<i64>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let item = own_item(&pool, user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(cart_response(&pool, &storage, item).await?))
}

#[utoipa::path(
    patch,
    path = "/api/ecommerce/carts/{cart_id}",
    params(
        ("cart_id" = i64, Path, description = "Cart item id")
    ),
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Quantity updated", body = CartResponse),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Cart item not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn update_cart_item(
    path: web::Path<i64>,
    req: web::Json<UpdateCartRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
) -> ApiResult<HttpResponse> {
    let item = own_item(&pool, user, path.into_inner()).await?;
    let product = product::Entity::find_by_id(item.product_id)
        .one(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Cart item not found.".to_string()))?;

    if req.quantity <= 0 {
        return Err(ApiError::field("quantity", "Quantity must be greater than 0."));
    }
    if req.quantity > product.available_stock {
        return Err(ApiError::field("quantity", stock_message(product.available_stock)));
    }

    let mut active = item.into_active_model();
    active.quantity = Set(req.quantity);
    active.updated_at = Set(Utc::now());
    let updated = active.update(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(cart_response(&pool, &storage, updated).await?))
}

#[utoipa::path(
    delete,
    path = "/api/ecommerce/carts/{cart_id}",
    params(
        ("cart_id" = i64, Path, description = "Cart item id")
    ),
    responses(
        (status = 204, description = "Item removed from the cart"),
        (status = 404, description = "Cart item not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn remove_cart_item(
    path: web::Path<i64>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let item = own_item(&pool, user, path.into_inner()).await?;
    cart::Entity::delete_by_id(item.id)
        .exec(pool.get_ref())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
