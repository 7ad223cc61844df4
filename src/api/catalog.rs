use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::entities::{category, subcategory, unit_of_measure};
use crate::error::{unique_or, ApiError, ApiResult, Validator};
use crate::models::{
    CategoryDetail, CategoryQuery, CategoryRef, CategoryResponse, CreateCategoryRequest,
    SubCategoryQuery, SubCategoryResponse, UnitOfMeasureResponse,
};
use crate::services::catalog::{active_children, ancestors, full_path, unique_category_slug};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::HashMap;

/// In-memory view of the category tree used to fill derived fields.
struct CategoryTree {
    nodes: HashMap<i64, category::Model>,
    active_children: HashMap<i64, u64>,
}

impl CategoryTree {
    async fn load(db: &DbPool) -> ApiResult<Self> {
        let nodes: HashMap<i64, category::Model> = category::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let mut active_children = HashMap::new();
        for node in nodes.values().filter(|c| c.is_active) {
            if let Some(parent_id) = node.parent_id {
                *active_children.entry(parent_id).or_insert(0) += 1;
            }
        }
        Ok(CategoryTree {
            nodes,
            active_children,
        })
    }

    fn level(&self, node: &category::Model) -> u32 {
        let mut level = 0;
        let mut next = node.parent_id;
        while let Some(parent) = next.and_then(|id| self.nodes.get(&id)) {
            level += 1;
            if level as usize > self.nodes.len() {
                break;
            }
            next = parent.parent_id;
        }
        level
    }

    fn response(&self, node: category::Model) -> CategoryResponse {
        CategoryResponse {
            parent_name: node
                .parent_id
                .and_then(|id| self.nodes.get(&id))
                .map(|p| p.name.clone()),
            children_count: self.active_children.get(&node.id).copied().unwrap_or(0),
            level: self.level(&node),
            id: node.id,
            name: node.name,
            slug: node.slug,
            description: node.description,
            is_active: node.is_active,
            is_featured: node.is_featured,
            sort_order: node.sort_order,
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

fn search_term(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/categories",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Active categories ordered by name", body = [CategoryResponse])
    ),
    tag = "ecommerce"
)]
pub async fn list_categories(
    query: web::Query<CategoryQuery>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let mut select = category::Entity::find()
        .filter(category::Column::IsActive.eq(true))
        .order_by_asc(category::Column::Name);
    if let Some(search) = search_term(&query.search) {
        select = select.filter(
            Condition::any()
                .add(category::Column::Name.contains(search))
                .add(category::Column::Description.contains(search)),
        );
    }
    if let Some(featured) = query.is_featured {
        select = select.filter(category::Column::IsFeatured.eq(featured));
    }

    let found = select.all(pool.get_ref()).await?;
    let tree = CategoryTree::load(&pool).await?;
    let body: Vec<CategoryResponse> = found.into_iter().map(|c| tree.response(c)).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/categories/{slug}",
    params(
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Category with children and ancestors", body = CategoryDetail),
        (status = 404, description = "Category not found or inactive")
    ),
    tag = "ecommerce"
)]
pub async fn get_category(
    path: web::Path<String>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let node = category::Entity::find()
        .filter(category::Column::Slug.eq(path.as_str()))
        .filter(category::Column::IsActive.eq(true))
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;

    let chain = ancestors(pool.get_ref(), &node).await?;
    let tree = CategoryTree::load(&pool).await?;
    let children: Vec<CategoryResponse> = active_children(pool.get_ref(), node.id)
        .await?
        .into_iter()
        .map(|c| tree.response(c))
        .collect();

    let body = CategoryDetail {
        id: node.id,
        name: node.name.clone(),
        description: node.description.clone(),
        slug: node.slug.clone(),
        parent_data: chain.last().map(CategoryRef::from),
        meta_title: node.meta_title.clone(),
        meta_description: node.meta_description.clone(),
        is_active: node.is_active,
        is_featured: node.is_featured,
        sort_order: node.sort_order,
        is_root: node.parent_id.is_none(),
        is_leaf: children.is_empty(),
        children,
        full_path: full_path(&chain, &node),
        level: chain.len() as u32,
        ancestors: chain.iter().map(CategoryRef::from).collect(),
        created_at: node.created_at,
        updated_at: node.updated_at,
    };
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    post,
    path = "/api/ecommerce/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Invalid name or parent"),
        (status = 403, description = "Staff only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "ecommerce"
)]
pub async fn create_category(
    req: web::Json<CreateCategoryRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    user.require_staff(&pool).await?;
    let req = req.into_inner();
    let name = req.name.trim().to_string();

    let mut errors = Validator::new();
    errors.check(!name.is_empty(), "name", "This field may not be blank.");
    if let Some(parent_id) = req.parent_id {
        let parent = category::Entity::find_by_id(parent_id)
            .one(pool.get_ref())
            .await?;
        errors.check(parent.is_some(), "parent_id", "Parent category does not exist.");
    }
    errors.finish()?;

    let now = Utc::now();
    let created = category::ActiveModel {
        slug: Set(unique_category_slug(pool.get_ref(), &name).await?),
        name: Set(name),
        description: Set(req.description),
        parent_id: Set(req.parent_id),
        meta_title: Set(req.meta_title),
        meta_description: Set(req.meta_description),
        is_active: Set(req.is_active),
        is_featured: Set(req.is_featured),
        sort_order: Set(req.sort_order),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await
    .map_err(|e| unique_or(e, "Category with this name already exists."))?;

    log::info!("Created category {} ({})", created.name, created.slug);
    let tree = CategoryTree::load(&pool).await?;
    Ok(HttpResponse::Created().json(tree.response(created)))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/subcategories",
    params(SubCategoryQuery),
    responses(
        (status = 200, description = "Active subcategories", body = [SubCategoryResponse])
    ),
    tag = "ecommerce"
)]
pub async fn list_subcategories(
    query: web::Query<SubCategoryQuery>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let mut select = subcategory::Entity::find()
        .filter(subcategory::Column::IsActive.eq(true))
        .order_by_asc(subcategory::Column::SortOrder)
        .order_by_asc(subcategory::Column::Name);
    if let Some(category_id) = query.category {
        select = select.filter(subcategory::Column::CategoryId.eq(category_id));
    }
    if let Some(search) = search_term(&query.search) {
        select = select.filter(subcategory::Column::Name.contains(search));
    }
    let body: Vec<SubCategoryResponse> = select
        .all(pool.get_ref())
        .await?
        .into_iter()
        .map(SubCategoryResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/subcategories/{slug}",
    params(
        ("slug" = String, Path, description = "Subcategory slug")
    ),
    responses(
        (status = 200, description = "Subcategory detail", body = SubCategoryResponse),
        (status = 404, description = "Subcategory not found")
    ),
    tag = "ecommerce"
)]
pub async fn get_subcategory(
    path: web::Path<String>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let found = subcategory::Entity::find()
        .filter(subcategory::Column::Slug.eq(path.as_str()))
        .filter(subcategory::Column::IsActive.eq(true))
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(SubCategoryResponse::from(found)))
}

#[utoipa::path(
    get,
    path = "/api/ecommerce/uoms",
    responses(
        (status = 200, description = "Active units of measure", body = [UnitOfMeasureResponse])
    ),
    tag = "ecommerce"
)]
pub async fn list_units(pool: web::Data<DbPool>) -> ApiResult<HttpResponse> {
    let body: Vec<UnitOfMeasureResponse> = unit_of_measure::Entity::find()
        .filter(unit_of_measure::Column::IsActive.eq(true))
        .order_by_asc(unit_of_measure::Column::Name)
        .all(pool.get_ref())
        .await?
        .into_iter()
        .map(UnitOfMeasureResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(body))
}
