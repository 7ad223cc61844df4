use super::UserSummary;
use crate::entities::product::{ApprovalStatus, ProductStatus};
use crate::entities::{category, product_image, subcategory, unit_of_measure};
use crate::services::storage::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const MAX_PRODUCT_IMAGES: usize = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CategoryQuery {
    pub search: Option<String>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_name: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub children_count: u64,
    pub level: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<&category::Model> for CategoryRef {
    fn from(model: &category::Model) -> Self {
        CategoryRef {
            id: model.id,
            name: model.name.clone(),
            slug: model.slug.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryDetail {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub parent_data: Option<CategoryRef>,
    pub meta_title: String,
    pub meta_description: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub children: Vec<CategoryResponse>,
    /// Root first, parent last.
    pub ancestors: Vec<CategoryRef>,
    pub full_path: String,
    pub level: u32,
    pub is_root: bool,
    pub is_leaf: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

fn active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SubCategoryQuery {
    /// Category id to filter by.
    pub category: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubCategoryResponse {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<subcategory::Model> for SubCategoryResponse {
    fn from(model: subcategory::Model) -> Self {
        SubCategoryResponse {
            id: model.id,
            category_id: model.category_id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            is_active: model.is_active,
            sort_order: model.sort_order,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnitOfMeasureResponse {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<unit_of_measure::Model> for UnitOfMeasureResponse {
    fn from(model: unit_of_measure::Model) -> Self {
        UnitOfMeasureResponse {
            id: model.id,
            name: model.name,
            abbreviation: model.abbreviation,
            description: model.description,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductQuery {
    /// Matches name or description.
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductImageResponse {
    pub id: i64,
    pub image: Option<String>,
    pub caption: String,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl ProductImageResponse {
    pub fn new(model: product_image::Model, url: Option<String>) -> Self {
        ProductImageResponse {
            id: model.id,
            image: url,
            caption: model.caption,
            is_primary: model.is_primary,
            sort_order: model.sort_order,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitOfMeasureRef {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductPriceResponse {
    pub id: i64,
    pub unit_of_measure: Option<UnitOfMeasureRef>,
    pub price: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub uuid: Uuid,
    pub user: UserSummary,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub subcategory_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub available_stock: i32,
    pub status: ProductStatus,
    pub approval_status: ApprovalStatus,
    pub primary_image: Option<String>,
    pub image_count: usize,
    pub images: Vec<ProductImageResponse>,
    pub prices: Vec<ProductPriceResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub available_stock: i32,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub images: Vec<UploadedFile>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateProductRequest {
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub available_stock: Option<i32>,
    pub status: Option<ProductStatus>,
    pub images: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddImagesRequest {
    #[serde(default)]
    pub images: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveImageRequest {
    pub image_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveProductRequest {
    pub approval_status: ApprovalStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePriceRequest {
    pub unit_of_measure: i64,
    pub price: i64,
    #[serde(default = "active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePriceRequest {
    pub price: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_uuid: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub id: i64,
    pub user: UserSummary,
    pub product: ProductResponse,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
