pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod comments;
pub mod location;
pub mod posts;
pub mod products;
pub mod reactions;
pub mod reports;
pub mod thinkflow;
pub mod vendors;

use crate::db::DbPool;
use crate::entities::{profile, user};
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::pagination::{
    CartPage, CityPage, CommentPage, CountryPage, DistrictPage, PostPage, ProductPage,
    ProfilePage, ProvincePage, ReportPage, VendorPage,
};
use crate::services::storage::{FileStorage, StorageError, UploadedFile};
use actix_web::web;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use std::collections::HashMap;
use utoipa::{Modify, OpenApi};

/// Mounts every app under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/accounts")
                    .route("/register", web::post().to(accounts::register))
                    .route(
                        "/register/confirm",
                        web::post().to(accounts::confirm_registration),
                    )
                    .route("/login", web::post().to(accounts::login))
                    .route("/login/confirm", web::post().to(accounts::confirm_login))
                    .route("/token/refresh", web::post().to(accounts::refresh_token))
                    .route("/profile", web::get().to(accounts::my_profile))
                    .route(
                        "/profiles/{profile_id}",
                        web::get().to(accounts::profile_detail),
                    )
                    .route(
                        "/users/{user_id}/follow",
                        web::post().to(accounts::follow_user),
                    )
                    .route(
                        "/users/{user_id}/follow",
                        web::delete().to(accounts::unfollow_user),
                    )
                    .route(
                        "/users/{user_id}/following",
                        web::get().to(accounts::following_list),
                    )
                    .route(
                        "/users/{user_id}/followers",
                        web::get().to(accounts::followers_list),
                    ),
            )
            .service(
                web::scope("/social-media")
                    .route("/posts", web::get().to(posts::list_posts))
                    .route("/posts", web::post().to(posts::create_post))
                    .route("/posts/{slug}", web::get().to(posts::get_post))
                    .route("/posts/{slug}", web::patch().to(posts::update_post))
                    .route("/posts/{slug}", web::delete().to(posts::delete_post))
                    .route("/posts/{slug}/like", web::post().to(reactions::like_post))
                    .route("/posts/{slug}/like", web::delete().to(reactions::unlike_post))
                    .route("/posts/{slug}/save", web::post().to(reactions::save_post))
                    .route("/posts/{slug}/save", web::delete().to(reactions::unsave_post))
                    .route("/posts/{slug}/view", web::post().to(reactions::view_post))
                    .route("/posts/{slug}/report", web::post().to(reports::report_post))
                    .route(
                        "/posts/{slug}/comments",
                        web::get().to(comments::list_comments),
                    )
                    .route(
                        "/posts/{slug}/comments",
                        web::post().to(comments::create_comment),
                    )
                    .route(
                        "/posts/{slug}/comments/{comment_id}",
                        web::get().to(comments::get_comment),
                    )
                    .route(
                        "/posts/{slug}/comments/{comment_id}",
                        web::patch().to(comments::update_comment),
                    )
                    .route(
                        "/posts/{slug}/comments/{comment_id}",
                        web::delete().to(comments::delete_comment),
                    )
                    .route(
                        "/posts/{slug}/comments/{comment_id}/replies",
                        web::get().to(comments::list_replies),
                    )
                    .route(
                        "/posts/{slug}/comments/{comment_id}/like",
                        web::post().to(reactions::like_comment),
                    )
                    .route(
                        "/posts/{slug}/comments/{comment_id}/like",
                        web::delete().to(reactions::unlike_comment),
                    )
                    .route("/reports", web::get().to(reports::list_reports))
                    .route(
                        "/reports/{report_id}/approval",
                        web::patch().to(reports::approve_report),
                    ),
            )
            .service(
                web::scope("/ecommerce")
                    .route("/categories", web::get().to(catalog::list_categories))
                    .route("/categories", web::post().to(catalog::create_category))
                    .route("/categories/{slug}", web::get().to(catalog::get_category))
                    .route(
                        "/subcategories",
                        web::get().to(catalog::list_subcategories),
                    )
                    .route(
                        "/subcategories/{slug}",
                        web::get().to(catalog::get_subcategory),
                    )
                    .route("/uoms", web::get().to(catalog::list_units))
                    .route("/products", web::get().to(products::list_products))
                    .route("/products", web::post().to(products::create_product))
                    .route(
                        "/products/public-list",
                        web::get().to(products::public_products),
                    )
                    .route("/products/my-products", web::get().to(products::my_products))
                    .route("/products/{uuid}", web::get().to(products::get_product))
                    .route("/products/{uuid}", web::patch().to(products::update_product))
                    .route("/products/{uuid}", web::delete().to(products::delete_product))
                    .route(
                        "/products/{uuid}/add-images",
                        web::post().to(products::add_images),
                    )
                    .route(
                        "/products/{uuid}/remove-image",
                        web::delete().to(products::remove_image),
                    )
                    .route(
                        "/products/{uuid}/approval",
                        web::patch().to(products::approve_product),
                    )
                    .route("/products/{uuid}/prices", web::get().to(products::list_prices))
                    .route(
                        "/products/{uuid}/prices",
                        web::post().to(products::create_price),
                    )
                    .route(
                        "/products/{uuid}/prices/{price_id}",
                        web::get().to(products::get_price),
                    )
                    .route(
                        "/products/{uuid}/prices/{price_id}",
                        web::patch().to(products::update_price),
                    )
                    .route(
                        "/products/{uuid}/prices/{price_id}",
                        web::delete().to(products::delete_price),
                    )
                    .route("/carts", web::get().to(cart::list_cart))
                    .route("/carts", web::post().to(cart::add_to_cart))
                    .route("/carts/{cart_id}", web::get().to(cart::get_cart_item))
                    .route("/carts/{cart_id}", web::patch().to(cart::update_cart_item))
                    .route("/carts/{cart_id}", web::delete().to(cart::remove_cart_item)),
            )
            .service(
                web::scope("/vendors")
                    .route("", web::get().to(vendors::list_vendors))
                    .route(
                        "/create/individual",
                        web::post().to(vendors::create_individual_vendor),
                    )
                    .route(
                        "/create/company",
                        web::post().to(vendors::create_company_vendor),
                    )
                    .route("/me", web::get().to(vendors::my_vendor))
                    .route("/me", web::patch().to(vendors::update_my_vendor))
                    .route("/{vendor_id}", web::get().to(vendors::get_vendor))
                    .route("/{vendor_id}/review", web::patch().to(vendors::review_vendor)),
            )
            .service(
                web::scope("/location")
                    .route("/countries", web::get().to(location::list_countries))
                    .route("/countries/{id}", web::get().to(location::get_country))
                    .route("/provinces", web::get().to(location::list_provinces))
                    .route("/provinces/{id}", web::get().to(location::get_province))
                    .route("/cities", web::get().to(location::list_cities))
                    .route("/cities/{id}", web::get().to(location::get_city))
                    .route("/districts", web::get().to(location::list_districts))
                    .route("/districts/{id}", web::get().to(location::get_district)),
            )
            .service(web::scope("/thinkflow").route(
                "/plant-disease/analyzer",
                web::post().to(thinkflow::analyze_plant_disease),
            )),
    );
}

/// Persists an inline upload, reporting undecodable files against `field`.
pub(crate) async fn store_upload(
    storage: &FileStorage,
    dir: &str,
    field: &str,
    file: &UploadedFile,
) -> ApiResult<String> {
    storage.save(dir, file).await.map_err(|e| match e {
        StorageError::Io(io) => ApiError::Internal(io.into()),
        other => ApiError::field(field, other.to_string()),
    })
}

/// Persists every upload in `files`; a failure removes the ones already written.
pub(crate) async fn store_uploads(
    storage: &FileStorage,
    dir: &str,
    field: &str,
    files: &[UploadedFile],
) -> ApiResult<Vec<String>> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        match store_upload(storage, dir, field, file).await {
            Ok(path) => stored.push(path),
            Err(e) => {
                discard_uploads(storage, &stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// Removes files written for a write that never committed.
pub(crate) async fn discard_uploads(storage: &FileStorage, paths: &[String]) {
    for path in paths {
        storage.delete(path).await;
    }
}

/// Passes `result` through, removing `paths` from storage when it is an error.
pub(crate) async fn or_discard<T>(
    storage: &FileStorage,
    paths: &[String],
    result: ApiResult<T>,
) -> ApiResult<T> {
    if result.is_err() {
        discard_uploads(storage, paths).await;
    }
    result
}

/// Author blocks for a set of users, keyed by user id.
pub(crate) async fn user_summaries(
    db: &DbPool,
    user_ids: Vec<i64>,
) -> Result<HashMap<i64, UserSummary>, DbErr> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let profiles: HashMap<i64, profile::Model> = profile::Entity::find()
        .filter(profile::Column::UserId.is_in(user_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.user_id, p))
        .collect();
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| {
            let summary = UserSummary::new(&u, profiles.get(&u.id));
            (u.id, summary)
        })
        .collect())
}

pub(crate) fn summary_of(summaries: &HashMap<i64, UserSummary>, user_id: i64) -> UserSummary {
    summaries.get(&user_id).cloned().unwrap_or(UserSummary {
        id: user_id,
        username: String::new(),
        full_name: None,
        profile_picture_url: None,
    })
}

/// Row counts of `E` grouped by `key`, restricted to the given key values.
pub(crate) async fn count_by<E>(
    db: &DbPool,
    key: E::Column,
    ids: &[i64],
) -> Result<HashMap<i64, u64>, DbErr>
where
    E: EntityTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i64)> = E::find()
        .select_only()
        .column(key)
        .column_as(Expr::col(key).count(), "total")
        .filter(key.is_in(ids.iter().copied()))
        .group_by(key)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, total)| (id, total.max(0) as u64))
        .collect())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Accounts
        accounts::register,
        accounts::confirm_registration,
        accounts::login,
        accounts::confirm_login,
        accounts::refresh_token,
        accounts::my_profile,
        accounts::profile_detail,
        accounts::follow_user,
        accounts::unfollow_user,
        accounts::following_list,
        accounts::followers_list,
        // Social media
        posts::list_posts,
        posts::create_post,
        posts::get_post,
        posts::update_post,
        posts::delete_post,
        reactions::like_post,
        reactions::unlike_post,
        reactions::save_post,
        reactions::unsave_post,
        reactions::view_post,
        reactions::like_comment,
        reactions::unlike_comment,
        comments::list_comments,
        comments::create_comment,
        comments::get_comment,
        comments::update_comment,
        comments::delete_comment,
        comments::list_replies,
        reports::report_post,
        reports::list_reports,
        reports::approve_report,
        // Ecommerce
        catalog::list_categories,
        catalog::create_category,
        catalog::get_category,
        catalog::list_subcategories,
        catalog::get_subcategory,
        catalog::list_units,
        products::list_products,
        products::public_products,
        products::my_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::add_images,
        products::remove_image,
        products::approve_product,
        products::list_prices,
        products::create_price,
        products::get_price,
        products::update_price,
        products::delete_price,
        cart::list_cart,
        cart::add_to_cart,
        cart::get_cart_item,
        cart::update_cart_item,
        cart::remove_cart_item,
        // Vendors
        vendors::list_vendors,
        vendors::create_individual_vendor,
        vendors::create_company_vendor,
        vendors::my_vendor,
        vendors::update_my_vendor,
        vendors::get_vendor,
        vendors::review_vendor,
        // Location
        location::list_countries,
        location::get_country,
        location::list_provinces,
        location::get_province,
        location::list_cities,
        location::get_city,
        location::list_districts,
        location::get_district,
        // Thinkflow
        thinkflow::analyze_plant_disease,
    ),
    components(schemas(
        // Shared
        MessageResponse,
        UploadedFile,
        crate::auth::TokenPair,
        // Accounts
        RegisterRequest,
        ConfirmCodeRequest,
        LoginRequest,
        RefreshRequest,
        ActivationResponse,
        ProfileResponse,
        ProfileSummary,
        FollowActionResponse,
        UserSummary,
        crate::entities::profile::ProfileType,
        crate::entities::profile::IdCardValidationStatus,
        // Social media
        CreatePostRequest,
        UpdatePostRequest,
        ImageResponse,
        PostResponse,
        CommentRequest,
        UpdateCommentRequest,
        CommentResponse,
        ReportRequest,
        ReportCreatedResponse,
        ReportResponse,
        ApproveReportRequest,
        crate::entities::post::Privacy,
        crate::entities::report::ReportReason,
        // Ecommerce
        CategoryResponse,
        CategoryRef,
        CategoryDetail,
        CreateCategoryRequest,
        SubCategoryResponse,
        UnitOfMeasureResponse,
        UnitOfMeasureRef,
        ProductImageResponse,
        ProductPriceResponse,
        ProductResponse,
        CreateProductRequest,
        UpdateProductRequest,
        AddImagesRequest,
        RemoveImageRequest,
        ApproveProductRequest,
        CreatePriceRequest,
        UpdatePriceRequest,
        AddToCartRequest,
        UpdateCartRequest,
        CartResponse,
        crate::entities::product::ProductStatus,
        crate::entities::product::ApprovalStatus,
        // Vendors
        CreateVendorRequest,
        UpdateVendorRequest,
        ReviewVendorRequest,
        VendorResponse,
        crate::entities::vendor::VendorType,
        crate::entities::vendor::ReviewStatus,
        // Location
        CountryResponse,
        ProvinceResponse,
        CityResponse,
        DistrictResponse,
        // Thinkflow
        PlantDiseaseRequest,
        PlantDiseaseResponse,
        crate::entities::plant_disease::Severity,
        // Pages
        PostPage,
        CommentPage,
        ProfilePage,
        ReportPage,
        VendorPage,
        ProductPage,
        CartPage,
        CountryPage,
        ProvincePage,
        CityPage,
        DistrictPage,
    )),
    tags(
        (name = "accounts", description = "Registration, login and the follow graph"),
        (name = "social_media", description = "Posts, comments, reactions and reports"),
        (name = "ecommerce", description = "Catalog, products, prices and cart"),
        (name = "vendors", description = "Vendor onboarding and review"),
        (name = "location", description = "Country, province, city and district reference data"),
        (name = "thinkflow", description = "Plant disease analysis"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn openapi_document_registers_request_and_page_schemas() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &doc["components"]["schemas"];
        for name in [
            "CreateVendorRequest",
            "UpdateVendorRequest",
            "UpdateProductRequest",
            "ProfilePage",
            "ReportPage",
        ] {
            assert!(schemas[name].is_object(), "{} missing from the document", name);
        }
        assert!(schemas["UploadedFile"]["properties"]["content_base64"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    fn file(name: &str, content_base64: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_base64: content_base64.to_string(),
        }
    }

    #[actix_rt::test]
    async fn failed_writes_leave_no_uploads_behind() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(&crate::config::MediaConfig {
            root: dir.path().display().to_string(),
            url_prefix: "/media/".to_string(),
        });
        let good = file("daun.jpg", "bGVhZg==");

        let err = store_uploads(
            &storage,
            "post_images",
            "images",
            &[good.clone(), file("rusak.jpg", "not base64!")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let left = std::fs::read_dir(dir.path().join("post_images")).unwrap().count();
        assert_eq!(left, 0);

        let stored = store_uploads(&storage, "post_images", "images", &[good])
            .await
            .unwrap();
        assert!(dir.path().join(&stored[0]).exists());
        let rolled_back: ApiResult<()> = Err(ApiError::BadRequest("rolled back".to_string()));
        assert!(or_discard(&storage, &stored, rolled_back).await.is_err());
        assert!(!dir.path().join(&stored[0]).exists());
    }
}
