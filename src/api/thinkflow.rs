use super::store_upload;
use crate::auth::MaybeUser;
use crate::db::DbPool;
use crate::entities::plant_disease;
use crate::error::{ApiError, ApiResult};
use crate::models::{PlantDiseaseRequest, PlantDiseaseResponse};
use crate::services::plant_disease::PlantDiseaseAnalyzer;
use crate::services::storage::FileStorage;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

const IMAGE_DIR: &str = "plant_diseases";

#[utoipa::path(
    post,
    path = "/api/thinkflow/plant-disease/analyzer",
    request_body = PlantDiseaseRequest,
    responses(
        (status = 201, description = "Image analyzed and stored", body = PlantDiseaseResponse),
        (status = 400, description = "Missing or undecodable image"),
        (status = 500, description = "Vision model unavailable")
    ),
    tag = "thinkflow"
)]
pub async fn analyze_plant_disease(
    req: web::Json<PlantDiseaseRequest>,
    viewer: MaybeUser,
    pool: web::Data<DbPool>,
    storage: web::Data<FileStorage>,
    analyzer: web::Data<dyn PlantDiseaseAnalyzer>,
) -> ApiResult<HttpResponse> {
    let stored = store_upload(&storage, IMAGE_DIR, "image", &req.image).await?;

    let outcome = match analyzer.analyze(req.image.content_base64.trim()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Plant disease analysis failed: {}", e);
            storage.delete(&stored).await;
            return Err(ApiError::Internal(e.into()));
        }
    };
    let analysis = outcome.analysis;

    let saved = plant_disease::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        user_id: Set(viewer.user_id()),
        image: Set(stored),
        disease_name: Set(analysis.disease_name),
        confidence: Set(Some(analysis.confidence)),
        symptoms: Set(Some(json!(analysis.symptoms))),
        severity: Set(analysis.severity),
        treatment_recommendations: Set(Some(json!(analysis.treatment_recommendations))),
        preventive_measures: Set(Some(json!(analysis.preventive_measures))),
        mini_article: Set(analysis.mini_article),
        input_tokens: Set(outcome.usage.input_tokens),
        output_tokens: Set(outcome.usage.output_tokens),
        total_tokens: Set(outcome.usage.total_tokens),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(pool.get_ref())
    .await?;

    log::info!(
        "Plant disease analysis {} used {} tokens",
        saved.uuid,
        saved.total_tokens
    );
    let image_url = storage.url(&saved.image);
    Ok(HttpResponse::Created().json(PlantDiseaseResponse::new(saved, image_url)))
}
