use crate::entities::plant_disease::{self, Severity};
use crate::services::storage::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlantDiseaseRequest {
    pub image: UploadedFile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlantDiseaseResponse {
    pub uuid: Uuid,
    pub image: Option<String>,
    pub disease_name: String,
    pub confidence: Option<f64>,
    pub symptoms: Vec<String>,
    pub severity: Severity,
    pub treatment_recommendations: Vec<String>,
    pub preventive_measures: Vec<String>,
    pub mini_article: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub total_tokens: i32,
    pub created_at: DateTime<Utc>,
}

fn strings(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

impl PlantDiseaseResponse {
    pub fn new(model: plant_disease::Model, image_url: Option<String>) -> Self {
        PlantDiseaseResponse {
            uuid: model.uuid,
            image: image_url,
            disease_name: model.disease_name,
            confidence: model.confidence,
            symptoms: strings(model.symptoms),
            severity: model.severity,
            treatment_recommendations: strings(model.treatment_recommendations),
            preventive_measures: strings(model.preventive_measures),
            mini_article: model.mini_article,
            input_tokens: model.input_tokens,
            output_tokens: model.output_tokens,
            total_tokens: model.total_tokens,
            created_at: model.created_at,
        }
    }
}
