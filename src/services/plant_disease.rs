use crate::entities::plant_disease::Severity;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const ANALYSIS_PROMPT: &str = "Analyze this plant image and identify any diseases or issues. Describe the symptoms visible, the potential disease name, severity level, and recommended treatments. Response in Bahasa Indonesia with correct grammar";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Vision API request failed: {0}")]
    Transport(String),
    #[error("Vision API responded with status {0}")]
    Rejected(u16),
    #[error("Vision API returned an unexpected body: {0}")]
    Malformed(String),
    #[error("Plant disease API key is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlantDiseaseAnalysis {
    pub disease_name: String,
    pub confidence: f64,
    pub symptoms: Vec<String>,
    pub severity: Severity,
    pub treatment_recommendations: Vec<String>,
    pub preventive_measures: Vec<String>,
    pub mini_article: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub total_tokens: i32,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: PlantDiseaseAnalysis,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait PlantDiseaseAnalyzer: Send + Sync {
    async fn analyze(&self, image_base64: &str) -> Result<AnalysisOutcome, AnalyzerError>;
}

/// Strict JSON schema the model must answer with.
pub fn analysis_format() -> Value {
    let strings = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "format": {
            "type": "json_schema",
            "name": "plant_disease_analysis",
            "schema": {
                "type": "object",
                "properties": {
                    "disease_name": {"type": "string"},
                    "confidence": {"type": "number"},
                    "symptoms": strings,
                    "severity": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                    "treatment_recommendations": strings,
                    "preventive_measures": strings,
                    "mini_article": {
                        "type": "string",
                        "description": "A concise, informative article about the disease"
                    }
                },
                "required": [
                    "disease_name",
                    "confidence",
                    "symptoms",
                    "severity",
                    "treatment_recommendations",
                    "preventive_measures",
                    "mini_article"
                ],
                "additionalProperties": false
            },
            "strict": true
        }
    })
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Concatenated `output_text` parts of a responses-API body.
fn output_text(body: &ResponsesBody) -> String {
    body.output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|part| part.kind == "output_text")
        .map(|part| part.text.as_str())
        .collect()
}

pub fn parse_responses_body(raw: &Value) -> Result<AnalysisOutcome, AnalyzerError> {
    let body: ResponsesBody =
        serde_json::from_value(raw.clone()).map_err(|e| AnalyzerError::Malformed(e.to_string()))?;
    let analysis = serde_json::from_str(&output_text(&body))
        .map_err(|e| AnalyzerError::Malformed(e.to_string()))?;
    Ok(AnalysisOutcome {
        analysis,
        usage: body.usage,
    })
}

pub struct OpenAiPlantDiseaseChecker {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiPlantDiseaseChecker {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(OpenAiPlantDiseaseChecker {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl PlantDiseaseAnalyzer for OpenAiPlantDiseaseChecker {
    async fn analyze(&self, image_base64: &str) -> Result<AnalysisOutcome, AnalyzerError> {
        if self.api_key.is_empty() {
            return Err(AnalyzerError::NotConfigured);
        }
        let request = json!({
            "model": self.model,
            "input": [{
                "role": "user",
                "content": [
                    {"type": "input_text", "text": ANALYSIS_PROMPT},
                    {"type": "input_image", "image_url": format!("data:image/jpeg;base64,{}", image_base64)}
                ]
            }],
            "text": analysis_format(),
        });

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalyzerError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AnalyzerError::Rejected(response.status().as_u16()));
        }
        let raw: Value = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Malformed(e.to_string()))?;
        parse_responses_body(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_output_and_usage() {
        let analysis = json!({
            "disease_name": "Karat daun",
            "confidence": 0.87,
            "symptoms": ["Bercak oranye"],
            "severity": "medium",
            "treatment_recommendations": ["Fungisida"],
            "preventive_measures": ["Rotasi tanaman"],
            "mini_article": "Karat daun disebabkan oleh jamur."
        });
        let raw = json!({
            "output": [{
                "type": "message",
                "content": [{"type": "output_text", "text": analysis.to_string()}]
            }],
            "usage": {"input_tokens": 900, "output_tokens": 120, "total_tokens": 1020}
        });

        let outcome = parse_responses_body(&raw).unwrap();
        assert_eq!(outcome.analysis.disease_name, "Karat daun");
        assert_eq!(outcome.analysis.severity, Severity::Medium);
        assert_eq!(outcome.usage.total_tokens, 1020);
    }

    #[test]
    fn missing_output_is_malformed() {
        let raw = json!({"output": [], "usage": {"input_tokens": 1, "output_tokens": 0, "total_tokens": 1}});
        assert!(matches!(
            parse_responses_body(&raw),
            Err(AnalyzerError::Malformed(_))
        ));
    }

    #[test]
    fn schema_requires_every_field() {
        let format = analysis_format();
        let required = format["format"]["schema"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 7);
        assert_eq!(format["format"]["strict"], true);
    }
}
