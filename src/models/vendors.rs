use super::{CityResponse, DistrictResponse, ProvinceResponse};
use crate::entities::vendor::{ReviewStatus, VendorType};
use crate::services::storage::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Vendor application; the vendor type comes from the endpoint.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateVendorRequest {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub logo: Option<UploadedFile>,
    pub full_name: String,
    pub id_card_photo: Option<UploadedFile>,
    pub business_name: String,
    pub business_number: String,
    pub business_nib: Option<UploadedFile>,
    pub npwp: String,
    pub province: Option<i64>,
    pub city: Option<i64>,
    pub district: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub address_detail: String,
    pub postal_code: String,
}

/// Partial update of the caller's vendor; absent fields are left untouched.
/// The vendor type is fixed at creation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateVendorRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub logo: Option<UploadedFile>,
    pub full_name: Option<String>,
    pub id_card_photo: Option<UploadedFile>,
    pub business_name: Option<String>,
    pub business_number: Option<String>,
    pub business_nib: Option<UploadedFile>,
    pub npwp: Option<String>,
    pub province: Option<i64>,
    pub city: Option<i64>,
    pub district: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address_detail: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewVendorRequest {
    pub review_status: ReviewStatus,
    pub review_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct VendorQuery {
    pub vendor_type: Option<VendorType>,
    pub review_status: Option<ReviewStatus>,
    pub province: Option<i64>,
    pub city: Option<i64>,
    /// Matches name, business name or full name.
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VendorResponse {
    pub id: i64,
    pub user: String,
    pub name: String,
    pub vendor_type: VendorType,
    pub vendor_type_display: String,
    pub phone_number: String,
    pub address: String,
    pub logo: Option<String>,
    pub full_name: String,
    pub id_card_photo: Option<String>,
    pub business_name: String,
    pub business_number: String,
    pub business_nib: Option<String>,
    pub npwp: String,
    pub province: Option<ProvinceResponse>,
    pub city: Option<CityResponse>,
    pub district: Option<DistrictResponse>,
    pub latitude: f64,
    pub longitude: f64,
    pub address_detail: String,
    pub postal_code: String,
    pub review_status: ReviewStatus,
    pub review_status_display: String,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
