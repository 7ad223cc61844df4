use crate::entities::{city, country, district, province};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountryResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl From<country::Model> for CountryResponse {
    fn from(model: country::Model) -> Self {
        CountryResponse {
            id: model.id,
            name: model.name,
            code: model.code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProvinceResponse {
    pub id: i64,
    pub name: String,
    pub country: CountryResponse,
}

impl ProvinceResponse {
    pub fn new(model: province::Model, country: CountryResponse) -> Self {
        ProvinceResponse {
            id: model.id,
            name: model.name,
            country,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CityResponse {
    pub id: i64,
    pub name: String,
    pub province: ProvinceResponse,
}

impl CityResponse {
    pub fn new(model: city::Model, province: ProvinceResponse) -> Self {
        CityResponse {
            id: model.id,
            name: model.name,
            province,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DistrictResponse {
    pub id: i64,
    pub name: String,
    pub city: CityResponse,
}

impl DistrictResponse {
    pub fn new(model: district::Model, city: CityResponse) -> Self {
        DistrictResponse {
            id: model.id,
            name: model.name,
            city,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LocationQuery {
    /// Case-insensitive match on the name (and code for countries).
    pub search: Option<String>,
    pub name: Option<String>,
    pub country_id: Option<i64>,
    pub province_id: Option<i64>,
    pub city_id: Option<i64>,
}
