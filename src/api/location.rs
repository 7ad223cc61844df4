use crate::db::DbPool;
use crate::entities::{city, country, district, province};
use crate::error::{ApiError, ApiResult};
use crate::models::{CityResponse, CountryResponse, DistrictResponse, LocationQuery, ProvinceResponse};
use crate::pagination::{
    self, paginate_numbered, CityPage, CountryPage, DistrictPage, PageParams, ProvincePage,
};
use actix_web::{web, HttpResponse};
use sea_orm::{ColumnTrait, Condition, DbErr, EntityTrait, QueryFilter, QueryOrder, Select};
use std::collections::HashMap;

/// Parent chains of a batch of locations, loaded with one query per level.
#[derive(Default)]
pub(crate) struct Locations {
    countries: HashMap<i64, country::Model>,
    provinces: HashMap<i64, province::Model>,
    cities: HashMap<i64, city::Model>,
}

impl Locations {
    pub(crate) async fn load(
        db: &DbPool,
        province_ids: Vec<i64>,
        city_ids: Vec<i64>,
    ) -> Result<Self, DbErr> {
        let mut locations = Locations::default();
        if !city_ids.is_empty() {
            locations.cities = city::Entity::find()
                .filter(city::Column::Id.is_in(city_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect();
        }

        let mut province_ids = province_ids;
        province_ids.extend(locations.cities.values().map(|c| c.province_id));
        if !province_ids.is_empty() {
            locations.provinces = province::Entity::find()
                .filter(province::Column::Id.is_in(province_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();
        }

        let country_ids: Vec<i64> = locations.provinces.values().map(|p| p.country_id).collect();
        if !country_ids.is_empty() {
            locations.countries = country::Entity::find()
                .filter(country::Column::Id.is_in(country_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect();
        }
        Ok(locations)
    }

    pub(crate) fn province(&self, id: i64) -> Option<ProvinceResponse> {
        let province = self.provinces.get(&id)?;
        let country = self.countries.get(&province.country_id)?;
        Some(ProvinceResponse::new(
            province.clone(),
            CountryResponse::from(country.clone()),
        ))
    }

    pub(crate) fn city(&self, id: i64) -> Option<CityResponse> {
        let city = self.cities.get(&id)?;
        let province = self.province(city.province_id)?;
        Some(CityResponse::new(city.clone(), province))
    }

    pub(crate) fn district(&self, district: district::Model) -> Option<DistrictResponse> {
        let city = self.city(district.city_id)?;
        Some(DistrictResponse::new(district, city))
    }
}

fn search_term(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn by_name<E: EntityTrait>(
    mut select: Select<E>,
    name_col: E::Column,
    query: &LocationQuery,
) -> Select<E> {
    if let Some(search) = search_term(&query.search) {
        select = select.filter(name_col.contains(search));
    }
    if let Some(name) = search_term(&query.name) {
        select = select.filter(name_col.eq(name));
    }
    select.order_by_desc(name_col)
}

#[utoipa::path(
    get,
    path = "/api/location/countries",
    params(PageParams, LocationQuery),
    responses(
        (status = 200, description = "Countries ordered by name descending", body = CountryPage),
        (status = 404, description = "Page out of range")
    ),
    tag = "location"
)]
pub async fn list_countries(
    query: web::Query<LocationQuery>,
    page: web::Query<PageParams>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let mut select = country::Entity::find();
    if let Some(search) = search_term(&query.search) {
        select = select.filter(
            Condition::any()
                .add(country::Column::Name.contains(search))
                .add(country::Column::Code.contains(search)),
        );
    }
    if let Some(name) = search_term(&query.name) {
        select = select.filter(country::Column::Name.eq(name));
    }
    let select = select.order_by_desc(country::Column::Name);

    let found = paginate_numbered(pool.get_ref(), select, &page, pagination::LOCATIONS).await?;
    let body: CountryPage = found.map(CountryResponse::from);
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/location/countries/{id}",
    params(
        ("id" = i64, Path, description = "Country id")
    ),
    responses(
        (status = 200, description = "Country", body = CountryResponse),
        (status = 404, description = "Country not found")
    ),
    tag = "location"
)]
pub async fn get_country(
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let found = country::Entity::find_by_id(path.into_inner())
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(CountryResponse::from(found)))
}

#[utoipa::path(
    get,
    path = "/api/location/provinces",
    params(PageParams, LocationQuery),
    responses(
        (status = 200, description = "Provinces ordered by name descending", body = ProvincePage),
        (status = 404, description = "Page out of range")
    ),
    tag = "location"
)]
pub async fn list_provinces(
    query: web::Query<LocationQuery>,
    page: web::Query<PageParams>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let mut select = province::Entity::find();
    if let Some(country_id) = query.country_id {
        select = select.filter(province::Column::CountryId.eq(country_id));
    }
    let select = by_name(select, province::Column::Name, &query);

    let found = paginate_numbered(pool.get_ref(), select, &page, pagination::LOCATIONS).await?;
    let ids = found.results.iter().map(|p| p.id).collect();
    let locations = Locations::load(&pool, ids, Vec::new()).await?;
    let body: ProvincePage = found.filter_map(|p| locations.province(p.id));
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/location/provinces/{id}",
    params(
        ("id" = i64, Path, description = "Province id")
    ),
    responses(
        (status = 200, description = "Province with its country", body = ProvinceResponse),
        (status = 404, description = "Province not found")
    ),
    tag = "location"
)]
pub async fn get_province(
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let locations = Locations::load(&pool, vec![id], Vec::new()).await?;
    let body = locations.province(id).ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/location/cities",
    params(PageParams, LocationQuery),
    responses(
        (status = 200, description = "Cities ordered by name descending", body = CityPage),
        (status = 404, description = "Page out of range")
    ),
    tag = "location"
)]
pub async fn list_cities(
    query: web::Query<LocationQuery>,
    page: web::Query<PageParams>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let mut select = city::Entity::find();
    if let Some(province_id) = query.province_id {
        select = select.filter(city::Column::ProvinceId.eq(province_id));
    }
    let select = by_name(select, city::Column::Name, &query);

    let found = paginate_numbered(pool.get_ref(), select, &page, pagination::LOCATIONS).await?;
    let ids = found.results.iter().map(|c| c.id).collect();
    let locations = Locations::load(&pool, Vec::new(), ids).await?;
    let body: CityPage = found.filter_map(|c| locations.city(c.id));
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/location/cities/{id}",
    params(
        ("id" = i64, Path, description = "City id")
    ),
    responses(
        (status = 200, description = "City with its province", body = CityResponse),
        (status = 404, description = "City not found")
    ),
    tag = "location"
)]
pub async fn get_city(path: web::Path<i64>, pool: web::Data<DbPool>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let locations = Locations::load(&pool, Vec::new(), vec![id]).await?;
    let body = locations.city(id).ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/location/districts",
    params(PageParams, LocationQuery),
    responses(
        (status = 200, description = "Districts ordered by name descending", body = DistrictPage),
        (status = 404, description = "Page out of range")
    ),
    tag = "location"
)]
pub async fn list_districts(
    query: web::Query<LocationQuery>,
    page: web::Query<PageParams>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let mut select = district::Entity::find();
    if let Some(city_id) = query.city_id {
        select = select.filter(district::Column::CityId.eq(city_id));
    }
    let select = by_name(select, district::Column::Name, &query);

    let found = paginate_numbered(pool.get_ref(), select, &page, pagination::LOCATIONS).await?;
    let ids = found.results.iter().map(|d| d.city_id).collect();
    let locations = Locations::load(&pool, Vec::new(), ids).await?;
    let body: DistrictPage = found.filter_map(|d| locations.district(d));
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/location/districts/{id}",
    params(
        ("id" = i64, Path, description = "District id")
    ),
    responses(
        (status = 200, description = "District with its city", body = DistrictResponse),
        (status = 404, description = "District not found")
    ),
    tag = "location"
)]
pub async fn get_district(
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> ApiResult<HttpResponse> {
    let found = district::Entity::find_by_id(path.into_inner())
        .one(pool.get_ref())
        .await?
        .ok_or_else(ApiError::not_found)?;
    let locations = Locations::load(&pool, Vec::new(), vec![found.city_id]).await?;
    let body = locations.district(found).ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(body))
}
