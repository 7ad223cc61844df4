use crate::error::{ApiError, ApiResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Page size limits of one list endpoint.
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub default_size: u64,
    pub max_size: u64,
}

pub const POSTS: PageSpec = PageSpec { default_size: 15, max_size: 50 };
pub const COMMENTS: PageSpec = PageSpec { default_size: 25, max_size: 50 };
pub const FOLLOWS: PageSpec = PageSpec { default_size: 20, max_size: 100 };
pub const CATALOG: PageSpec = PageSpec { default_size: 20, max_size: 100 };
pub const LOCATIONS: PageSpec = PageSpec { default_size: 25, max_size: 10 };

impl PageSpec {
    pub fn size(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(size) if size > 0 => size.min(self.max_size),
            _ => self.default_size,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CursorParams {
    /// Opaque position returned as `next` or `previous` by an earlier page.
    pub cursor: Option<String>,
    /// Number of results to return per page.
    pub page_size: Option<u64>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(
    PostPage = CursorPage<crate::models::PostResponse>,
    CommentPage = CursorPage<crate::models::CommentResponse>,
    ProfilePage = CursorPage<crate::models::ProfileSummary>,
    ReportPage = CursorPage<crate::models::ReportResponse>,
    VendorPage = CursorPage<crate::models::VendorResponse>,
    ProductPage = CursorPage<crate::models::ProductResponse>,
    CartPage = CursorPage<crate::models::CartResponse>
)]
pub struct CursorPage<T> {
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> CursorPage<T> {
    pub fn empty() -> Self {
        CursorPage {
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Position {
    #[serde(rename = "t")]
    created_at: DateTime<Utc>,
    #[serde(rename = "i")]
    id: i64,
    #[serde(rename = "r")]
    reverse: bool,
}

impl Position {
    fn encode(&self) -> String {
        // Serializing a plain struct cannot fail
        let raw = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(raw)
    }

    fn decode(cursor: &str) -> ApiResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| ApiError::NotFound("Invalid cursor".to_string()))?;
        serde_json::from_slice(&raw).map_err(|_| ApiError::NotFound("Invalid cursor".to_string()))
    }
}

/// Rows that can be placed on a `(created_at, id)` keyset.
pub trait CursorKey {
    fn cursor_key(&self) -> (DateTime<Utc>, i64);
}

fn flip(order: &Order) -> Order {
    match order {
        Order::Asc => Order::Desc,
        _ => Order::Asc,
    }
}

fn beyond<C: ColumnTrait>(
    created_col: C,
    id_col: C,
    order: &Order,
    created_at: DateTime<Utc>,
    id: i64,
) -> Condition {
    let (by_time, by_id) = match order {
        Order::Asc => (created_col.gt(created_at), id_col.gt(id)),
        _ => (created_col.lt(created_at), id_col.lt(id)),
    };
    Condition::any().add(by_time).add(
        Condition::all()
            .add(created_col.eq(created_at))
            .add(by_id),
    )
}

/// Keyset pagination over `(created_at, id)` in the given direction.
pub async fn paginate<E, C>(
    db: &C,
    select: Select<E>,
    created_col: E::Column,
    id_col: E::Column,
    order: Order,
    params: &CursorParams,
    sizes: PageSpec,
) -> ApiResult<CursorPage<E::Model>>
where
    E: EntityTrait,
    E::Model: CursorKey + Sync,
    C: ConnectionTrait,
{
    let size = sizes.size(params.page_size);
    let position = match params.cursor.as_deref() {
        Some(cursor) => Some(Position::decode(cursor)?),
        None => None,
    };
    let reverse = position.as_ref().map(|p| p.reverse).unwrap_or(false);
    let scan = if reverse { flip(&order) } else { order.clone() };

    let mut query = select;
    if let Some(p) = &position {
        query = query.filter(beyond(created_col, id_col, &scan, p.created_at, p.id));
    }
    let mut rows = query
        .order_by(created_col, scan.clone())
        .order_by(id_col, scan)
        .limit(size + 1)
        .all(db)
        .await?;

    let has_more = rows.len() as u64 > size;
    rows.truncate(size as usize);
    if reverse {
        rows.reverse();
    }

    let first = rows.first().map(|r| r.cursor_key());
    let last = rows.last().map(|r| r.cursor_key());
    let make = |key: Option<(DateTime<Utc>, i64)>, reverse: bool| {
        key.map(|(created_at, id)| {
            Position {
                created_at,
                id,
                reverse,
            }
            .encode()
        })
    };

    let (next, previous) = if reverse {
        let resume = position.as_ref().map(|p| {
            Position {
                reverse: false,
                ..p.clone()
            }
            .encode()
        });
        (
            make(last, false).or(resume),
            if has_more { make(first, true) } else { None },
        )
    } else {
        (
            if has_more { make(last, false) } else { None },
            if position.is_some() { make(first, true) } else { None },
        )
    };

    Ok(CursorPage {
        next,
        previous,
        results: rows,
    })
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// 1-based page number.
    pub page: Option<u64>,
    /// Number of results to return per page.
    pub count: Option<u64>,
}

/// Page-number pagination used by reference-data listings.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(
    CountryPage = NumberedPage<crate::models::CountryResponse>,
    ProvincePage = NumberedPage<crate::models::ProvinceResponse>,
    CityPage = NumberedPage<crate::models::CityResponse>,
    DistrictPage = NumberedPage<crate::models::DistrictResponse>
)]
pub struct NumberedPage<T> {
    pub count: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

pub async fn paginate_numbered<E, C>(
    db: &C,
    select: Select<E>,
    params: &PageParams,
    sizes: PageSpec,
) -> ApiResult<NumberedPage<E::Model>>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let size = sizes.size(params.count);
    let page = params.page.unwrap_or(1).max(1);
    let paginator = select.paginate(db, size);
    let total = paginator.num_items().await?;
    let pages = paginator.num_pages().await?;
    if page > 1 && page > pages {
        return Err(ApiError::NotFound("Invalid page.".to_string()));
    }
    let results = paginator.fetch_page(page - 1).await?;

    Ok(NumberedPage {
        count: total,
        next: if page < pages { Some(page + 1) } else { None },
        previous: if page > 1 { Some(page - 1) } else { None },
        results,
    })
}

impl<T> NumberedPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> NumberedPage<U> {
        NumberedPage {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    /// Like `map`, dropping rows whose related data vanished mid-request.
    pub fn filter_map<U>(self, f: impl FnMut(T) -> Option<U>) -> NumberedPage<U> {
        NumberedPage {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().filter_map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_survives_encoding() {
        let position = Position {
            created_at: Utc::now(),
            id: 42,
            reverse: true,
        };
        let decoded = Position::decode(&position.encode()).unwrap();
        assert_eq!(decoded, position);
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        assert!(Position::decode("not a cursor!").is_err());
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(POSTS.size(None), 15);
        assert_eq!(POSTS.size(Some(0)), 15);
        assert_eq!(POSTS.size(Some(30)), 30);
        assert_eq!(POSTS.size(Some(500)), 50);
        assert_eq!(LOCATIONS.size(None), 25);
        assert_eq!(LOCATIONS.size(Some(40)), 10);
    }
}
