use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Validation messages keyed by the offending request field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("Not found.".to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("You do not have permission to perform this action.".to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::Validation(errors) => HttpResponse::build(status).json(errors),
            ApiError::Database(e) => {
                log::error!("Database error: {:?}", e);
                HttpResponse::build(status).json(json!({"error": "Database error"}))
            }
            ApiError::Internal(e) => {
                log::error!("Internal error: {:?}", e);
                HttpResponse::build(status).json(json!({"error": "Internal server error"}))
            }
            other => HttpResponse::build(status).json(json!({"error": other.to_string()})),
        }
    }
}

/// Accumulates field errors so a request reports every problem at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// True when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Maps a unique-index violation to a domain message, passing other errors through.
pub fn unique_or(err: DbErr, message: &str) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::BadRequest(message.to_string())
    } else {
        ApiError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Database};

    #[test]
    fn validator_collects_messages_per_field() {
        let mut v = Validator::new();
        v.add("name", "Name is required.");
        v.add("name", "Name is too long.");
        v.check(false, "price", "Price must be greater than zero.");
        v.check(true, "quantity", "never reported");

        match v.finish() {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(errors["name"].len(), 2);
                assert_eq!(errors["price"], vec!["Price must be greater than zero."]);
                assert!(!errors.contains_key("quantity"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            ApiError::field("a", "b").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::forbidden().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_rt::test]
    async fn unique_violation_detected_from_database_error() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_unprepared("CREATE TABLE tags (name TEXT NOT NULL UNIQUE)")
            .await
            .unwrap();
        db.execute_unprepared("INSERT INTO tags (name) VALUES ('padi')")
            .await
            .unwrap();

        let err = db
            .execute_unprepared("INSERT INTO tags (name) VALUES ('padi')")
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(matches!(
            unique_or(err, "Tag already exists"),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn error_text_alone_is_not_a_unique_violation() {
        let err = DbErr::Custom("UNIQUE constraint failed: follows.follower_id".into());
        assert!(!is_unique_violation(&err));
        assert!(matches!(
            unique_or(err, "Already following this user"),
            ApiError::Database(_)
        ));
    }
}
