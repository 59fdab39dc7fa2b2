use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::{LedgerError, RowError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    AuthError(String),
    Ledger(LedgerError),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body. `code`, `field` and `errors` are only present for ledger
/// rejections.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RowError>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
            ApiError::AuthError(msg) => write!(f, "Auth Error: {}", msg),
            ApiError::Ledger(err) => write!(f, "{}", err),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) | ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DatabaseError(_) | ApiError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Ledger(err) => match err {
                LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LedgerError::NetworkFailure(_) | LedgerError::Remote { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: None,
            field: None,
            errors: Vec::new(),
        };

        match self {
            ApiError::DatabaseError(err) => {
                log::error!("Database error: {}", err);
                error_response.message = "Database Error".to_string();
            }
            ApiError::Ledger(err) => {
                if let LedgerError::Storage(detail) = err {
                    log::error!("Ledger storage error: {}", detail);
                    error_response.message = "Storage error".to_string();
                }
                error_response.code = Some(err.code().to_string());
                let field = err.field();
                if !field.is_empty() {
                    error_response.field = Some(field.to_string());
                }
                if let LedgerError::RowsRejected(rows) = err {
                    error_response.errors = rows.clone();
                }
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(error_response)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn batch_already_exists(batch_id: &str) -> Self {
        ApiError::BadRequest(format!("Batch '{}' already exists", batch_id))
    }

    pub fn unknown_department(name: &str) -> Self {
        ApiError::NotFound(format!("Unknown department '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Process, RowId};
    use actix_web::body::to_bytes;

    #[test]
    fn test_ledger_status_codes() {
        let not_found: ApiError = LedgerError::batch_not_found("B-1").into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let business: ApiError = LedgerError::NoRemainingQuantity { process: Process::Visual }.into();
        assert_eq!(business.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let storage: ApiError = LedgerError::Storage("disk full".into()).into();
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_rt::test]
    async fn test_row_rejections_are_echoed() {
        let err: ApiError = LedgerError::RowsRejected(vec![RowError {
            row: RowId(1),
            field: "quantity_produced".to_string(),
            code: "quantity_exceeded".to_string(),
            message: "too many".to_string(),
        }])
        .into();

        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.code.as_deref(), Some("rows_rejected"));
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].row, RowId(1));
    }

    #[actix_rt::test]
    async fn test_storage_detail_is_not_leaked() {
        let err: ApiError = LedgerError::Storage("/var/lib/ledger.db locked".into()).into();
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.message, "Storage error");
    }
}
