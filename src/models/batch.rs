// src/models/batch.rs
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BATCH_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]*$").unwrap();
}

/// Batch codes are printed on route cards; letters, digits and `. _ / -` only.
pub fn validate_batch_id(batch_id: &str) -> Result<(), ValidationError> {
    if BATCH_ID_REGEX.is_match(batch_id.trim()) {
        Ok(())
    } else {
        let mut error = ValidationError::new("batch_id_format");
        error.message = Some("Batch ID may only contain letters, digits, '.', '_', '/' and '-'".into());
        Err(error)
    }
}

/// Raw material or semi-finished stock tracked through the plant.
/// `max_qty` is fixed when the batch is issued.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub component: String,
    pub grade: Option<String>,
    pub heat_no: Option<String>,
    pub customer: Option<String>,
    pub supplier: Option<String>,
    pub max_qty: i64,
    pub slug_weight: Option<f64>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What department screens display after picking a batch.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchDetails {
    pub batch_id: String,
    pub component: String,
    pub heat_no: Option<String>,
    pub grade: Option<String>,
    pub customer: Option<String>,
    pub supplier: Option<String>,
    pub max_qty: i64,
    pub slug_weight: Option<f64>,
}

impl From<Batch> for BatchDetails {
    fn from(batch: Batch) -> Self {
        Self {
            batch_id: batch.batch_id,
            component: batch.component,
            heat_no: batch.heat_no,
            grade: batch.grade,
            customer: batch.customer,
            supplier: batch.supplier,
            max_qty: batch.max_qty,
            slug_weight: batch.slug_weight,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct CreateBatchRequest {
    #[validate(
        length(min = 1, max = 64, message = "Batch ID must be between 1 and 64 characters"),
        custom(function = "validate_batch_id")
    )]
    pub batch_id: String,
    #[validate(length(min = 1, max = 128, message = "Component must be between 1 and 128 characters"))]
    pub component: String,
    #[validate(length(max = 64, message = "Grade cannot exceed 64 characters"))]
    pub grade: Option<String>,
    #[validate(length(max = 64, message = "Heat number cannot exceed 64 characters"))]
    pub heat_no: Option<String>,
    #[validate(length(max = 255, message = "Customer cannot exceed 255 characters"))]
    pub customer: Option<String>,
    #[validate(length(max = 255, message = "Supplier cannot exceed 255 characters"))]
    pub supplier: Option<String>,
    #[validate(range(min = 1, message = "Batch quantity must be at least 1"))]
    pub max_qty: i64,
    #[validate(range(min = 0.0, message = "Slug weight must be non-negative"))]
    pub slug_weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchIdQuery {
    pub batch_id: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct BatchSuggestion {
    pub batch_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(batch_id: &str, max_qty: i64) -> CreateBatchRequest {
        CreateBatchRequest {
            batch_id: batch_id.to_string(),
            component: "SHAFT".to_string(),
            grade: None,
            heat_no: None,
            customer: None,
            supplier: None,
            max_qty,
            slug_weight: None,
        }
    }

    #[test]
    fn test_batch_id_format() {
        assert!(validate_batch_id("B-2024/07.1").is_ok());
        assert!(validate_batch_id(" B_1 ").is_ok());
        assert!(validate_batch_id("-B1").is_err());
        assert!(validate_batch_id("B 1").is_err());
    }

    #[test]
    fn test_create_request_rules() {
        assert!(request("B-1", 500).validate().is_ok());
        assert!(request("B-1", 0).validate().is_err());
        assert!(request("", 10).validate().is_err());
        assert!(request("B#1", 10).validate().is_err());
    }
}
