// src/models/production.rs
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

use crate::ledger::{Availability, Process, ProductionStatus};

/// One row of a department's production form, before it is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProductionEntry {
    #[validate(length(min = 1, max = 64, message = "Batch ID must be between 1 and 64 characters"))]
    pub batch_id: String,
    #[validate(length(min = 1, max = 128, message = "Component must be between 1 and 128 characters"))]
    pub component: Option<String>,
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 20, message = "Shift must be between 1 and 20 characters"))]
    pub shift: String,
    pub quantity_produced: f64,
    #[serde(default)]
    pub status: ProductionStatus,
    #[validate(length(max = 100, message = "Verified by cannot exceed 100 characters"))]
    pub verified_by: Option<String>,
    pub next_process: Option<Process>,
    /// Department-specific measurements; opaque to the ledger.
    #[serde(default)]
    pub measurements: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct BulkAddRequest {
    #[validate(length(min = 1, max = 200, message = "Between 1 and 200 rows per submission"), nested)]
    pub rows: Vec<ProductionEntry>,
}

/// An accepted entry ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProductionRecord {
    pub batch_id: String,
    pub process: Process,
    pub component: String,
    pub date: NaiveDate,
    pub shift: String,
    pub quantity_produced: i64,
    pub status: ProductionStatus,
    pub verified_by: Option<String>,
    pub next_process: Option<Process>,
    pub measurements: serde_json::Value,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductionRecord {
    pub id: String,
    pub batch_id: String,
    pub process: Process,
    pub component: String,
    pub date: NaiveDate,
    pub shift: String,
    pub quantity_produced: i64,
    pub status: ProductionStatus,
    pub verified_by: Option<String>,
    pub next_process: Option<Process>,
    pub measurements: Json<serde_json::Value>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RemainingQuery {
    pub batch_id: String,
    pub component: Option<String>,
}

/// Unified shape of the per-department remaining-quantity read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemainingResponse {
    pub batch_id: String,
    pub department: Process,
    pub component: String,
    pub upstream_supply: i64,
    pub already_produced: i64,
    pub remaining_qty: i64,
}

impl RemainingResponse {
    pub fn new(batch_id: &str, process: Process, component: &str, availability: Availability) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            department: process,
            component: component.to_string(),
            upstream_supply: availability.upstream_supply,
            already_produced: availability.already_produced,
            remaining_qty: availability.remaining,
        }
    }
}
