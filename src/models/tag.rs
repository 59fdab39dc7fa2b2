// src/models/tag.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};

use crate::ledger::{Process, ProductionStatus};

/// A single move of a batch from its current process, with an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewTag {
    #[validate(length(min = 1, max = 64, message = "Batch ID must be between 1 and 64 characters"))]
    pub batch_id: String,
    #[validate(length(min = 1, max = 128, message = "Component must be between 1 and 128 characters"))]
    pub component: Option<String>,
    pub current_process: Process,
    pub next_process: Option<Process>,
    pub qty: f64,
    #[serde(default)]
    pub status: ProductionStatus,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct TagBatchRequest {
    #[validate(length(min = 1, max = 200, message = "Between 1 and 200 tags per submission"), nested)]
    pub tags: Vec<NewTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTagRecord {
    pub batch_id: String,
    pub component: String,
    pub current_process: Process,
    pub next_process: Option<Process>,
    pub qty: i64,
    pub status: ProductionStatus,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: String,
    pub batch_id: String,
    pub component: String,
    pub current_process: Process,
    pub next_process: Option<Process>,
    pub qty: i64,
    pub status: ProductionStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
