// src/production_handlers.rs
//! Remaining-quantity reads and production/tag submissions per department.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use crate::AppState;
use crate::audit::audit;
use crate::auth::get_current_user;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::ledger::{Department, EntryRows, Process, ProcessSequence};
use crate::models::*;

// ==================== PATH RESOLUTION ====================

/// Department named in the URL. Stage aliases such as `ht` are accepted too.
pub fn department_from_path(name: &str) -> ApiResult<Department> {
    let name = name.trim();
    Department::from_str(name)
        .or_else(|_| Process::from_str(name).map(Department::for_stage))
        .map_err(|_| ApiError::unknown_department(name))
}

/// Stage recorded by the department named in the URL.
pub fn stage_from_path(name: &str) -> ApiResult<Process> {
    department_from_path(name)?
        .own_stage()
        .ok_or_else(|| ApiError::bad_request("Admin is not a production stage"))
}

// ==================== REQUEST/RESPONSE STRUCTURES ====================

#[derive(Debug, Deserialize)]
pub struct ProcessSequenceQuery {
    pub current: Option<Process>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextStages {
    pub department: Department,
    pub current: Process,
    pub allowed_next: Vec<Process>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResult<T> {
    pub recorded: usize,
    pub records: Vec<T>,
}

// ==================== READS ====================

pub async fn batch_remaining_qty(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<RemainingQuery>,
) -> ApiResult<HttpResponse> {
    let process = stage_from_path(&path)?;
    let remaining = app_state
        .ledger
        .remaining(&query.batch_id, process, query.component.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(remaining)))
}

pub async fn process_sequence(
    path: web::Path<String>,
    query: web::Query<ProcessSequenceQuery>,
) -> ApiResult<HttpResponse> {
    let department = department_from_path(&path)?;
    let current = query
        .current
        .or_else(|| department.own_stage())
        .ok_or_else(|| ApiError::bad_request("current stage is required"))?;

    let allowed_next = ProcessSequence::allowed_next(department, current)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(NextStages {
        department,
        current,
        allowed_next,
    })))
}

// ==================== SUBMISSIONS ====================

pub async fn bulk_add(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<BulkAddRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    let process = stage_from_path(&path)?;
    let department = claims.acting_department(process)?;
    request.validate()?;

    let rows = EntryRows::from_entries(request.into_inner().rows);
    let records = app_state
        .ledger
        .submit_production(department, process, &rows, &claims.username)
        .await?;

    let mut per_batch: BTreeMap<&str, i64> = BTreeMap::new();
    for record in &records {
        *per_batch.entry(record.batch_id.as_str()).or_default() += record.quantity_produced;
    }
    for (batch_id, pieces) in per_batch {
        audit(
            &app_state.db_pool,
            &claims.sub,
            "record",
            "production",
            batch_id,
            &format!("{}: {} pcs", process, pieces),
            Some(&serde_json::json!({ "process": process, "pieces": pieces })),
            &http_request,
        ).await;
    }

    let recorded = records.len();
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        SubmissionResult { recorded, records },
        format!("{} row(s) recorded", recorded),
    )))
}

pub async fn add_tags(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<TagBatchRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    let department = claims.department()?;
    request.validate()?;

    let records = app_state
        .ledger
        .submit_tags(department, &request.tags, &claims.username)
        .await?;

    for record in &records {
        audit(
            &app_state.db_pool,
            &claims.sub,
            "tag",
            "batch",
            &record.batch_id,
            &format!("{} {} pcs at {}", record.status, record.qty, record.current_process),
            None,
            &http_request,
        ).await;
    }

    let recorded = records.len();
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        SubmissionResult { recorded, records },
        format!("{} tag(s) recorded", recorded),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_from_path() {
        assert_eq!(department_from_path("cnc").unwrap(), Department::Cnc);
        assert_eq!(department_from_path("machining").unwrap(), Department::Cnc);
        assert_eq!(department_from_path("FI").unwrap(), Department::FinalInspection);
        assert_eq!(department_from_path("ht").unwrap(), Department::HeatTreatment);
        assert_eq!(department_from_path("forging").unwrap(), Department::Forging);
        assert!(matches!(department_from_path("painting"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_stage_from_path() {
        assert_eq!(stage_from_path("cnc").unwrap(), Process::Machining);
        assert_eq!(stage_from_path("dispatch").unwrap(), Process::Dispatch);
        assert!(matches!(stage_from_path("admin"), Err(ApiError::BadRequest(_))));
    }
}
