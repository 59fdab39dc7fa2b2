// src/batch_handlers.rs
//! Batch issue, lookup and the per-stage ledger view.

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::AppState;
use crate::audit::audit;
use crate::auth::{get_current_user, require_permission, UserRole};
use crate::error::ApiResult;
use crate::handlers::ApiResponse;
use crate::models::*;

// ==================== BATCH LOOKUP ====================

pub async fn batch_details(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<BatchIdQuery>,
) -> ApiResult<HttpResponse> {
    let batch = app_state.ledger.batch(&query.batch_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(BatchDetails::from(batch))))
}

pub async fn batch_suggestions(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<SearchQuery>,
) -> ApiResult<HttpResponse> {
    let (q, limit) = query.normalize();
    let suggestions = app_state.ledger.suggest_batches(&q, limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(suggestions)))
}

pub async fn get_child_components(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<ChildComponentQuery>,
) -> ApiResult<HttpResponse> {
    let children = app_state.ledger.child_components(&query.parent_component).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(children)))
}

// ==================== LEDGER VIEW ====================

pub async fn batch_ledger(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<BatchIdQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    get_current_user(&http_request)?;
    let ledger = app_state.ledger.batch_ledger(&query.batch_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ledger)))
}

// ==================== MASTER DATA ====================

pub async fn create_batch(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateBatchRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, UserRole::can_manage_master_data)?;
    request.validate()?;

    let batch = app_state.store.create_batch(&request, &claims.username).await?;

    audit(
        &app_state.db_pool,
        &claims.sub,
        "create",
        "batch",
        &batch.batch_id,
        &format!("Issued batch {} of {} ({} pcs)", batch.batch_id, batch.component, batch.max_qty),
        None,
        &http_request,
    ).await;

    log::info!("Batch {} issued by {}", batch.batch_id, claims.username);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        BatchDetails::from(batch),
        "Batch issued".to_string(),
    )))
}

pub async fn create_child_component(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateChildComponentRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, UserRole::can_manage_master_data)?;
    request.validate()?;

    app_state.store.add_child_component(&request).await?;

    audit(
        &app_state.db_pool,
        &claims.sub,
        "create",
        "child_component",
        &request.parent_component,
        &format!("{} splits into {}", request.parent_component, request.child_component),
        None,
        &http_request,
    ).await;

    let children = app_state.ledger.child_components(&request.parent_component).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(children)))
}
