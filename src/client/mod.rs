// src/client/mod.rs
//! HTTP collaborator used by department screens.
//!
//! Every call takes an explicit [`RequestContext`] carrying the backend base
//! URL and the operator's bearer token; nothing is read from globals.

pub mod search;
pub mod session;

pub use search::{BatchSearch, LatestWins, Ticket};
pub use session::{EntrySession, Lookup, RemainingRead, Resolved, Submission};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ErrorResponse;
use crate::handlers::ApiResponse;
use crate::ledger::{LedgerError, LedgerResult, Process};
use crate::models::{BatchDetails, BatchSuggestion, NewTag, ProductionEntry, RemainingResponse};

const API_PREFIX: &str = "/api/v1";

// ==================== REQUEST CONTEXT ====================

#[derive(Clone)]
pub struct RequestContext {
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RequestContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of an API path such as `/batch_details/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

// ==================== API SEAM ====================

/// Ledger reads and commands as seen from a department screen.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn batch_details(&self, ctx: &RequestContext, batch_id: &str) -> LedgerResult<BatchDetails>;

    /// Stage-keyed reads and writes; the server works out the acting
    /// department from the token.
    async fn remaining(
        &self,
        ctx: &RequestContext,
        process: Process,
        batch_id: &str,
        component: Option<&str>,
    ) -> LedgerResult<RemainingResponse>;

    async fn child_components(&self, ctx: &RequestContext, parent_component: &str) -> LedgerResult<Vec<String>>;

    async fn suggest_batches(&self, ctx: &RequestContext, partial: &str) -> LedgerResult<Vec<BatchSuggestion>>;

    /// Returns how many rows were recorded.
    async fn bulk_add(
        &self,
        ctx: &RequestContext,
        process: Process,
        rows: &[ProductionEntry],
    ) -> LedgerResult<usize>;

    async fn add_tags(&self, ctx: &RequestContext, tags: &[NewTag]) -> LedgerResult<usize>;
}

#[derive(Debug, Serialize)]
struct BulkAddBody<'a> {
    rows: &'a [ProductionEntry],
}

#[derive(Debug, Serialize)]
struct TagsBody<'a> {
    tags: &'a [NewTag],
}

#[derive(Debug, Deserialize)]
struct Recorded {
    recorded: usize,
}

// ==================== REQWEST CLIENT ====================

#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: Client,
}

impl LedgerClient {
    pub fn new(timeout: Duration) -> LedgerResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::NetworkFailure(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn from_config(config: &ClientConfig) -> LedgerResult<Self> {
        Self::new(Duration::from_secs(config.timeout_seconds))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: &[(&str, &str)],
        subject: &str,
    ) -> LedgerResult<T> {
        let request = ctx.authorize(self.http.get(ctx.url(path)).query(query));
        read(send(request).await?, subject).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
    ) -> LedgerResult<T> {
        let request = ctx.authorize(self.http.post(ctx.url(path)).json(body));
        read(send(request).await?, path).await
    }
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn batch_details(&self, ctx: &RequestContext, batch_id: &str) -> LedgerResult<BatchDetails> {
        self.get(ctx, "/batch_details/", &[("batch_id", batch_id)], batch_id).await
    }

    async fn remaining(
        &self,
        ctx: &RequestContext,
        process: Process,
        batch_id: &str,
        component: Option<&str>,
    ) -> LedgerResult<RemainingResponse> {
        let path = format!("/batch_remaining_qty/{}/", process);
        let mut query = vec![("batch_id", batch_id)];
        if let Some(component) = component {
            query.push(("component", component));
        }
        self.get(ctx, &path, &query, component.unwrap_or(batch_id)).await
    }

    async fn child_components(&self, ctx: &RequestContext, parent_component: &str) -> LedgerResult<Vec<String>> {
        self.get(
            ctx,
            "/get_child_components/",
            &[("parent_component", parent_component)],
            parent_component,
        )
        .await
    }

    async fn suggest_batches(&self, ctx: &RequestContext, partial: &str) -> LedgerResult<Vec<BatchSuggestion>> {
        self.get(ctx, "/issuebatch/suggestions/", &[("q", partial)], partial).await
    }

    async fn bulk_add(
        &self,
        ctx: &RequestContext,
        process: Process,
        rows: &[ProductionEntry],
    ) -> LedgerResult<usize> {
        let path = format!("/{}/bulk-add/", process);
        let recorded: Recorded = self.post(ctx, &path, &BulkAddBody { rows }).await?;
        log::info!("Recorded {} row(s) at {}", recorded.recorded, process.display_name());
        Ok(recorded.recorded)
    }

    async fn add_tags(&self, ctx: &RequestContext, tags: &[NewTag]) -> LedgerResult<usize> {
        let recorded: Recorded = self.post(ctx, "/tags/", &TagsBody { tags }).await?;
        Ok(recorded.recorded)
    }
}

async fn send(request: RequestBuilder) -> LedgerResult<Response> {
    request.send().await.map_err(|e| {
        log::warn!("Ledger request failed: {}", e);
        LedgerError::NetworkFailure(e.to_string())
    })
}

async fn read<T: DeserializeOwned>(response: Response, subject: &str) -> LedgerResult<T> {
    let status = response.status();
    if status.is_success() {
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::NetworkFailure(format!("malformed response: {}", e)))?;
        return envelope.data.ok_or_else(|| LedgerError::Remote {
            status: status.as_u16(),
            message: "response carried no data".to_string(),
        });
    }

    let body = response.json::<ErrorResponse>().await.ok();
    Err(error_from_response(status, body, subject))
}

/// Maps an error reply back onto the ledger taxonomy.
pub fn error_from_response(status: StatusCode, body: Option<ErrorResponse>, subject: &str) -> LedgerError {
    let (message, field, errors) = match body {
        Some(body) => (body.message, body.field, body.errors),
        None => (status.canonical_reason().unwrap_or("request failed").to_string(), None, Vec::new()),
    };

    match status {
        StatusCode::NOT_FOUND => LedgerError::NotFound {
            entity: if field.as_deref() == Some("component") { "component" } else { "batch" },
            id: subject.to_string(),
        },
        StatusCode::UNPROCESSABLE_ENTITY if !errors.is_empty() => LedgerError::RowsRejected(errors),
        _ => LedgerError::Remote { status: status.as_u16(), message },
    }
}
