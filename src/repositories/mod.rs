// src/repositories/mod.rs
//! SQLite persistence for the ledger.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::ledger::{LedgerResult, LedgerStore, Process, StatusTotal};
use crate::models::{
    Batch, BatchSuggestion, CreateBatchRequest, CreateChildComponentRequest, NewProductionRecord,
    NewTagRecord,
};

#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_batch(&self, request: &CreateBatchRequest, created_by: &str) -> ApiResult<Batch> {
        let batch_id = request.batch_id.trim();
        let exists: Option<String> = sqlx::query_scalar("SELECT batch_id FROM batches WHERE batch_id = ?")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(ApiError::batch_already_exists(batch_id));
        }

        let batch = Batch {
            batch_id: batch_id.to_string(),
            component: request.component.trim().to_string(),
            grade: request.grade.clone(),
            heat_no: request.heat_no.clone(),
            customer: request.customer.clone(),
            supplier: request.supplier.clone(),
            max_qty: request.max_qty,
            slug_weight: request.slug_weight,
            created_by: Some(created_by.to_string()),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO batches (
                batch_id, component, grade, heat_no, customer, supplier,
                max_qty, slug_weight, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
            .bind(&batch.batch_id)
            .bind(&batch.component)
            .bind(&batch.grade)
            .bind(&batch.heat_no)
            .bind(&batch.customer)
            .bind(&batch.supplier)
            .bind(batch.max_qty)
            .bind(batch.slug_weight)
            .bind(&batch.created_by)
            .bind(batch.created_at)
            .execute(&self.pool)
            .await?;

        Ok(batch)
    }

    /// Registering the same pair twice is a no-op.
    pub async fn add_child_component(&self, request: &CreateChildComponentRequest) -> ApiResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO child_components (parent_component, child_component, created_at) VALUES (?, ?, ?)"
        )
            .bind(request.parent_component.trim())
            .bind(request.child_component.trim())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn like_pattern(partial: &str) -> String {
    let escaped = partial
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn find_batch(&self, batch_id: &str) -> LedgerResult<Option<Batch>> {
        let batch = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE batch_id = ?")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(batch)
    }

    async fn child_components(&self, parent_component: &str) -> LedgerResult<Vec<String>> {
        let children = sqlx::query_scalar::<_, String>(
            "SELECT child_component FROM child_components WHERE parent_component = ? ORDER BY child_component"
        )
            .bind(parent_component)
            .fetch_all(&self.pool)
            .await?;
        Ok(children)
    }

    async fn produced_total(
        &self,
        batch_id: &str,
        process: Process,
        component: Option<&str>,
    ) -> LedgerResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"SELECT COALESCE(SUM(quantity_produced), 0) FROM production_records
               WHERE batch_id = ? AND process = ? AND status = 'ok'
                 AND (? IS NULL OR component = ?)"#
        )
            .bind(batch_id)
            .bind(process)
            .bind(component)
            .bind(component)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn status_totals(&self, batch_id: &str) -> LedgerResult<Vec<StatusTotal>> {
        let totals = sqlx::query_as::<_, StatusTotal>(
            r#"SELECT process, component, status, SUM(quantity_produced) AS quantity
               FROM production_records
               WHERE batch_id = ?
               GROUP BY process, component, status"#
        )
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(totals)
    }

    async fn append_records(&self, records: &[NewProductionRecord]) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for record in records {
            sqlx::query(
                r#"INSERT INTO production_records (
                    id, batch_id, process, component, date, shift, quantity_produced,
                    status, verified_by, next_process, measurements, created_by, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
            )
                .bind(Uuid::new_v4().to_string())
                .bind(&record.batch_id)
                .bind(record.process)
                .bind(&record.component)
                .bind(record.date)
                .bind(&record.shift)
                .bind(record.quantity_produced)
                .bind(record.status)
                .bind(&record.verified_by)
                .bind(record.next_process)
                .bind(Json(&record.measurements))
                .bind(&record.created_by)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_tags(&self, tags: &[NewTagRecord]) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for tag in tags {
            sqlx::query(
                r#"INSERT INTO tags (
                    id, batch_id, component, current_process, next_process, qty, status, created_by, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
            )
                .bind(Uuid::new_v4().to_string())
                .bind(&tag.batch_id)
                .bind(&tag.component)
                .bind(tag.current_process)
                .bind(tag.next_process)
                .bind(tag.qty)
                .bind(tag.status)
                .bind(&tag.created_by)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn suggest_batches(&self, partial: &str, limit: i64) -> LedgerResult<Vec<BatchSuggestion>> {
        let suggestions = sqlx::query_as::<_, BatchSuggestion>(
            r#"SELECT batch_id FROM batches
               WHERE batch_id LIKE ? ESCAPE '\'
               ORDER BY batch_id
               LIMIT ?"#
        )
            .bind(like_pattern(partial))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(suggestions)
    }
}
