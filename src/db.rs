// src/db.rs - Database migrations and setup

use sqlx::SqlitePool;
use anyhow::Result;

const PROCESS_NAMES: &str =
    "'forging', 'heat_treatment', 'pre_machining', 'machining', 'final_inspection', 'marking', 'visual', 'dispatch'";

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE CHECK(length(username) >= 3 AND length(username) <= 50),
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'viewer' CHECK(
                role IN ('admin', 'operator', 'viewer')
            ),
            department TEXT,
            is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
            last_login DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until DATETIME
        )
        "#,
    )
        .execute(pool)
        .await?;

    // max_qty is fixed at issue; nothing updates it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            batch_id TEXT PRIMARY KEY CHECK(length(batch_id) > 0 AND length(batch_id) <= 64),
            component TEXT NOT NULL CHECK(length(component) > 0 AND length(component) <= 128),
            grade TEXT CHECK(grade IS NULL OR length(grade) <= 64),
            heat_no TEXT CHECK(heat_no IS NULL OR length(heat_no) <= 64),
            customer TEXT CHECK(customer IS NULL OR length(customer) <= 255),
            supplier TEXT CHECK(supplier IS NULL OR length(supplier) <= 255),
            max_qty INTEGER NOT NULL CHECK(max_qty > 0),
            slug_weight REAL CHECK(slug_weight IS NULL OR slug_weight >= 0),
            created_by TEXT,
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS child_components (
            parent_component TEXT NOT NULL CHECK(length(parent_component) > 0),
            child_component TEXT NOT NULL CHECK(length(child_component) > 0),
            created_at DATETIME NOT NULL,
            PRIMARY KEY (parent_component, child_component)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS production_records (
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            process TEXT NOT NULL CHECK(process IN ({names})),
            component TEXT NOT NULL,
            date DATE NOT NULL,
            shift TEXT NOT NULL CHECK(length(shift) > 0 AND length(shift) <= 20),
            quantity_produced INTEGER NOT NULL CHECK(quantity_produced > 0),
            status TEXT NOT NULL CHECK(status IN ('ok', 'reject', 'rework')),
            verified_by TEXT,
            next_process TEXT CHECK(next_process IS NULL OR next_process IN ({names})),
            measurements TEXT NOT NULL DEFAULT '{{}}',
            created_by TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (batch_id) REFERENCES batches (batch_id)
        )
        "#,
        names = PROCESS_NAMES
    ))
        .execute(pool)
        .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            component TEXT NOT NULL,
            current_process TEXT NOT NULL CHECK(current_process IN ({names})),
            next_process TEXT CHECK(next_process IS NULL OR next_process IN ({names})),
            qty INTEGER NOT NULL CHECK(qty > 0),
            status TEXT NOT NULL CHECK(status IN ('ok', 'reject', 'rework')),
            created_by TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (batch_id) REFERENCES batches (batch_id)
        )
        "#,
        names = PROCESS_NAMES
    ))
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            description TEXT,
            changes TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    let index_queries = [
        "CREATE INDEX IF NOT EXISTS idx_production_batch_process ON production_records(batch_id, process, status)",
        "CREATE INDEX IF NOT EXISTS idx_production_component ON production_records(batch_id, process, component)",
        "CREATE INDEX IF NOT EXISTS idx_tags_batch ON tags(batch_id)",
        "CREATE INDEX IF NOT EXISTS idx_batches_component ON batches(component)",
        "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_logs(entity_type, entity_id)",
    ];

    for query in index_queries.iter() {
        sqlx::query(query).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
