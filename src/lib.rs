// src/lib.rs
//! Plant ledger: batch chain-of-custody tracking across production
//! departments, from forging to dispatch.

pub mod audit;
pub mod auth;
pub mod auth_handlers;
pub mod batch_handlers;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod production_handlers;
pub mod repositories;
pub mod routes;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::ledger::Ledger;
use crate::repositories::SqliteLedgerStore;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub store: Arc<SqliteLedgerStore>,
    pub ledger: Arc<Ledger>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteLedgerStore::new(db_pool.clone()));
        let ledger = Arc::new(Ledger::new(store.clone(), config.tolerance_policy()?));
        Ok(Self { db_pool, config, store, ledger })
    }
}
