// src/models/mod.rs

pub mod batch;
pub mod component;
pub mod production;
pub mod tag;

pub use batch::*;
pub use component::*;
pub use production::*;
pub use tag::*;

use serde::Deserialize;

// ==================== COMMON / SHARED ====================

/// Autocomplete query
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    pub fn normalize(&self) -> (String, i64) {
        let q = self.q.as_deref().unwrap_or("").trim().to_string();
        let limit = self.limit.unwrap_or(10).clamp(1, 50);
        (q, limit)
    }
}
