// src/models/component.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ChildComponentQuery {
    pub parent_component: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateChildComponentRequest {
    #[validate(length(min = 1, max = 128, message = "Parent component must be between 1 and 128 characters"))]
    pub parent_component: String,
    #[validate(length(min = 1, max = 128, message = "Child component must be between 1 and 128 characters"))]
    pub child_component: String,
}
