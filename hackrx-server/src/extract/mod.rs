//! Custom [axum::extract] Extractors.

pub mod bearer;
pub mod bearer_addon;
pub mod json;
