//! Request and response data types that are common and useful between clients of and the hackrx server

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request to answer questions about a remote document
#[derive(Deserialize, Serialize, Validate, Clone, Debug, ToSchema)]
pub struct RunRequest {
    /// URL the document gets downloaded from
    #[validate(url)]
    #[schema(example = "https://example.com/policy.pdf")]
    pub documents: String,
    /// Questions to answer, in order
    pub questions: Vec<String>,
}

/// Answers to a [`RunRequest`], one per question and in the same order
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct RunResponse {
    /// The answers. Questions that failed are answered with `Error: <reason>`.
    pub answers: Vec<String>,
}
