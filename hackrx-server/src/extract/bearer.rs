//! Bearer token authorization extractor

use crate::{app_state::AppState, error::AppError, setups::ServerSetup};
use axum::{
    async_trait,
    extract::{FromRequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt,
};

/// Proof that the request carried the configured bearer token.
///
/// When no token is configured every request is authorized.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

#[async_trait]
impl<S: ServerSetup> FromRequestParts<AppState<S>> for Authorized {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.auth.bearer_token.as_deref() else {
            return Ok(Authorized);
        };

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::unauthorized())?;

        if bearer.token() == expected {
            Ok(Authorized)
        } else {
            tracing::debug!("Rejected request with mismatched bearer token");
            Err(AppError::unauthorized())
        }
    }
}
