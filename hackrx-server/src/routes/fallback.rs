//! Fallback routes.

use crate::error::AppError;
use axum::http::StatusCode;

/// 404 fallback.
pub async fn notfound_404() -> AppError {
    AppError::new(StatusCode::NOT_FOUND, Some("Route does not exist"))
}

#[cfg(test)]
mod tests {
    use crate::{error::parse_error, test_utils::test_context::TestContext};
    use axum::{body::Body, http::Request};
    use http::StatusCode;
    use testresult::TestResult;
    use tower::ServiceExt;

    #[test_log::test(tokio::test)]
    async fn test_unknown_route_is_json_api_404() -> TestResult {
        let ctx = TestContext::new().await?;

        let response = ctx
            .app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let err = parse_error(response).await;
        assert_eq!(err.detail(), Some("Route does not exist"));

        Ok(())
    }
}
