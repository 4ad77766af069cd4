use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use heisei_core::ForumError;

/// [`ForumError`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub ForumError);

impl From<ForumError> for ApiError {
    fn from(err: ForumError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ForumError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ForumError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ForumError::ThreadNotFound { .. } | ForumError::NotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ForumError::Conflict { .. } => StatusCode::CONFLICT,
            ForumError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ForumError::Transaction { .. } | ForumError::RollbackFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
        }));
        let mut response = (self.status(), body).into_response();

        if let ForumError::RateLimited { retry_after, .. } = &self.0 {
            // Whole seconds, rounded up, never zero.
            let secs = retry_after
                .as_secs()
                .saturating_add(u64::from(retry_after.subsec_nanos() > 0))
                .max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
