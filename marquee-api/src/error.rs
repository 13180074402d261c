use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    Core(CoreError),
}

/// HTTP status for each failure kind.
pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } | CoreError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::SeatNotAvailable(_)
        | CoreError::AlreadyHeld(_)
        | CoreError::NotHolder { .. }
        | CoreError::AlreadyBooked(_)
        | CoreError::AlreadyCancelled(_) => StatusCode::CONFLICT,
        CoreError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
        CoreError::InvalidSignature => StatusCode::UNAUTHORIZED,
        CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
        CoreError::StoreError(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing message. Infrastructure details stay in the logs.
pub fn message_for(err: &CoreError) -> String {
    match err {
        CoreError::StoreError(msg) => {
            tracing::error!("Store unavailable: {}", msg);
            "Service temporarily unavailable".to_string()
        }
        CoreError::InternalError(msg) => {
            tracing::error!("Internal Server Error: {}", msg);
            "Internal Server Error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::Core(err) => (status_for(&err), err.code(), message_for(&err)),
        };

        let body = Json(json!({
            "code": code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Core(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contention_is_conflict() {
        assert_eq!(status_for(&CoreError::AlreadyHeld("A1".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&CoreError::SeatNotAvailable("A1".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&CoreError::PaymentFailed("o1".into())), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_store_details_are_not_leaked() {
        let err = CoreError::StoreError("redis://secret-host refused".into());
        assert_eq!(status_for(&err), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!message_for(&err).contains("secret-host"));
    }
}
