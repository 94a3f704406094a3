use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{EngineError, ErrorCategory};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone(), None)
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone(), None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone(), None)
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
                None,
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            ApiError::Engine(err) => {
                let status = engine_status(err);
                let message = if status.is_server_error() {
                    tracing::error!(code = err.code(), error = %err, "Engine error");
                    "An internal error occurred".to_string()
                } else {
                    err.to_string()
                };
                (status, err.code(), message, err.details())
            }
        }
    }
}

/// HTTP status for an engine failure. Funds shortfalls are conflicts with the
/// current balance; other precondition failures are unprocessable.
pub fn engine_status(err: &EngineError) -> StatusCode {
    match err.category() {
        ErrorCategory::Authorization => match err {
            EngineError::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        },
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Precondition => match err {
            EngineError::InsufficientFunds { .. } | EngineError::InsufficientGroupFunds { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        },
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Internal => match err {
            EngineError::StorageUnavailable(_) | EngineError::ExternalCollaboratorUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = self.parts();

        let body = ErrorBody {
            success: false,
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Engine(EngineError::from(err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Engine(EngineError::from(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use rust_decimal_macros::dec;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_unauthorized() {
        let error = ApiError::Unauthorized("test message".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_api_error_forbidden() {
        let error = ApiError::Forbidden("access denied".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_api_error_rate_limited() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_api_error_service_unavailable() {
        let error = ApiError::ServiceUnavailable("maintenance".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_engine_authorization_statuses() {
        assert_eq!(
            engine_status(&EngineError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(engine_status(&EngineError::NotAMember), StatusCode::FORBIDDEN);
        assert_eq!(
            engine_status(&EngineError::InsufficientRole("officer".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_engine_precondition_statuses() {
        assert_eq!(
            engine_status(&EngineError::AttendanceRequired),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            engine_status(&EngineError::DuplicateRoundContribution { round: 1 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            engine_status(&EngineError::InsufficientGroupFunds {
                available: dec!(20000),
                required: dec!(50000),
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_engine_other_statuses() {
        assert_eq!(
            engine_status(&EngineError::InvalidAmount("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(engine_status(&EngineError::LoanNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            engine_status(&EngineError::ConcurrencyConflict),
            StatusCode::CONFLICT
        );
        assert_eq!(
            engine_status(&EngineError::StorageUnavailable("pool".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            engine_status(&EngineError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_engine_error_body_carries_code_and_details() {
        let response =
            ApiError::from(EngineError::DuplicateRoundContribution { round: 3 }).into_response();
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "duplicate_round_contribution");
        assert_eq!(body["details"]["current_round"], 3);
    }

    #[tokio::test]
    async fn test_internal_engine_error_hides_message() {
        let response =
            ApiError::from(EngineError::Internal("secret table name".into())).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Unauthorized("test".to_string())),
            "Unauthorized: test"
        );
        assert_eq!(format!("{}", ApiError::RateLimited), "Rate limited");
        assert_eq!(
            format!("{}", ApiError::Engine(EngineError::AttendanceRequired)),
            EngineError::AttendanceRequired.to_string()
        );
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, ApiError::Engine(EngineError::Internal(_))));
    }
}
