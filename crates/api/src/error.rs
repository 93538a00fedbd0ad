use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lunara_core::classification::GenerationErrorCode;
use lunara_core::error::CoreError;
use lunara_core::quota::QuotaViolation;
use lunara_pipeline::{StoreError, SubmitError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Only synchronous request problems surface here; failures inside a
/// running generation are recorded on the job instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `lunara_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The caller's tier, monthly allowance or balance refuses the request.
    #[error(transparent)]
    Quota(#[from] QuotaViolation),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Video provider credentials are missing.
    #[error("Video generation is not configured")]
    NotConfigured,
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(e) => AppError::Core(e),
            SubmitError::Quota(v) => AppError::Quota(v),
            SubmitError::NotConfigured => AppError::NotConfigured,
            SubmitError::UserNotFound(id) => AppError::Core(CoreError::NotFound {
                entity: "User",
                id,
            }),
            SubmitError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            AppError::Quota(violation) => {
                (StatusCode::FORBIDDEN, violation.code(), violation.to_string())
            }

            AppError::Store(StoreError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            AppError::Store(StoreError::Database(err)) => classify_sqlx_error(err),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotConfigured => {
                let code = GenerationErrorCode::ConfigError;
                tracing::error!("Generation requested but the video provider has no API key");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code.as_str(),
                    code.user_message().to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// `RowNotFound` maps to 404; everything else to a sanitized 500.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
