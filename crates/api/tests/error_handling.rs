//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly; no server is involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use lunara_api::error::AppError;
use lunara_core::error::CoreError;
use lunara_core::quota::QuotaViolation;
use lunara_pipeline::{StoreError, SubmitError};

/// Convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Generation job",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Generation job with id 42 not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("prompt must not be empty".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "prompt must not be empty");
}

#[tokio::test]
async fn unauthorized_error_returns_401() {
    let err = AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn quota_violations_return_403_with_specific_codes() {
    let cases = [
        (
            QuotaViolation::LimitReached {
                tier: "free",
                cap: 10,
            },
            "LIMIT_REACHED",
        ),
        (
            QuotaViolation::LengthLimit {
                tier: "free",
                requested: 8,
                max: 6,
            },
            "LENGTH_LIMIT",
        ),
        (
            QuotaViolation::InsufficientCredits {
                required: 10,
                available: 3,
            },
            "INSUFFICIENT_CREDITS",
        ),
    ];

    for (violation, code) in cases {
        let message = violation.to_string();
        let (status, json) = error_to_response(AppError::Quota(violation)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], code);
        assert_eq!(json["error"], message);
    }
}

#[tokio::test]
async fn not_configured_returns_500_config_error() {
    let (status, json) = error_to_response(AppError::NotConfigured).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "CONFIG_ERROR");
    assert_eq!(json["error"], "Video generation is not configured");
}

#[tokio::test]
async fn database_errors_are_sanitized() {
    let err = AppError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn submit_errors_map_onto_http_errors() {
    let (status, json) =
        error_to_response(SubmitError::UserNotFound(5).into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "User with id 5 not found");

    let (status, json) = error_to_response(SubmitError::NotConfigured.into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "CONFIG_ERROR");

    let (status, _) = error_to_response(
        SubmitError::Quota(QuotaViolation::InsufficientCredits {
            required: 12,
            available: 0,
        })
        .into(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
