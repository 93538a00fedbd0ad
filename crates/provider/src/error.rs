//! Provider client errors and their mapping onto the classifier input.

use lunara_core::classification::{
    classify, Classification, GenerationErrorCode, ProviderFailure,
};

/// Errors from the video provider client.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Video API error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
        /// Parsed `Retry-After` header, in seconds.
        retry_after_secs: Option<u64>,
    },

    #[error("Video API returned an empty response")]
    EmptyResponse,

    #[error("Video API returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Video API response did not include an operation name")]
    NoOperationId,

    #[error("Video API key is not configured")]
    NotConfigured,
}

impl ProviderError {
    /// Describe the failure for the classifier.
    ///
    /// Non-2xx bodies are parsed for the provider's structured error
    /// envelope (`error.status`, `error.details[].reason`,
    /// `error.message`); anything unparseable is passed on as the message.
    pub fn to_failure(&self) -> ProviderFailure {
        match self {
            Self::Request(e) => {
                let failure = ProviderFailure::from_message(e.to_string());
                match e.status() {
                    Some(status) => failure.with_http_status(status.as_u16()),
                    None if e.is_timeout() => failure.with_http_status(408),
                    None => failure,
                }
            }
            Self::Api {
                status,
                body,
                retry_after_secs,
            } => {
                let mut failure = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.get("error").map(failure_from_error_object))
                    .unwrap_or_else(|| ProviderFailure::from_message(body.clone()));
                failure.http_status = Some(*status);
                failure.retry_after_secs = *retry_after_secs;
                failure
            }
            other => ProviderFailure::from_message(other.to_string()),
        }
    }

    /// Classify this error. Client-side parse failures have fixed codes;
    /// everything else goes through the shared classifier.
    pub fn classification(&self) -> Classification {
        let fixed = |code| Classification {
            code,
            retryable: false,
            retry_after_secs: None,
        };
        match self {
            Self::EmptyResponse => fixed(GenerationErrorCode::EmptyResponse),
            Self::InvalidJson(_) => fixed(GenerationErrorCode::InvalidJson),
            Self::NoOperationId => fixed(GenerationErrorCode::NoOperationId),
            Self::NotConfigured => fixed(GenerationErrorCode::ConfigError),
            Self::Request(_) | Self::Api { .. } => classify(&self.to_failure()),
        }
    }

    /// Provider-supplied detail suitable for appending to a user message.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Api { .. } | Self::Request(_) => {
                let message = self.to_failure().message;
                (!message.trim().is_empty()).then_some(message)
            }
            Self::InvalidJson(detail) => Some(detail.clone()),
            Self::EmptyResponse | Self::NoOperationId | Self::NotConfigured => None,
        }
    }
}

/// Build a classifier input from a provider `error` object:
/// `{"code": 400, "message": "...", "status": "INVALID_ARGUMENT",
///   "details": [{"reason": "API_KEY_INVALID"}]}`.
pub fn failure_from_error_object(error: &serde_json::Value) -> ProviderFailure {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    let status = error
        .get("status")
        .and_then(|s| s.as_str())
        .map(str::to_string);
    let reason = error
        .get("details")
        .and_then(|d| d.as_array())
        .and_then(|details| {
            details
                .iter()
                .find_map(|d| d.get("reason").and_then(|r| r.as_str()))
        })
        .map(str::to_string);
    let http_status = error
        .get("code")
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok())
        .filter(|c| (100..600).contains(c));

    ProviderFailure {
        http_status,
        status,
        reason,
        message,
        retry_after_secs: None,
    }
}
