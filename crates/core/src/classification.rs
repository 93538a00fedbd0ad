//! Provider error classification.
//!
//! [`classify`] maps a raw provider failure onto a stable
//! [`GenerationErrorCode`] plus a retryable flag. Signals are consulted in
//! a fixed order:
//!
//! 1. structured provider fields (`reason`, then RPC `status`),
//! 2. the HTTP status code,
//! 3. an ordered substring table over the lower-cased message.
//!
//! Anything left over is [`GenerationErrorCode::UnknownError`]. Each stage
//! is a data table so new entries can be added without touching control
//! flow.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Terminal error codes persisted on failed generation jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationErrorCode {
    AuthError,
    PermissionDenied,
    NotFound,
    InvalidRequest,
    RateLimit,
    QuotaExceeded,
    Timeout,
    ContentFiltered,
    ModelUnavailable,
    PlatformError,
    EmptyResponse,
    InvalidJson,
    NoOperationId,
    NoVideoResult,
    DownloadFailed,
    DirectoryError,
    WriteFailed,
    SaveFailed,
    ConfigError,
    Interrupted,
    UnknownError,
}

/// Every code, in declaration order.
pub const ALL_ERROR_CODES: &[GenerationErrorCode] = &[
    GenerationErrorCode::AuthError,
    GenerationErrorCode::PermissionDenied,
    GenerationErrorCode::NotFound,
    GenerationErrorCode::InvalidRequest,
    GenerationErrorCode::RateLimit,
    GenerationErrorCode::QuotaExceeded,
    GenerationErrorCode::Timeout,
    GenerationErrorCode::ContentFiltered,
    GenerationErrorCode::ModelUnavailable,
    GenerationErrorCode::PlatformError,
    GenerationErrorCode::EmptyResponse,
    GenerationErrorCode::InvalidJson,
    GenerationErrorCode::NoOperationId,
    GenerationErrorCode::NoVideoResult,
    GenerationErrorCode::DownloadFailed,
    GenerationErrorCode::DirectoryError,
    GenerationErrorCode::WriteFailed,
    GenerationErrorCode::SaveFailed,
    GenerationErrorCode::ConfigError,
    GenerationErrorCode::Interrupted,
    GenerationErrorCode::UnknownError,
];

impl GenerationErrorCode {
    /// String representation stored in `generation_jobs.error_code`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthError => "AUTH_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::RateLimit => "RATE_LIMIT",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Timeout => "TIMEOUT",
            Self::ContentFiltered => "CONTENT_FILTERED",
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::PlatformError => "PLATFORM_ERROR",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::InvalidJson => "INVALID_JSON",
            Self::NoOperationId => "NO_OPERATION_ID",
            Self::NoVideoResult => "NO_VIDEO_RESULT",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::DirectoryError => "DIRECTORY_ERROR",
            Self::WriteFailed => "WRITE_FAILED",
            Self::SaveFailed => "SAVE_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Interrupted => "INTERRUPTED",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Parse a stored code. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_ERROR_CODES.iter().copied().find(|c| c.as_str() == s)
    }

    /// Human-readable message shown to the user.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::AuthError => "Video service authentication failed",
            Self::PermissionDenied => "Video service denied access to this model",
            Self::NotFound => "The requested video model was not found",
            Self::InvalidRequest => "The video service rejected the request",
            Self::RateLimit => "Too many requests to the video service, try again shortly",
            Self::QuotaExceeded => "The video service quota has been exhausted",
            Self::Timeout => "Video generation timed out",
            Self::ContentFiltered => {
                "Your prompt was blocked by content safety filters, please rephrase it"
            }
            Self::ModelUnavailable => "The video model is temporarily unavailable",
            Self::PlatformError => "The video service encountered an internal error",
            Self::EmptyResponse => "The video service returned an empty response",
            Self::InvalidJson => "The video service returned an unreadable response",
            Self::NoOperationId => "The video service did not accept the generation request",
            Self::NoVideoResult => "Generation finished without producing a video",
            Self::DownloadFailed => "Failed to download the generated video",
            Self::DirectoryError => "Failed to prepare video storage",
            Self::WriteFailed => "Failed to write the generated video",
            Self::SaveFailed => "The saved video file could not be verified",
            Self::ConfigError => "Video generation is not configured",
            Self::Interrupted => "Generation was interrupted by a server restart",
            Self::UnknownError => "Video generation failed",
        }
    }

    /// Whether the user should change their input rather than resubmit
    /// the same request.
    pub fn is_user_actionable(self) -> bool {
        matches!(self, Self::ContentFiltered | Self::InvalidRequest)
    }
}

impl std::fmt::Display for GenerationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the persisted error message: the code's user message with the
/// provider detail appended in parentheses when present.
pub fn format_error_message(code: GenerationErrorCode, detail: Option<&str>) -> String {
    match detail.map(str::trim).filter(|d| !d.is_empty()) {
        Some(detail) => format!("{} ({detail})", code.user_message()),
        None => code.user_message().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Classifier input / output
// ---------------------------------------------------------------------------

/// A provider failure as observed by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFailure {
    /// HTTP status, when the failure came from an HTTP response.
    pub http_status: Option<u16>,
    /// Structured RPC status, e.g. `RESOURCE_EXHAUSTED`.
    pub status: Option<String>,
    /// Structured reason from error details, e.g. `API_KEY_INVALID`.
    pub reason: Option<String>,
    /// Free-form message.
    pub message: String,
    /// Server-provided `Retry-After`, in seconds.
    pub retry_after_secs: Option<u64>,
}

impl ProviderFailure {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub code: GenerationErrorCode,
    pub retryable: bool,
    pub retry_after_secs: Option<u64>,
}

/// Backoff suggested for rate limits when the provider gives none.
pub const DEFAULT_RATE_LIMIT_RETRY_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// Structured `reason` values, matched exactly.
const REASON_RULES: &[(&str, GenerationErrorCode, bool)] = &[
    ("API_KEY_INVALID", GenerationErrorCode::AuthError, false),
    ("API_KEY_EXPIRED", GenerationErrorCode::AuthError, false),
    ("RATE_LIMIT_EXCEEDED", GenerationErrorCode::RateLimit, true),
    ("RESOURCE_PROJECT_QUOTA_EXCEEDED", GenerationErrorCode::QuotaExceeded, false),
    ("SAFETY", GenerationErrorCode::ContentFiltered, false),
    ("CONTENT_FILTERED", GenerationErrorCode::ContentFiltered, false),
    ("MODEL_OVERLOADED", GenerationErrorCode::ModelUnavailable, true),
];

/// Structured RPC `status` values, matched exactly.
const STATUS_RULES: &[(&str, GenerationErrorCode, bool)] = &[
    ("UNAUTHENTICATED", GenerationErrorCode::AuthError, false),
    ("PERMISSION_DENIED", GenerationErrorCode::PermissionDenied, false),
    ("NOT_FOUND", GenerationErrorCode::NotFound, false),
    ("INVALID_ARGUMENT", GenerationErrorCode::InvalidRequest, false),
    ("FAILED_PRECONDITION", GenerationErrorCode::InvalidRequest, false),
    ("RESOURCE_EXHAUSTED", GenerationErrorCode::RateLimit, true),
    ("DEADLINE_EXCEEDED", GenerationErrorCode::Timeout, true),
    ("UNAVAILABLE", GenerationErrorCode::ModelUnavailable, true),
    ("INTERNAL", GenerationErrorCode::PlatformError, true),
];

/// Message substrings, matched in order against the lower-cased message.
const MESSAGE_RULES: &[(&str, GenerationErrorCode, bool)] = &[
    ("rate limit", GenerationErrorCode::RateLimit, true),
    ("too many requests", GenerationErrorCode::RateLimit, true),
    ("quota", GenerationErrorCode::QuotaExceeded, false),
    ("timed out", GenerationErrorCode::Timeout, true),
    ("timeout", GenerationErrorCode::Timeout, true),
    ("deadline exceeded", GenerationErrorCode::Timeout, true),
    ("content filtered", GenerationErrorCode::ContentFiltered, false),
    ("safety", GenerationErrorCode::ContentFiltered, false),
    ("policy violation", GenerationErrorCode::ContentFiltered, false),
    ("api key", GenerationErrorCode::AuthError, false),
    ("unauthorized", GenerationErrorCode::AuthError, false),
    ("permission", GenerationErrorCode::PermissionDenied, false),
    ("overloaded", GenerationErrorCode::ModelUnavailable, true),
    ("unavailable", GenerationErrorCode::ModelUnavailable, true),
    ("not found", GenerationErrorCode::NotFound, false),
    ("invalid json", GenerationErrorCode::InvalidJson, false),
];

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classify a provider failure. Pure: equal inputs give equal outputs.
pub fn classify(failure: &ProviderFailure) -> Classification {
    let (code, retryable) = classify_structured(failure)
        .or_else(|| failure.http_status.and_then(classify_http_status))
        .or_else(|| classify_message(&failure.message))
        .unwrap_or((GenerationErrorCode::UnknownError, false));

    let retry_after_secs = match code {
        GenerationErrorCode::RateLimit => Some(
            failure
                .retry_after_secs
                .unwrap_or(DEFAULT_RATE_LIMIT_RETRY_SECS),
        ),
        _ if retryable => failure.retry_after_secs,
        _ => None,
    };

    Classification {
        code,
        retryable,
        retry_after_secs,
    }
}

fn classify_structured(failure: &ProviderFailure) -> Option<(GenerationErrorCode, bool)> {
    let lookup = |table: &[(&str, GenerationErrorCode, bool)], key: &str| {
        table
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(key))
            .map(|&(_, code, retryable)| (code, retryable))
    };

    failure
        .reason
        .as_deref()
        .and_then(|r| lookup(REASON_RULES, r))
        .or_else(|| {
            failure
                .status
                .as_deref()
                .and_then(|s| lookup(STATUS_RULES, s))
        })
}

fn classify_http_status(status: u16) -> Option<(GenerationErrorCode, bool)> {
    match status {
        400 => Some((GenerationErrorCode::InvalidRequest, false)),
        401 => Some((GenerationErrorCode::AuthError, false)),
        403 => Some((GenerationErrorCode::PermissionDenied, false)),
        404 => Some((GenerationErrorCode::NotFound, false)),
        408 | 504 => Some((GenerationErrorCode::Timeout, true)),
        429 => Some((GenerationErrorCode::RateLimit, true)),
        503 => Some((GenerationErrorCode::ModelUnavailable, true)),
        500..=599 => Some((GenerationErrorCode::PlatformError, true)),
        _ => None,
    }
}

fn classify_message(message: &str) -> Option<(GenerationErrorCode, bool)> {
    let lowered = message.to_lowercase();
    MESSAGE_RULES
        .iter()
        .find(|(pattern, _, _)| lowered.contains(pattern))
        .map(|&(_, code, retryable)| (code, retryable))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
