//! Operation body parsing and result-locator extraction.
//!
//! The provider's result envelope has changed shape across API versions, so
//! the locator is looked up by an ordered list of extractors. The first one
//! that yields a non-empty string wins.

use crate::error::failure_from_error_object;
use crate::provider::OperationStatus;

/// Extracts a result locator from a finished operation body.
pub type LocatorExtractor = fn(&serde_json::Value) -> Option<String>;

/// Known response shapes, highest priority first.
pub const LOCATOR_EXTRACTORS: &[LocatorExtractor] = &[
    generate_video_response_sample,
    generated_videos,
    videos,
    predictions,
    generated_samples,
];

/// Try every extractor in order.
pub fn extract_video_uri(operation: &serde_json::Value) -> Option<String> {
    LOCATOR_EXTRACTORS
        .iter()
        .find_map(|extract| extract(operation))
}

/// Parse an operation body into an [`OperationStatus`].
pub fn parse_operation(body: serde_json::Value) -> OperationStatus {
    let done = body.get("done").and_then(|d| d.as_bool()).unwrap_or(false);
    let error = body.get("error").map(failure_from_error_object);

    let video_response = body.pointer("/response/generateVideoResponse");
    let moderation_filtered_count = video_response
        .and_then(|r| r.get("raiMediaFilteredCount"))
        .and_then(|c| c.as_u64())
        .map(|c| u32::try_from(c).unwrap_or(u32::MAX))
        .unwrap_or(0);
    let moderation_reasons = video_response
        .and_then(|r| r.get("raiMediaFilteredReasons"))
        .and_then(|r| r.as_array())
        .map(|reasons| {
            reasons
                .iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let video_uri = if done { extract_video_uri(&body) } else { None };

    OperationStatus {
        done,
        error,
        moderation_filtered_count,
        moderation_reasons,
        video_uri,
        raw: body,
    }
}

fn non_empty(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn generate_video_response_sample(op: &serde_json::Value) -> Option<String> {
    non_empty(op.pointer("/response/generateVideoResponse/generatedSamples/0/video/uri"))
}

fn generated_videos(op: &serde_json::Value) -> Option<String> {
    non_empty(op.pointer("/response/generatedVideos/0/video/uri"))
}

fn videos(op: &serde_json::Value) -> Option<String> {
    non_empty(op.pointer("/response/videos/0/uri"))
}

fn predictions(op: &serde_json::Value) -> Option<String> {
    non_empty(op.pointer("/response/predictions/0/videoUri"))
}

fn generated_samples(op: &serde_json::Value) -> Option<String> {
    non_empty(op.pointer("/response/generatedSamples/0/video/uri"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn each_known_shape_is_recognised() {
        let shapes = [
            json!({"response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": "a"}}]}}}),
            json!({"response": {"generatedVideos": [{"video": {"uri": "b"}}]}}),
            json!({"response": {"videos": [{"uri": "c"}]}}),
            json!({"response": {"predictions": [{"videoUri": "d"}]}}),
            json!({"response": {"generatedSamples": [{"video": {"uri": "e"}}]}}),
        ];
        let found: Vec<_> = shapes.iter().filter_map(extract_video_uri).collect();
        assert_eq!(found, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn earlier_extractor_wins() {
        let body = json!({"response": {
            "videos": [{"uri": "third"}],
            "generatedVideos": [{"video": {"uri": "second"}}],
        }});
        assert_eq!(extract_video_uri(&body).as_deref(), Some("second"));
    }

    #[test]
    fn blank_locator_falls_through() {
        let body = json!({"response": {
            "generatedVideos": [{"video": {"uri": "  "}}],
            "predictions": [{"videoUri": "real"}],
        }});
        assert_eq!(extract_video_uri(&body).as_deref(), Some("real"));
    }

    #[test]
    fn unknown_shape_yields_none() {
        assert_eq!(extract_video_uri(&json!({"response": {"output": "x"}})), None);
        assert_eq!(extract_video_uri(&json!({})), None);
    }

    #[test]
    fn pending_operation() {
        let status = parse_operation(json!({"name": "models/veo/operations/abc"}));
        assert!(!status.done);
        assert!(status.error.is_none());
        assert!(status.video_uri.is_none());
    }

    #[test]
    fn finished_operation_with_moderation() {
        let status = parse_operation(json!({
            "done": true,
            "response": {"generateVideoResponse": {
                "raiMediaFilteredCount": 1,
                "raiMediaFilteredReasons": ["Unsafe content detected"]
            }}
        }));
        assert!(status.done);
        assert_eq!(status.moderation_filtered_count, 1);
        assert_eq!(status.moderation_reasons, ["Unsafe content detected"]);
        assert!(status.video_uri.is_none());
    }

    #[test]
    fn finished_operation_with_error() {
        let status = parse_operation(json!({
            "done": true,
            "error": {"code": 8, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}
        }));
        let error = status.error.expect("error payload");
        assert_eq!(error.status.as_deref(), Some("RESOURCE_EXHAUSTED"));
        assert_eq!(error.message, "Resource exhausted");
    }
}
