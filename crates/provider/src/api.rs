//! REST client for the generative-video API.
//!
//! Long-running operations: `POST models/{model}:predictLongRunning` starts
//! a generation and returns an operation `name`, `GET {name}` reports its
//! progress, and the finished operation points at a downloadable asset.
//! Every call authenticates with the `x-goog-api-key` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;

use crate::error::ProviderError;
use crate::extract::parse_operation;
use crate::provider::{GenerationRequest, OperationStatus, VideoProvider};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`VeoApi`].
#[derive(Debug, Clone)]
pub struct VeoConfig {
    pub api_key: String,
    /// Base URL without trailing slash, e.g.
    /// `https://generativelanguage.googleapis.com/v1beta`.
    pub base_url: String,
    pub model: String,
    /// Upper bound on a single request, from connect to the last body byte.
    pub request_timeout: Duration,
}

/// HTTP client for the video API.
pub struct VeoApi {
    client: reqwest::Client,
    config: VeoConfig,
}

impl VeoApi {
    /// Build a client whose requests give up after
    /// [`VeoConfig::request_timeout`].
    pub fn new(config: VeoConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, mut config: VeoConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { client, config }
    }

    fn submit_url(&self) -> String {
        format!(
            "{}/models/{}:predictLongRunning",
            self.config.base_url, self.config.model
        )
    }

    fn operation_url(&self, operation_name: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url,
            operation_name.trim_start_matches('/')
        )
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured)
        }
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or a
    /// [`ProviderError::Api`] with the status, body and `Retry-After`.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
                retry_after_secs,
            });
        }
        Ok(response)
    }

    /// Read a successful body as JSON, distinguishing empty from malformed.
    async fn parse_json(response: reqwest::Response) -> Result<serde_json::Value, ProviderError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::InvalidJson(e.to_string()))
    }
}

/// Request body for `predictLongRunning`.
fn submit_body(request: &GenerationRequest) -> serde_json::Value {
    serde_json::json!({
        "instances": [{ "prompt": request.prompt }],
        "parameters": {
            "aspectRatio": request.aspect_ratio.as_str(),
            "durationSeconds": request.duration_secs,
        },
    })
}

#[async_trait]
impl VideoProvider for VeoApi {
    fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(self.submit_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&submit_body(request))
            .send()
            .await?;

        let body = Self::parse_json(response).await?;
        body.get("name")
            .and_then(|n| n.as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::NoOperationId)
    }

    async fn poll(&self, operation_name: &str) -> Result<OperationStatus, ProviderError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(self.operation_url(operation_name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;

        Ok(parse_operation(Self::parse_json(response).await?))
    }

    async fn fetch_asset(&self, locator: &str) -> Result<Vec<u8>, ProviderError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(locator)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(size = bytes.len(), "Downloaded generated asset");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use lunara_core::classification::GenerationErrorCode;
    use lunara_core::generation::AspectRatio;

    fn config(key: &str, base_url: &str) -> VeoConfig {
        VeoConfig {
            api_key: key.to_string(),
            base_url: base_url.to_string(),
            model: "veo-test".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    fn api(key: &str) -> VeoApi {
        VeoApi::new(config(key, "https://video.example.test/v1beta/")).unwrap()
    }

    #[test]
    fn urls_are_built_from_base_and_model() {
        let api = api("k");
        assert_eq!(
            api.submit_url(),
            "https://video.example.test/v1beta/models/veo-test:predictLongRunning"
        );
        assert_eq!(
            api.operation_url("models/veo-test/operations/op1"),
            "https://video.example.test/v1beta/models/veo-test/operations/op1"
        );
    }

    #[test]
    fn submit_body_shape() {
        let body = submit_body(&GenerationRequest {
            prompt: "cosmic nebula swirl".into(),
            duration_secs: 6,
            aspect_ratio: AspectRatio::Portrait,
        });
        assert_eq!(body["instances"][0]["prompt"], "cosmic nebula swirl");
        assert_eq!(body["parameters"]["aspectRatio"], "9:16");
        assert_eq!(body["parameters"]["durationSeconds"], 6);
    }

    #[test]
    fn blank_key_is_not_configured() {
        assert!(!api("  ").is_configured());
        assert!(api("secret").is_configured());
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_to_submit() {
        let request = GenerationRequest {
            prompt: "p".into(),
            duration_secs: 4,
            aspect_ratio: AspectRatio::Landscape,
        };
        assert_matches!(
            api("").submit(&request).await,
            Err(ProviderError::NotConfigured)
        );
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let mut config = config("secret", &format!("http://{addr}"));
        config.request_timeout = Duration::from_millis(200);
        let api = VeoApi::new(config).unwrap();

        let started = std::time::Instant::now();
        let error = api.poll("models/veo-test/operations/op1").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_matches!(&error, ProviderError::Request(e) if e.is_timeout());
        assert_eq!(error.classification().code, GenerationErrorCode::Timeout);

        server.abort();
    }
}
