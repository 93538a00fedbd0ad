use std::str::FromStr;
use std::time::Duration;

use lunara_pipeline::RunnerConfig;
use lunara_provider::VeoConfig;

use crate::auth::jwt::JwtConfig;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where generated videos are written and how they are addressed.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Directory videos are written to (default: `./media/videos`).
    pub dir: String,
    /// Public path prefix for stored videos (default: `/media/videos`).
    pub public_path: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight generation jobs (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Video provider credentials and endpoint.
    pub video: VeoConfig,
    pub media: MediaConfig,
    /// Polling cadence and ceiling for the generation runner.
    pub runner: RunnerConfig,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                                            |
    /// |------------------------------|----------------------------------------------------|
    /// | `HOST`                       | `0.0.0.0`                                          |
    /// | `PORT`                       | `3000`                                             |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`                            |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                                               |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                                               |
    /// | `VIDEO_API_KEY`              | empty (generation disabled)                        |
    /// | `VIDEO_API_BASE_URL`         | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `VIDEO_MODEL`                | `veo-3.0-generate-preview`                         |
    /// | `VIDEO_REQUEST_TIMEOUT_SECS` | `120`                                              |
    /// | `MEDIA_DIR`                  | `./media/videos`                                   |
    /// | `MEDIA_PUBLIC_PATH`          | `/media/videos`                                    |
    /// | `POLL_INTERVAL_SECS`         | `5`                                                |
    /// | `MAX_POLL_ATTEMPTS`          | `60`                                               |
    /// | `LOG_FORMAT`                 | `text`                                             |
    ///
    /// # Panics
    ///
    /// Panics naming the variable when a value does not parse.
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", "3000");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", "30");
        let shutdown_timeout_secs: u64 = parse_env("SHUTDOWN_TIMEOUT_SECS", "30");

        let video = VeoConfig {
            api_key: env_or("VIDEO_API_KEY", "").trim().to_string(),
            base_url: env_or(
                "VIDEO_API_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model: env_or("VIDEO_MODEL", "veo-3.0-generate-preview"),
            request_timeout: Duration::from_secs(parse_env("VIDEO_REQUEST_TIMEOUT_SECS", "120")),
        };

        let media = MediaConfig {
            dir: env_or("MEDIA_DIR", "./media/videos"),
            public_path: env_or("MEDIA_PUBLIC_PATH", "/media/videos"),
        };

        let runner = RunnerConfig {
            poll_interval: Duration::from_secs(parse_env("POLL_INTERVAL_SECS", "5")),
            max_poll_attempts: parse_env("MAX_POLL_ATTEMPTS", "60"),
        };

        let log_format = match env_or("LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            video,
            media,
            runner,
            log_format,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_env<T>(name: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_or(name, default)
        .parse()
        .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>()))
}
