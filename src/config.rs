use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};

/// Default origin of the student portal.
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://shcollege.online";

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Origin every gateway target path is resolved against.
    pub portal_base_url: String,
    /// Value of `Access-Control-Allow-Origin` on gateway responses.
    pub allowed_origin: String,
    /// Requests allowed per client address within one window.
    pub rate_limit_max_requests: u32,
    /// Length of one rate-limit window.
    pub rate_limit_window: Duration,
    /// Upper bound for a single outbound portal call.
    pub request_timeout: Duration,
    /// The URL of the Redis server. `None` keeps the cache in memory.
    pub redis_url: Option<String>,
    /// Address the HTTP service listens on.
    pub bind_addr: SocketAddr,
    /// Period of the background sync job. Zero disables it.
    pub sync_interval: Duration,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let portal_base_url = env::var("PORTAL_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_PORTAL_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !portal_base_url.starts_with("http://") && !portal_base_url.starts_with("https://") {
            anyhow::bail!("PORTAL_BASE_URL must be an absolute http(s) origin");
        }

        Ok(Self {
            portal_base_url,
            allowed_origin: env::var("APP_URL").unwrap_or_else(|_| "*".to_string()),
            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_MAX_REQUESTS")?,
            rate_limit_window: Duration::from_secs(
                env::var("RATE_LIMIT_WINDOW_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("Invalid RATE_LIMIT_WINDOW_SECS")?,
            ),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid REQUEST_TIMEOUT_SECS")?,
            ),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            sync_interval: Duration::from_secs(
                env::var("SYNC_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("Invalid SYNC_INTERVAL_SECS")?,
            ),
        })
    }

    /// A configuration pointed at `portal_base_url` with every other knob at its default.
    pub fn for_portal(portal_base_url: impl Into<String>) -> Self {
        Self {
            portal_base_url: portal_base_url.into().trim_end_matches('/').to_string(),
            allowed_origin: "*".to_string(),
            rate_limit_max_requests: 30,
            rate_limit_window: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            redis_url: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            sync_interval: Duration::from_secs(3600),
        }
    }
}
