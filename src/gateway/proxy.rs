use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::{
    config::Config,
    error::{AppError, Result},
    gateway::{decode::decode_body, rate_limit::RateLimiter},
    models::proxy::{ProxyMethod, ProxyRequest, ProxyResponse},
    portal::endpoints,
    validation::target::validate_target_path,
};

/// Rate-limit key for calls made from inside this process.
pub const LOCAL_CLIENT: &str = "local";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Anything that can carry a portal request. The engine only talks to the portal through this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse>;

    /// Makes the call on behalf of `client`. Transports without per-client state ignore it.
    async fn call_as(&self, _client: &str, request: ProxyRequest) -> Result<ProxyResponse> {
        self.call(request).await
    }
}

/// Pins every call of an inner transport to one caller's rate-limit key.
pub struct ClientTransport {
    inner: Arc<dyn Transport>,
    client: String,
}

impl ClientTransport {
    pub fn new(inner: Arc<dyn Transport>, client: impl Into<String>) -> Self {
        Self {
            inner,
            client: client.into(),
        }
    }
}

#[async_trait]
impl Transport for ClientTransport {
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        self.inner.call_as(&self.client, request).await
    }

    async fn call_as(&self, client: &str, request: ProxyRequest) -> Result<ProxyResponse> {
        self.inner.call_as(client, request).await
    }
}

/// The only component that touches the network.
#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl Gateway {
    /// Builds a gateway from the configuration with a fresh limiter.
    pub fn new(config: &Config) -> Result<Self> {
        let limiter = RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window);
        Self::with_limiter(config, limiter)
    }

    pub fn with_limiter(config: &Config, limiter: RateLimiter) -> Result<Self> {
        // Redirects are surfaced, not followed: login classification needs the raw 3xx.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout)
            .no_proxy()
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.portal_base_url.clone(),
            limiter,
        })
    }

    /// Forwards one request to the portal on behalf of `client_addr`.
    ///
    /// # Arguments
    ///
    /// * `client_addr` - Rate-limit key of the caller.
    /// * `request` - The call to make.
    ///
    /// # Returns
    ///
    /// Status, decoded body and every `Set-Cookie` value.
    pub async fn proxy(&self, client_addr: &str, request: &ProxyRequest) -> Result<ProxyResponse> {
        if !self.limiter.check(client_addr).await {
            let retry = self
                .limiter
                .retry_after(client_addr)
                .await
                .map(|d| d.as_secs())
                .unwrap_or(0);
            return Err(AppError::RateLimited(format!(
                "{} exceeded the request window, retry in {}s",
                client_addr, retry
            )));
        }

        validate_target_path(&request.target_path)?;

        let target_url = format!("{}{}", self.base_url, request.target_path);
        let headers = self.build_headers(request)?;

        let mut builder = match request.method {
            ProxyMethod::Get => self.client.get(&target_url),
            ProxyMethod::Post => self.client.post(&target_url),
        };
        builder = builder.headers(headers);

        if let (ProxyMethod::Post, Some(form)) = (request.method, &request.form_data) {
            // Sets the urlencoded body together with its content-type and content-length.
            builder = builder.form(form);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let content_encoding = response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let raw = response.bytes().await?;
        let decoded = decode_body(content_encoding.as_deref(), &raw).await?;
        let body = String::from_utf8_lossy(&decoded).into_owned();

        tracing::debug!(
            "Proxied {:?} {} -> {} ({} bytes, {} cookies)",
            request.method,
            target_url,
            status,
            body.len(),
            set_cookies.len()
        );
        for cookie in &set_cookies {
            tracing::trace!("Set-Cookie: {}...", truncate(cookie, 40));
        }

        Ok(ProxyResponse {
            status,
            body,
            set_cookies,
        })
    }

    fn build_headers(&self, request: &ProxyRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

        if let Some(cookies) = request.cookies.as_deref().filter(|c| !c.is_empty()) {
            headers.insert(header::COOKIE, header_value(cookies, "cookie")?);
        }

        if request.method == ProxyMethod::Post && request.form_data.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            headers.insert(header::ORIGIN, header_value(&self.base_url, "origin")?);
            headers.insert(
                header::REFERER,
                header_value(&self.referer_for(&request.target_path), "referer")?,
            );
            headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        }

        Ok(headers)
    }

    /// The login form posts from the login page, everything else refers to itself.
    fn referer_for(&self, target_path: &str) -> String {
        if target_path == endpoints::LOGIN_POST {
            format!("{}{}", self.base_url, endpoints::LOGIN_PAGE)
        } else {
            format!("{}{}", self.base_url, target_path)
        }
    }
}

#[async_trait]
impl Transport for Gateway {
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        self.proxy(LOCAL_CLIENT, &request).await
    }

    async fn call_as(&self, client: &str, request: ProxyRequest) -> Result<ProxyResponse> {
        self.proxy(client, &request).await
    }
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::Validation(format!("Invalid characters in {} header", name)))
}

/// Shortens secrets before they reach the logs.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A portal stand-in answering each path with a fixed response.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<HashMap<String, ProxyResponse>>,
        failing: Mutex<Vec<String>>,
        calls: Mutex<Vec<ProxyRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, path: &str, status: u16, body: &str) -> Self {
            self.respond_with_cookies(path, status, body, &[])
        }

        pub fn respond_with_cookies(self, path: &str, status: u16, body: &str, cookies: &[&str]) -> Self {
            self.routes.lock().unwrap().insert(
                path.to_string(),
                ProxyResponse {
                    status,
                    body: body.to_string(),
                    set_cookies: cookies.iter().map(|c| c.to_string()).collect(),
                },
            );
            self
        }

        /// Calls to `path` fail as if the portal were unreachable.
        pub fn fail(self, path: &str) -> Self {
            self.failing.lock().unwrap().push(path.to_string());
            self
        }

        pub fn calls(&self) -> Vec<ProxyRequest> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_to(&self, path: &str) -> usize {
            self.calls().iter().filter(|c| c.target_path == path).count()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse> {
            let path = request.target_path.clone();
            self.calls.lock().unwrap().push(request);
            if self.failing.lock().unwrap().contains(&path) {
                return Err(AppError::Network(format!("connection refused: {}", path)));
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(&path)
                .cloned()
                .unwrap_or(ProxyResponse {
                    status: 404,
                    body: String::new(),
                    set_cookies: Vec::new(),
                }))
        }
    }

    fn gateway() -> Gateway {
        Gateway::new(&Config::for_portal("https://portal.invalid")).unwrap()
    }

    #[test]
    fn test_login_submit_gets_login_page_referer() {
        let gw = gateway();
        assert_eq!(
            gw.referer_for(endpoints::LOGIN_POST),
            "https://portal.invalid/studentlogin"
        );
        assert_eq!(
            gw.referer_for(endpoints::TIMETABLE),
            "https://portal.invalid/Student/Home/GetAllTimeTable"
        );
    }

    #[test]
    fn test_form_posts_carry_xhr_headers() {
        let gw = gateway();
        let request = ProxyRequest::post(endpoints::ATTENDANCE_DATA, [("studentId", "0")])
            .with_cookies("a=1; b=2");
        let headers = gw.build_headers(&request).unwrap();

        assert_eq!(headers["content-type"], "application/x-www-form-urlencoded");
        assert_eq!(headers["x-requested-with"], "XMLHttpRequest");
        assert_eq!(headers["origin"], "https://portal.invalid");
        assert_eq!(headers["cookie"], "a=1; b=2");
        assert_eq!(headers["accept-encoding"], "gzip, deflate, br");
    }

    #[test]
    fn test_plain_get_has_browser_headers_only() {
        let headers = gateway().build_headers(&ProxyRequest::get(endpoints::LOGIN_PAGE)).unwrap();
        assert!(headers.contains_key("user-agent"));
        assert_eq!(headers["sec-fetch-mode"], "navigate");
        assert!(!headers.contains_key("cookie"));
        assert!(!headers.contains_key("x-requested-with"));
    }

    #[tokio::test]
    async fn test_guard_and_limiter_run_before_network() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let gw = Gateway::with_limiter(&Config::for_portal("https://portal.invalid"), limiter).unwrap();

        let err = gw.proxy("1.2.3.4", &ProxyRequest::get("http://evil.com")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTarget(_)));
        let err = gw.proxy("1.2.3.4", &ProxyRequest::get("../x")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTarget(_)));

        let err = gw.proxy("1.2.3.4", &ProxyRequest::get("")).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
