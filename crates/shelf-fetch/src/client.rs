//! HTTP fetch client with upstream tagging.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::retry::{self, RetryPolicy, Sleeper, TokioSleeper};
use crate::timeout::TimeoutConfig;
use crate::upstream::Upstream;
use crate::FetchError;

/// Longest error body kept on [`FetchError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Fetch policy combining timeout and retry configuration.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Timeout configuration.
    pub timeout: TimeoutConfig,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl FetchPolicy {
    /// Create a new fetch policy.
    pub fn new(timeout: TimeoutConfig, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// Create from an upstream's defaults.
    pub fn from_upstream(upstream: Upstream) -> Self {
        Self {
            timeout: TimeoutConfig::from_total(upstream.default_timeout()),
            retry: upstream.default_retry_policy(),
        }
    }
}

/// Outbound HTTP client bound to one upstream.
///
/// Every request runs under the upstream's [`FetchPolicy`]: a per-attempt
/// deadline and the retry policy. Non-2xx statuses become
/// [`FetchError::Http`] so the retry policy can inspect them.
#[derive(Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    upstream: Upstream,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FetchClient {
    /// Create a client with the upstream's default policy.
    pub fn new(upstream: Upstream) -> Result<Self, FetchError> {
        Self::builder(upstream).build()
    }

    pub fn builder(upstream: Upstream) -> FetchClientBuilder {
        FetchClientBuilder {
            upstream,
            policy: FetchPolicy::from_upstream(upstream),
            user_agent: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn upstream(&self) -> Upstream {
        self.upstream
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send the request produced by `build`, retrying per policy.
    ///
    /// `build` is called once per attempt. Returns the first 2xx response.
    pub async fn execute<F>(&self, build: F) -> Result<reqwest::Response, FetchError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        retry::run(&self.retry, self.sleeper.as_ref(), |attempt| {
            let request = build(&self.http);
            self.send_once(request, attempt)
        })
        .await
    }

    /// Like [`FetchClient::execute`], decoding a JSON body.
    pub async fn json<T, F>(&self, build: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = self.execute(build).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Deserialization(e.to_string()))
    }

    /// GET `url` with query parameters and decode JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        self.json(|http| http.get(url).query(query)).await
    }

    async fn send_once(
        &self,
        request: reqwest::RequestBuilder,
        attempt: u32,
    ) -> Result<reqwest::Response, FetchError> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            warn!(upstream = %self.upstream, attempt, error = %e, "upstream request failed");
            FetchError::from(e)
        })?;

        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(upstream = %self.upstream, attempt, status = status.as_u16(), elapsed_ms, "upstream call");

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(FetchError::Http {
            status: status.as_u16(),
            url,
            body,
        })
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("upstream", &self.upstream)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builder for [`FetchClient`].
pub struct FetchClientBuilder {
    upstream: Upstream,
    policy: FetchPolicy,
    user_agent: Option<String>,
    sleeper: Arc<dyn Sleeper>,
}

impl FetchClientBuilder {
    pub fn timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.policy.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.policy.retry = retry;
        self
    }

    pub fn policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the sleeper used between retries.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn build(self) -> Result<FetchClient, FetchError> {
        let mut http = reqwest::Client::builder()
            .connect_timeout(self.policy.timeout.connect)
            .timeout(self.policy.timeout.total);
        if let Some(agent) = &self.user_agent {
            http = http.user_agent(agent.as_str());
        }
        let http = http
            .build()
            .map_err(|e| FetchError::Request(format!("building {} client: {e}", self.upstream)))?;

        Ok(FetchClient {
            http,
            upstream: self.upstream,
            retry: self.policy.retry,
            sleeper: self.sleeper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingSleeper;
    use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn limited_twice(State(calls): State<Arc<AtomicU32>>) -> (StatusCode, String) {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            (StatusCode::TOO_MANY_REQUESTS, "slow down".into())
        } else {
            (StatusCode::OK, r#"{"ok":true}"#.into())
        }
    }

    fn marketplace(sleeper: Arc<RecordingSleeper>) -> FetchClient {
        FetchClient::builder(Upstream::Marketplace)
            .sleeper(sleeper)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_retries_rate_limited_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route("/search", get(limited_twice))
            .with_state(calls.clone());
        let base = serve(app).await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = marketplace(sleeper.clone());
        let body: serde_json::Value = client
            .get_json(&format!("{base}/search"), &[("q", "tea")])
            .await
            .unwrap();

        assert_eq!(body["ok"], true);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(500); 2]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/search",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { StatusCode::TOO_MANY_REQUESTS }
            }),
        );
        let base = serve(app).await;

        let client = marketplace(Arc::new(RecordingSleeper::new()));
        let err = client
            .get_json::<serde_json::Value>(&format!("{base}/search"), &[])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(429));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let app = Router::new().route(
            "/product",
            get(|| async { (StatusCode::NOT_FOUND, "no such product") }),
        );
        let base = serve(app).await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = marketplace(sleeper.clone());
        let err = client
            .get_json::<serde_json::Value>(&format!("{base}/product"), &[])
            .await
            .unwrap_err();

        match err {
            FetchError::Http { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such product");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_deserialization_error() {
        let app = Router::new().route("/product", get(|| async { "not json" }));
        let base = serve(app).await;

        let client = FetchClient::new(Upstream::OpenFood).unwrap();
        let err = client
            .get_json::<serde_json::Value>(&format!("{base}/product"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(serde_json::json!({}))
            }),
        );
        let base = serve(app).await;

        let client = FetchClient::builder(Upstream::OpenFood)
            .timeout(TimeoutConfig::from_total(Duration::from_millis(100)))
            .build()
            .unwrap();
        let err = client
            .get_json::<serde_json::Value>(&format!("{base}/slow"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = FetchClient::new(Upstream::OpenFood).unwrap();
        let err = client
            .get_json::<serde_json::Value>(&format!("http://{addr}/x"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Connection(_)));
    }

    #[test]
    fn test_error_maps_to_upstream_unavailable() {
        let err = FetchError::Timeout("http://x".into()).for_upstream(Upstream::OpenFood);
        assert_eq!(err.kind(), "upstream_unavailable");
        assert!(err.to_string().contains("obf"));
    }
}
