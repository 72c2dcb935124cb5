//! Authenticated control-plane client
//!
//! Every resolver REST call goes through [`CloudApi::fetch`]: the client
//! signs the request, dispatches it, caches GET responses for a short TTL,
//! and classifies failures into the domain taxonomy. Listing endpoints that
//! need an accurate total go through [`CloudApi::fetch_page`], which bridges
//! the count from a HEAD probe onto the page.

use super::auth::RequestSigner;
use super::error::{self, CloudError};
use crate::config::Config;
use anyhow::{Context, Result};
use reqwest::{header, Client, Method};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Listing endpoints report the resource count on the probe response in
/// this header rather than in the body.
const RESOURCE_COUNT_HEADER: &str = "x-resource-count";

/// Request descriptor for a single control-plane call.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// HTTP method; GET unless set otherwise.
    pub method: Method,
    /// Query string parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// JSON request body.
    pub payload: Option<Value>,
    /// Extra headers for this call.
    pub headers: Vec<(String, String)>,
    /// Value returned instead of raising when the call fails with a
    /// classified domain error. Transport failures always propagate.
    pub fallback: Option<Value>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            query: Vec::new(),
            payload: None,
            headers: Vec::new(),
            fallback: None,
        }
    }
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(payload: Value) -> Self {
        Self {
            method: Method::POST,
            payload: Some(payload),
            ..Self::default()
        }
    }

    /// POST without a body, used for query-driven machine actions
    /// (`?action=stop` and friends).
    pub fn post_empty() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn put(payload: Value) -> Self {
        Self {
            method: Method::PUT,
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn with_query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    /// Declare a fallback value for classified domain errors.
    pub fn with_fallback(mut self, value: Value) -> Self {
        self.fallback = Some(value);
        self
    }
}

/// One page of a listing endpoint, total bridged from the probe.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub results: Value,
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

struct Shared {
    http: Client,
    base_url: String,
    signer: RequestSigner,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_ttl: Duration,
    concurrency: usize,
}

/// Control-plane client. Cloning is cheap; per-request copies share the
/// signing key, HTTP pool, and response cache, and differ only in the
/// delegated session token.
#[derive(Clone)]
pub struct CloudApi {
    shared: Arc<Shared>,
    token: Option<String>,
}

impl CloudApi {
    /// Create a client from configuration, loading the signing key from
    /// disk.
    pub fn new(config: &Config) -> Result<Self> {
        let signer =
            RequestSigner::from_pem_file(&config.key_path, &config.account, &config.key_id)?;

        Self::with_signer(config, signer)
    }

    /// Create a client with an already-constructed signer.
    pub fn with_signer(config: &Config, signer: RequestSigner) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cloudapi-gql/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;

        url::Url::parse(&config.api_base_url)
            .with_context(|| format!("invalid control-plane base URL: {}", config.api_base_url))?;

        // account-scoped base path: every call lands under /my
        let base_url = format!("{}/my", config.api_base_url.trim_end_matches('/'));

        Ok(Self {
            shared: Arc::new(Shared {
                http,
                base_url,
                signer,
                cache: RwLock::new(HashMap::new()),
                cache_ttl: Duration::from_millis(config.cache_ttl_ms),
                concurrency: config.concurrency.max(1),
            }),
            token: None,
        })
    }

    /// Copy of this client scoped to a delegated session token. The token
    /// rides as `X-Auth-Token` next to the service signature.
    pub fn with_token(&self, token: Option<String>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            token,
        }
    }

    /// Bound for nested resolver fan-out.
    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    /// Perform a control-plane call described by `options`.
    pub async fn fetch(&self, path: &str, options: &FetchOptions) -> Result<Value, CloudError> {
        let cacheable = options.method == Method::GET;
        let key = self.cache_key(path, options);

        if cacheable {
            if let Some(hit) = self.cache_get(&key).await {
                tracing::debug!("cache hit for GET {}", path);
                return Ok(hit);
            }
        }

        match self.dispatch(path, options).await {
            Ok(value) => {
                if cacheable {
                    self.cache_put(key, value.clone()).await;
                }
                Ok(value)
            }
            Err(err) => self.settle(err, options),
        }
    }

    /// One page of a listing endpoint. A HEAD probe supplies the total
    /// resource count (the listing body does not report it), then the real
    /// GET runs with `offset`/`limit` appended.
    pub async fn fetch_page(
        &self,
        path: &str,
        options: &FetchOptions,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<RawPage, CloudError> {
        let total = self.resource_count(path, options).await?;

        let mut options = options.clone();
        if let Some(offset) = offset {
            options.query.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = limit {
            options.query.push(("limit".to_string(), limit.to_string()));
        }

        let results = self.fetch(path, &options).await?;

        Ok(RawPage {
            offset: offset.unwrap_or(0),
            limit: limit.unwrap_or(0),
            total,
            results,
        })
    }

    /// Total resource count for a listing endpoint, from the probe's count
    /// header. Probes are never cached.
    async fn resource_count(&self, path: &str, options: &FetchOptions) -> Result<u64, CloudError> {
        let request = self.signed_request(Method::HEAD, path, &options.query);

        tracing::debug!("HEAD {}{}", self.shared.base_url, path);
        let response = request.send().await?;

        if let Err(status_err) = response.error_for_status_ref() {
            tracing::error!("probe error: {} for HEAD {}", response.status(), path);
            return Err(status_err.into());
        }

        let total = response
            .headers()
            .get(RESOURCE_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(total)
    }

    async fn dispatch(&self, path: &str, options: &FetchOptions) -> Result<Value, CloudError> {
        let mut request = self.signed_request(options.method.clone(), path, &options.query);

        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        if let Some(payload) = &options.payload {
            request = request.json(payload);
        }

        tracing::debug!("{} {}{}", options.method, self.shared.base_url, path);
        let response = request.send().await?;
        let status = response.status();

        if let Err(status_err) = response.error_for_status_ref() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));

            if let Some((code, message)) = error::recognize(&body) {
                return Err(CloudError::Api {
                    code,
                    message,
                    status: status.as_u16(),
                });
            }

            return Err(status_err.into());
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Single failure policy for every call site: a declared fallback value
    /// stands in for classified domain errors only.
    fn settle(&self, err: CloudError, options: &FetchOptions) -> Result<Value, CloudError> {
        match &options.fallback {
            Some(fallback) if err.is_domain() => {
                tracing::debug!("returning declared fallback for {}", err);
                Ok(fallback.clone())
            }
            _ => Err(err),
        }
    }

    fn signed_request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.shared.base_url, path);
        let date = RequestSigner::date();

        let mut request = self
            .shared
            .http
            .request(method, &url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::DATE, &date)
            .header(header::AUTHORIZATION, self.shared.signer.authorization(&date));

        if let Some(token) = &self.token {
            request = request.header("X-Auth-Token", token);
        }

        if !query.is_empty() {
            request = request.query(query);
        }

        request
    }

    /// Cache key over everything that makes a GET distinct, including the
    /// delegated token so sessions never share entries.
    fn cache_key(&self, path: &str, options: &FetchOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(options.method.as_str());
        hasher.update([0]);
        hasher.update(path);

        for (name, value) in &options.query {
            hasher.update([0]);
            hasher.update(name);
            hasher.update([0x3d]);
            hasher.update(value);
        }

        if let Some(payload) = &options.payload {
            hasher.update([0]);
            hasher.update(payload.to_string());
        }

        if let Some(token) = &self.token {
            hasher.update([0]);
            hasher.update(token);
        }

        format!("{:x}", hasher.finalize())
    }

    async fn cache_get(&self, key: &str) -> Option<Value> {
        {
            let cache = self.shared.cache.read().await;
            match cache.get(key) {
                Some(entry) if entry.is_fresh(self.shared.cache_ttl) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {
                    tracing::debug!("cache entry expired");
                }
                None => return None,
            }
        }

        // stale: evict lazily and fall through to a real fetch
        self.shared.cache.write().await.remove(key);
        None
    }

    async fn cache_put(&self, key: String, value: Value) {
        let mut cache = self.shared.cache.write().await;
        cache.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Sanitize response body for logging: truncate and strip non-printable
/// characters.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}
