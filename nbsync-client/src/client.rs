//! HTTP client for the Nautobot REST API.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL, LookupCache};
use crate::error::{ClientError, Result};
use crate::models::{
    DeviceType, Location, LocationType, Manufacturer, Rack, RackGroup, Resource, Status,
};
use crate::pagination::DEFAULT_BATCH_SIZE;
use crate::report::Report;

/// Connection and tuning settings for [`NautobotClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://nautobot.nautobot.svc.cluster.local/api`.
    pub base_url: String,
    /// User the engine authenticates as. Change-log entries by this user
    /// define which remote objects are managed.
    pub username: String,
    pub token: Option<String>,
    pub cache_max_size: usize,
    pub cache_ttl: Duration,
    /// Deadline applied to every request.
    pub request_timeout: Duration,
    pub batch_size: usize,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            token,
            cache_max_size: DEFAULT_CACHE_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: Duration::from_secs(30),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

/// Nautobot API client. One instance per reconciliation; owns the report and
/// the lookup cache for that cycle.
pub struct NautobotClient {
    http: reqwest::Client,
    config: ClientConfig,
    report: Report,
    cache: LookupCache,
    cancel: CancellationToken,
}

impl NautobotClient {
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ClientError::Config(format!("invalid token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            cache: LookupCache::new(config.cache_max_size, config.cache_ttl),
            config,
            report: Report::new(),
            cancel,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/",
            self.config.base_url.trim_end_matches('/'),
            path.trim_matches('/')
        )
    }

    /// Send a request, racing it against cancellation. Non-2xx answers become
    /// [`ClientError::Api`] carrying the body.
    async fn execute(&self, request: RequestBuilder) -> Result<String> {
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
            response = request.send() => response?,
        };
        let status = response.status();
        let body = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
            body = response.text() => body?,
        };

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn decode<T: DeserializeOwned>(body: String) -> Result<T> {
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(source) => Err(ClientError::Decode { source, body }),
        }
    }

    /// GET a list endpoint, following `next` links until exhausted.
    pub async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let body = self
            .execute(self.http.get(self.url(endpoint)).query(query))
            .await?;
        let mut page: ListResponse<T> = Self::decode(body)?;

        loop {
            results.append(&mut page.results);
            let Some(next) = page.next.take() else {
                break;
            };
            debug!(endpoint, next = %next, "following next page");
            let body = self.execute(self.http.get(&next)).await?;
            page = Self::decode(body)?;
        }

        Ok(results)
    }

    /// POST a new object.
    pub async fn create<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self
            .execute(self.http.post(self.url(endpoint)).json(body))
            .await?;
        Self::decode(body)
    }

    /// PUT a full replacement of object `id`.
    pub async fn update<B, T>(&self, endpoint: &str, id: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(&format!("{}/{}", endpoint.trim_matches('/'), id));
        let body = self.execute(self.http.put(url).json(body)).await?;
        Self::decode(body)
    }

    /// DELETE object `id`. A 404 counts as already deleted.
    pub async fn destroy(&self, endpoint: &str, id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{}", endpoint.trim_matches('/'), id));
        match self.execute(self.http.delete(url)).await {
            Ok(_) => Ok(()),
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                debug!(endpoint, id, "object already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// POST a GraphQL query and return its `data` member.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let request = serde_json::json!({ "query": query, "variables": variables });
        let body = self
            .execute(self.http.post(self.url("graphql")).json(&request))
            .await?;
        let mut response: Value = Self::decode(body)?;

        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            return Err(ClientError::GraphQl(errors.to_string()));
        }
        Ok(response.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    /// Bulk-list every lookup collection into the cache. Best-effort: a failing
    /// collection is logged and the rest are still loaded.
    pub async fn preload_cache(&self) {
        self.preload::<Status>().await;
        self.preload::<LocationType>().await;
        self.preload::<Location>().await;
        self.preload::<RackGroup>().await;
        self.preload::<Rack>().await;
        self.preload::<Manufacturer>().await;
        self.preload::<DeviceType>().await;
    }

    async fn preload<R: Resource>(&self) {
        let Some(key) = R::CACHE_KEY else {
            return;
        };
        match self
            .list::<R>(R::ENDPOINT, &[("depth", "1".to_string())])
            .await
        {
            Ok(items) => {
                info!(collection = key, count = items.len(), "pre-loaded cache");
                self.cache.set_collection(key, items);
            }
            Err(e) => warn!(collection = key, error = %e, "failed to pre-load cache"),
        }
    }
}
