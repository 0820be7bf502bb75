//! Live catalog backend over HTTP.
//!
//! Provides the `LiveSource` trait and its REST implementation. Backends hand
//! back raw JSON records; turning them into canonical records is the
//! normalizer's job, so this crate never interprets product fields.

use catalogflow_model::QueryRequest;
use catalogflow_query::{HttpParamsDialect, QueryDialect, QueryError};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from live backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Record not found")]
    NotFound,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("Backend not available")]
    Unavailable,
}

impl BackendError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// Trait for live catalog sources (REST backend, test doubles, offline).
pub trait LiveSource {
    /// Fetch raw records for a listing. Paging is applied by the caller.
    fn fetch_list(
        &self,
        query: &QueryRequest,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Fetch one raw record by key. A missing record is `BackendError::NotFound`.
    fn fetch_by_id(&self, id: &str) -> impl Future<Output = Result<Value, BackendError>> + Send;

    /// Keyword search; returns raw records in backend order.
    fn search(&self, terms: &str) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Check if the backend is healthy.
    fn health_check(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Get the backend name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP backend configuration.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the catalog API, e.g. `https://shop.example.com/api`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            timeout_secs: 10,
        }
    }
}

/// REST catalog backend.
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend.
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| BackendError::Connection(format!("invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Connection(format!(
                "invalid base URL: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    /// Build an endpoint URL under the base path.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url, params: &[(String, String)]) -> Result<Value, BackendError> {
        tracing::debug!(url = %url, ?params, "Requesting live catalog");

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))
    }
}

/// Pull the record array out of a listing response.
///
/// Accepts a bare array or an object wrapping it in `products` or `data`.
pub fn extract_list(response: Value) -> Result<Vec<Value>, BackendError> {
    match response {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            for key in ["products", "data"] {
                if let Some(Value::Array(items)) = obj.remove(key) {
                    return Ok(items);
                }
            }
            Err(BackendError::ParseError("Missing products array".to_string()))
        }
        other => Err(BackendError::ParseError(format!(
            "Expected a product list, got {}",
            kind_of(&other)
        ))),
    }
}

/// Pull the single record out of an item response.
///
/// Accepts the record itself or an object wrapping it in `product` or `data`.
/// A `null` body, or a `null` wrapper, counts as not found.
pub fn extract_item(response: Value) -> Result<Value, BackendError> {
    match response {
        Value::Null => Err(BackendError::NotFound),
        Value::Object(mut obj) => {
            // A top-level primary key means this already is the record.
            if obj.contains_key("_id") {
                return Ok(Value::Object(obj));
            }

            let wrapper = ["product", "data"]
                .into_iter()
                .find(|key| matches!(obj.get(*key), Some(Value::Object(_) | Value::Null)));

            match wrapper.and_then(|key| obj.remove(key)) {
                Some(Value::Object(inner)) => Ok(Value::Object(inner)),
                Some(_) => Err(BackendError::NotFound),
                None => Ok(Value::Object(obj)),
            }
        }
        other => Err(BackendError::ParseError(format!(
            "Expected a product object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl LiveSource for HttpBackend {
    async fn fetch_list(&self, query: &QueryRequest) -> Result<Vec<Value>, BackendError> {
        let params = HttpParamsDialect.translate(query)?;
        let json = self.get_json(self.endpoint(&["products"]), &params).await?;
        extract_list(json)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Value, BackendError> {
        let json = self.get_json(self.endpoint(&["products", id]), &[]).await?;
        extract_item(json)
    }

    async fn search(&self, terms: &str) -> Result<Vec<Value>, BackendError> {
        let params = vec![("search".to_string(), terms.to_string())];
        let json = self.get_json(self.endpoint(&["products"]), &params).await?;
        extract_list(json)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.endpoint(&["health"]))
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Unavailable)
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// A live source that is never reachable. Used when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSource;

impl LiveSource for OfflineSource {
    async fn fetch_list(&self, _query: &QueryRequest) -> Result<Vec<Value>, BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn fetch_by_id(&self, _id: &str) -> Result<Value, BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn search(&self, _terms: &str) -> Result<Vec<Value>, BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(HttpBackendConfig {
            base_url: base_url.to_string(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let backend = backend("http://shop.test/api/");
        assert_eq!(
            backend.endpoint(&["products", "abc"]).as_str(),
            "http://shop.test/api/products/abc"
        );

        let backend = HttpBackend::new(HttpBackendConfig::default()).unwrap();
        assert_eq!(
            backend.endpoint(&["health"]).as_str(),
            "http://127.0.0.1:5000/api/health"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpBackend::new(HttpBackendConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(BackendError::Connection(_))));
    }

    #[test]
    fn test_extract_list_shapes() {
        assert_eq!(extract_list(json!([{"_id": "1"}])).unwrap().len(), 1);
        assert_eq!(
            extract_list(json!({"products": [{"_id": "1"}, {"_id": "2"}], "total": 2}))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(extract_list(json!({"data": []})).unwrap().len(), 0);
        assert!(matches!(
            extract_list(json!({"items": []})),
            Err(BackendError::ParseError(_))
        ));
        assert!(matches!(
            extract_list(json!("oops")),
            Err(BackendError::ParseError(_))
        ));
    }

    #[test]
    fn test_extract_item_shapes() {
        assert_eq!(
            extract_item(json!({"product": {"_id": "1"}})).unwrap(),
            json!({"_id": "1"})
        );
        assert_eq!(
            extract_item(json!({"_id": "2", "name": "Lamp"})).unwrap(),
            json!({"_id": "2", "name": "Lamp"})
        );
        // `data` that is not an object stays a plain field
        assert_eq!(
            extract_item(json!({"_id": "3", "data": "x"})).unwrap(),
            json!({"_id": "3", "data": "x"})
        );
        assert!(matches!(extract_item(json!(null)), Err(BackendError::NotFound)));
        assert!(matches!(
            extract_item(json!({"product": null})),
            Err(BackendError::NotFound)
        ));
        assert!(matches!(extract_item(json!([1])), Err(BackendError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_fetch_list_sends_filter_params() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("category", "electronics"))
            .and(query_param("maxPrice", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"products": [{"_id": "a"}, {"_id": "b"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let query = QueryRequest::new()
            .with_category("electronics")
            .with_price_range(None, Some(100.0))
            .with_limit(1);
        let records = backend(&server.uri()).fetch_list(&query).await.unwrap();

        // Paging is not applied by the backend client.
        assert_eq!(records.len(), 2);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_fetch_by_id_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = backend(&server.uri()).fetch_by_id("missing").await;
        assert!(matches!(result, Err(BackendError::NotFound)));
    }

    #[tokio::test]
    async fn test_fetch_by_id_unwraps_product() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products/abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"product": {"_id": "abc", "name": "Lamp"}})),
            )
            .mount(&server)
            .await;

        let record = backend(&server.uri()).fetch_by_id("abc").await.unwrap();
        assert_eq!(record["name"], "Lamp");
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let result = backend(&server.uri()).search("lamp").await;
        match result {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = backend(&server.uri()).fetch_list(&QueryRequest::new()).await;
        assert!(matches!(result, Err(BackendError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_search_uses_search_param() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("search", "wireless mouse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"_id": "m1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let hits = backend(&server.uri()).search("wireless mouse").await.unwrap();
        assert_eq!(hits, vec![json!({"_id": "m1"})]);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(backend(&server.uri()).health_check().await.is_ok());
        assert!(matches!(
            OfflineSource.health_check().await,
            Err(BackendError::Unavailable)
        ));
    }
}
