//! HTTP client for the Flipt v2 management API.
//!
//! A single [`FliptClient`] is built during `configure` and shared by every
//! resource and data source handler. It owns the `reqwest::Client` (with the
//! authorization header installed once), the base URL, and the default
//! environment key.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("flipt-provider/", env!("CARGO_PKG_VERSION"));

/// Shared client for the Flipt API.
#[derive(Debug, Clone)]
pub struct FliptClient {
    http: reqwest::Client,
    base: Url,
    default_environment: String,
}

impl FliptClient {
    /// Build a client from a validated provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        if let Some(auth) = config.authorization() {
            let mut value = HeaderValue::from_str(&auth).map_err(|_| {
                ProviderError::Configuration(
                    "credential contains characters not allowed in a header".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base: config.base_url()?,
            default_environment: config.environment().to_string(),
        })
    }

    /// The provider-wide environment key.
    pub fn default_environment(&self) -> &str {
        &self.default_environment
    }

    /// Resolve a resource's environment, falling back to the provider default.
    pub fn environment<'a>(&'a self, key: Option<&'a str>) -> &'a str {
        match key {
            Some(k) if !k.is_empty() => k,
            _ => &self.default_environment,
        }
    }

    /// Append percent-encoded path segments to the base URL.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Configuration(format!(
                    "endpoint '{}' cannot be used as a base URL",
                    self.base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document. A 404 yields `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ProviderError> {
        debug!(url = %url, "GET");
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "GET returned 404");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(&Method::GET, &url, status, body));
        }

        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Send a JSON body with the given method and return the decoded response.
    ///
    /// An empty response body decodes as `Value::Null`.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Value, ProviderError> {
        debug!(method = %method, url = %url, "sending request");
        let response = self
            .http
            .request(method.clone(), url.clone())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(&method, &url, status, text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// DELETE a resource. Returns `false` when it was already gone.
    pub async fn delete(&self, url: Url) -> Result<bool, ProviderError> {
        debug!(url = %url, "DELETE");
        let response = self.http.delete(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "DELETE target already absent");
            return Ok(false);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(&Method::DELETE, &url, status, body));
        }
        Ok(true)
    }
}

fn api_error(method: &Method, url: &Url, status: StatusCode, body: String) -> ProviderError {
    warn!(method = %method, url = %url, status = status.as_u16(), "Flipt API returned an error");
    ProviderError::api(method.as_str(), url.as_str(), status.as_u16(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(endpoint: &str, extra: Value) -> FliptClient {
        let mut config = json!({ "endpoint": endpoint });
        if let (Some(map), Value::Object(extra)) = (config.as_object_mut(), extra) {
            map.extend(extra);
        }
        FliptClient::new(&ProviderConfig::from_value(config).unwrap()).unwrap()
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = client_for("http://localhost:8080/", json!({}));
        let url = client
            .url(&["api", "v2", "environments", "default", "namespaces", "a b"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v2/environments/default/namespaces/a%20b"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = client_for("https://flipt.example.com/proxy", json!({}));
        let url = client.url(&["api", "v2", "environments"]).unwrap();
        assert_eq!(url.as_str(), "https://flipt.example.com/proxy/api/v2/environments");
    }

    #[test]
    fn test_environment_fallback() {
        let client = client_for("http://localhost:8080", json!({"environment_key": "staging"}));
        assert_eq!(client.default_environment(), "staging");
        assert_eq!(client.environment(None), "staging");
        assert_eq!(client.environment(Some("")), "staging");
        assert_eq!(client.environment(Some("production")), "production");
    }

    #[tokio::test]
    async fn test_get_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/environments/default/namespaces/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), json!({}));
        let url = client
            .url(&["api", "v2", "environments", "default", "namespaces", "missing"])
            .unwrap();
        let result: Option<Value> = client.get(url).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/environments"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"environments": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), json!({"token": "secret"}));
        let url = client.url(&["api", "v2", "environments"]).unwrap();
        let body: Option<Value> = client.get(url).await.unwrap();
        assert_eq!(body, Some(json!({"environments": []})));
    }

    #[tokio::test]
    async fn test_send_error_carries_details() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v2/environments/default/namespaces"))
            .and(body_json(json!({"key": "production"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), json!({}));
        let url = client
            .url(&["api", "v2", "environments", "default", "namespaces"])
            .unwrap();
        let err = client
            .send(Method::PUT, url, &json!({"key": "production"}))
            .await
            .unwrap_err();

        match err {
            ProviderError::Api {
                method,
                url,
                status,
                body,
            } => {
                assert_eq!(method, "PUT");
                assert!(url.ends_with("/api/v2/environments/default/namespaces"));
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            },
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), json!({}));
        let url = client.url(&["anything"]).unwrap();
        let value = client.send(Method::POST, url, &json!({})).await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_delete_reports_absence() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/present"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), json!({}));
        assert!(!client.delete(client.url(&["gone"]).unwrap()).await.unwrap());
        assert!(client.delete(client.url(&["present"]).unwrap()).await.unwrap());
    }
}
