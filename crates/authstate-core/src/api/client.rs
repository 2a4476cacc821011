//! HTTP wrapper for the JSON API.
//!
//! Every call goes through [`ApiClient::fetch`], which resolves a named
//! endpoint against the base URL, optionally attaches a bearer token, parses
//! the JSON body and folds HTTP and application failures into [`ApiError`].

use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// Request description for [`ApiClient::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub endpoint_name: String,
    pub method: Method,
    pub body: Option<Value>,
    /// Extra headers, applied last so they can override the defaults.
    pub headers: Vec<(String, String)>,
    /// Return only this field of the response body.
    pub data_key: Option<String>,
    /// Treat a truthy value in this field as a failure.
    pub error_key: Option<String>,
    /// Attach the bearer token when one is available.
    pub authorize: bool,
}

impl FetchOptions {
    pub fn new(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            data_key: None,
            error_key: None,
            authorize: true,
        }
    }

    pub fn post(endpoint_name: impl Into<String>) -> Self {
        Self::new(endpoint_name).method(Method::POST)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    pub fn error_key(mut self, key: impl Into<String>) -> Self {
        self.error_key = Some(key.into());
        self
    }

    pub fn authorize(mut self, authorize: bool) -> Self {
        self.authorize = authorize;
        self
    }
}

/// API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client sharing an existing connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a named endpoint (e.g. `users/signin`) to a full URL
    pub fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }

    fn build_headers(options: &FetchOptions, bearer: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        if options.authorize {
            if let Some(token) = bearer {
                let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        for (name, value) in &options.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// JS-style truthiness, used to decide whether an error field is set.
    fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    fn error_message(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Apply the error/data keys of `options` to a parsed response body
    fn extract(options: &FetchOptions, mut body: Value) -> Result<Value, ApiError> {
        if let Some(ref key) = options.error_key {
            if let Some(err) = body.get(key) {
                if Self::is_truthy(err) {
                    return Err(ApiError::Application(Self::error_message(err)));
                }
            }
        }

        match options.data_key {
            Some(ref key) => Ok(body
                .as_object_mut()
                .and_then(|map| map.remove(key))
                .unwrap_or(Value::Null)),
            None => Ok(body),
        }
    }

    /// Send a request to a named endpoint.
    ///
    /// `bearer` is attached as `Authorization: Bearer <token>` only when
    /// `options.authorize` is set. Non-2xx responses become
    /// [`ApiError::Status`] without reading the body as JSON.
    pub async fn fetch(&self, options: FetchOptions, bearer: Option<&str>) -> Result<Value, ApiError> {
        let url = self.endpoint(&options.endpoint_name);
        let headers = Self::build_headers(&options, bearer)?;

        debug!(
            method = %options.method,
            url = %url,
            authorized = options.authorize && bearer.is_some(),
            "Sending request"
        );

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .headers(headers);

        if options.method != Method::GET {
            let body = options.body.as_ref().unwrap_or(&Value::Null);
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
            request = request.body(bytes);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                url = %url,
                status = status.as_u16(),
                body = %ApiError::truncate_body(&body),
                "Request failed"
            );
            return Err(ApiError::from_status(status));
        }

        let text = response.text().await?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
            })?
        };

        Self::extract(&options, body)
    }

    /// [`fetch`](Self::fetch) and deserialize the result into `T`
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        options: FetchOptions,
        bearer: Option<&str>,
    ) -> Result<T, ApiError> {
        let value = self.fetch(options, bearer).await?;
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}
