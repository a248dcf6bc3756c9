//! HTTP port implementation over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use palisade_component::{ComponentError, HttpPort, HttpRequestSpec, HttpResponseData};
use serde_json::Value;
use tracing::debug;

/// [`HttpPort`] backed by a shared [`reqwest::Client`].
///
/// Sensitive header values never reach the logs; they are sent on the wire
/// unredacted. Transport failures classify into the error taxonomy
/// (`TimeoutError` / `NetworkError`); HTTP status handling is the calling
/// component's business.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// A port with the client defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// A port with a per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ComponentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ComponentError::configuration(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    fn classify(err: &reqwest::Error) -> ComponentError {
        if err.is_timeout() {
            ComponentError::timeout(format!("http request timed out: {err}"))
        } else {
            ComponentError::network(format!("http transport failure: {err}"))
        }
    }
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpPort for ReqwestHttp {
    async fn fetch(&self, request: HttpRequestSpec) -> Result<HttpResponseData, ComponentError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ComponentError::validation(format!("invalid method `{}`", request.method)))?;

        debug!(
            method = %method,
            url = %request.url,
            headers = ?redacted_headers(&request),
            "outbound http request"
        );

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| Self::classify(&e))?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_owned(),
                )
            })
            .collect();

        let text = response.text().await.map_err(|e| Self::classify(&e))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(HttpResponseData {
            status,
            headers,
            body,
        })
    }
}

/// Header list with sensitive values masked, for the log line only.
fn redacted_headers(request: &HttpRequestSpec) -> Vec<(String, String)> {
    request
        .headers
        .iter()
        .map(|(name, value)| {
            let sensitive = request
                .sensitive_headers
                .iter()
                .any(|s| s.eq_ignore_ascii_case(name));
            if sensitive {
                (name.clone(), "***".to_owned())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}
