use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, PipelineResult};

pub const ACCEPT_JSON_OR_TEXT: &str = "application/json, text/plain, */*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Post => Method::POST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn put(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Put,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn post_json<T: Serialize>(url: impl Into<String>, payload: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(payload)?;
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase, empty when the status has none.
    pub reason: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_text(&self) -> &str {
        &self.reason
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Every network call of the pipeline goes through this seam.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> PipelineResult<HttpResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> PipelineResult<Self> {
        let client = Client::builder()
            .user_agent("dressr-effects/0.1")
            .build()
            .map_err(|err| PipelineError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> PipelineResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| PipelineError::Transport(err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| PipelineError::Transport(err.to_string()))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body,
        })
    }
}

/// Sends `request` unless `cancel` fires first.
pub async fn send_cancellable(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    cancel: &CancellationToken,
) -> PipelineResult<HttpResponse> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        response = transport.send(request) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowTransport;

    #[async_trait]
    impl HttpTransport for SlowTransport {
        async fn send(&self, _request: HttpRequest) -> PipelineResult<HttpResponse> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(HttpResponse {
                status: 200,
                reason: "OK".into(),
                content_type: None,
                body: Vec::new(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_in_flight_request() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let result =
            send_cancellable(&SlowTransport, HttpRequest::get("https://example.com"), &cancel)
                .await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn post_json_sets_content_type() {
        let request =
            HttpRequest::post_json("https://example.com", &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.header_value("content-type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    }

    #[test]
    fn success_range_is_2xx() {
        let mut response = HttpResponse {
            status: 204,
            reason: "No Content".into(),
            content_type: None,
            body: Vec::new(),
        };
        assert!(response.is_success());
        response.status = 302;
        assert!(!response.is_success());
    }
}
