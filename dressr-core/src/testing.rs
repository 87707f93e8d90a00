//! In-memory doubles for the transport, notifier and download sink.
//!
//! Used by the crate's own tests and by front ends that want to exercise the
//! controller without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::controller::lock;
use crate::error::{PipelineError, PipelineResult};
use crate::notify::{DownloadSink, Notifier, SavedFile};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Response(HttpResponse),
    Fail(String),
}

impl ScriptedReply {
    pub fn text(body: impl Into<String>) -> Self {
        ScriptedReply::Response(HttpResponse {
            status: 200,
            reason: "OK".into(),
            content_type: Some("text/plain".into()),
            body: body.into().into_bytes(),
        })
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        ScriptedReply::Response(HttpResponse {
            status: 200,
            reason: "OK".into(),
            content_type: Some("application/json".into()),
            body: serde_json::to_vec(value).unwrap_or_default(),
        })
    }

    pub fn bytes(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        ScriptedReply::Response(HttpResponse {
            status: 200,
            reason: "OK".into(),
            content_type: Some(content_type.into()),
            body,
        })
    }

    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        ScriptedReply::Response(HttpResponse {
            status,
            reason: reason.into(),
            content_type: None,
            body: Vec::new(),
        })
    }

    pub fn fail(message: impl Into<String>) -> Self {
        ScriptedReply::Fail(message.into())
    }
}

struct Route {
    method: HttpMethod,
    url_fragment: String,
    replies: VecDeque<ScriptedReply>,
    delay: Duration,
}

/// Answers requests from per-route reply queues. The last reply of a route
/// repeats; unmatched requests get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        self,
        method: HttpMethod,
        url_fragment: impl Into<String>,
        replies: Vec<ScriptedReply>,
    ) -> Self {
        self.on_delayed(method, url_fragment, Duration::ZERO, replies)
    }

    /// Like [`on`](Self::on), but every reply arrives after `delay`.
    pub fn on_delayed(
        self,
        method: HttpMethod,
        url_fragment: impl Into<String>,
        delay: Duration,
        replies: Vec<ScriptedReply>,
    ) -> Self {
        lock(&self.routes).push(Route {
            method,
            url_fragment: url_fragment.into(),
            replies: replies.into(),
            delay,
        });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn count(&self, method: HttpMethod, url_fragment: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|request| request.method == method && request.url.contains(url_fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> PipelineResult<HttpResponse> {
        let (reply, delay) = {
            let mut routes = lock(&self.routes);
            match routes.iter_mut().find(|route| {
                route.method == request.method && request.url.contains(&route.url_fragment)
            }) {
                Some(route) => {
                    let reply = if route.replies.len() > 1 {
                        route.replies.pop_front()
                    } else {
                        route.replies.front().cloned()
                    };
                    (reply, route.delay)
                }
                None => (None, Duration::ZERO),
            }
        };
        lock(&self.requests).push(request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Some(ScriptedReply::Response(response)) => Ok(response),
            Some(ScriptedReply::Fail(message)) => Err(PipelineError::Transport(message)),
            None => Ok(HttpResponse {
                status: 404,
                reason: "Not Found".into(),
                content_type: None,
                body: Vec::new(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<String> {
        lock(&self.alerts).clone()
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        lock(&self.alerts).push(message.to_string());
    }

    fn open_external(&self, url: &str) {
        lock(&self.opened).push(url.to_string());
    }
}

#[derive(Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
    fail_with: Option<String>,
}

impl MemorySink {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            files: Mutex::default(),
            fail_with: Some(message.into()),
        }
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.files).clone()
    }
}

#[async_trait]
impl DownloadSink for MemorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> PipelineResult<SavedFile> {
        if let Some(message) = &self.fail_with {
            return Err(PipelineError::Transport(message.clone()));
        }
        lock(&self.files).push((file_name.to_string(), bytes.to_vec()));
        Ok(SavedFile {
            file_name: file_name.to_string(),
            location: format!("memory://{file_name}"),
            bytes: bytes.len(),
        })
    }
}
