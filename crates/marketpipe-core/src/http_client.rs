use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// HTTP request envelope used by the market client transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status_only(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure class of a transport-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// The request exceeded its timeout budget.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// Any other transport failure.
    Other,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Connect,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Other,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport contract that supports async execution behind a trait object.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production HTTP client using reqwest for real API calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent("marketpipe/0.1.0")
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let timeout = std::time::Duration::from_millis(request.timeout_ms);
            builder = builder.timeout(timeout);

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::connect(format!("connection failed: {e}"))
                } else {
                    HttpError::other(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::other(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Scripted transport for deterministic offline tests: pops one queued
/// outcome per request, in order.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new(outcomes: Vec<Result<HttpResponse, HttpError>>) -> Self {
        let mut responses = outcomes;
        // Stored reversed so pop() yields outcomes in queue order.
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// URLs of every request executed so far, in order.
    pub fn seen_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("scripted client request log poisoned")
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("scripted client request log poisoned")
            .push(request);
        let outcome = self
            .responses
            .lock()
            .expect("scripted client response queue poisoned")
            .pop()
            .unwrap_or_else(|| Ok(HttpResponse::ok_json("[]")));
        Box::pin(async move { outcome })
    }
}
