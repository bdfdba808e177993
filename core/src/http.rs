//! HTTP transport types and the blocking transport used by the client.
//!
//! # Design
//! Requests and responses are plain data. `CouchClient` builds `HttpRequest`
//! values and interprets `HttpResponse` values; a `Transport` performs the
//! round-trip in between. Non-2xx statuses are returned as data, never as
//! errors, because most CouchDB "failures" (404, 409, 412) are answers the
//! client inspects.

use std::fmt;

use crate::error::CouchError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute. Credentials never appear in it; admin requests carry
/// an `authorization` header instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes a single HTTP round-trip.
///
/// Implementations must return `Ok` for every response the server sends,
/// whatever its status, and `Err(CouchError::Transport)` only when no
/// response was obtained.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CouchError>;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Timeouts and connection reuse are whatever the agent defaults to.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CouchError> {
        let headers = &request.headers;
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(&request.url), headers).call(),
            (HttpMethod::Delete, _) => {
                with_headers(self.agent.delete(&request.url), headers).call()
            }
            (HttpMethod::Put, Some(body)) => {
                with_headers(self.agent.put(&request.url), headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => {
                with_headers(self.agent.put(&request.url), headers).send_empty()
            }
        };
        let mut response = result.map_err(|e| CouchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| CouchError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
