//! HTTP transport types and the `Transport` seam.
//!
//! # Design
//! Requests and responses are plain data. `KoboClient` and the CKAN fetcher
//! build `HttpRequest` values and interpret `HttpResponse` values; executing
//! the round-trip is delegated to a `Transport`. Production code uses
//! `UreqTransport`, tests substitute a scripted transport or point the ureq
//! one at the mock server.

use encoding_rs::{Encoding, UTF_8};

use crate::error::SyncError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `query` pairs are appended to `url` by the transport; `body` is sent
/// verbatim with whatever `Content-Type` is listed in `headers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request and returns the response as data.
///
/// Non-2xx statuses must come back as `Ok`; only failures that produced no
/// response at all are `Err`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SyncError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SyncError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a ureq agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        // Status interpretation belongs to the callers, not to ureq.
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

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SyncError> {
        let url = request.url.as_str();
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => {
                let mut builder = self.agent.get(url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                for (key, value) in &request.query {
                    builder = builder.query(key, value);
                }
                builder.call()
            }
            (method, body) => {
                let mut builder = match method {
                    HttpMethod::Put => self.agent.put(url),
                    _ => self.agent.post(url),
                };
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                for (key, value) in &request.query {
                    builder = builder.query(key, value);
                }
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| SyncError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let body = decode_body(content_type.as_deref(), &bytes)?;
        Ok(HttpResponse { status, body })
    }
}

/// Decode a body with the `charset` named in its `Content-Type`, UTF-8 when
/// none is given. Malformed bytes are an error rather than replaced.
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Result<String, SyncError> {
    let encoding = match content_type.and_then(charset_label) {
        Some(label) => Encoding::for_label(label.as_bytes()).ok_or_else(|| SyncError::Decode {
            charset: label.to_string(),
            reason: "unknown charset".to_string(),
        })?,
        None => UTF_8,
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(SyncError::Decode {
            charset: used.name().to_string(),
            reason: "malformed byte sequence".to_string(),
        });
    }
    Ok(text.into_owned())
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}
