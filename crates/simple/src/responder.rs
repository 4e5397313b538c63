//! Request model and the responder chain.
//!
//! A request is offered to each responder in turn; the first one returning a
//! response wins. The provider responder declines everything outside its
//! base URL so the directory responder behind it can serve the rest.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use hyper::{HeaderMap, Method, Response, StatusCode, Version};
use std::net::SocketAddr;
use std::sync::Arc;

pub type Body = Full<Bytes>;

pub const NOT_FOUND_BODY: &str = "404 NOT FOUND";

/// The parts of an incoming request responders care about.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    /// Path and query exactly as requested.
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
}

impl RequestInfo {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: target.into(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            local_addr: None,
        }
    }

    /// The target without its query string.
    pub fn path(&self) -> &str {
        split_query(&self.target).0
    }

    pub fn query(&self) -> &str {
        split_query(&self.target).1
    }
}

/// Split `target` at the first `?`.
pub fn split_query(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// `None` declines the request.
    async fn respond(&self, request: &RequestInfo) -> Option<Response<Body>>;
}

/// Offer `request` to `responders` in order.
pub async fn dispatch(responders: &[Arc<dyn Responder>], request: &RequestInfo) -> Response<Body> {
    for responder in responders {
        if let Some(response) = responder.respond(request).await {
            return response;
        }
    }
    text_response(StatusCode::NOT_FOUND, "text/plain", NOT_FOUND_BODY)
}

pub fn bytes_response(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> Response<Body> {
    let body = body.into();
    let mut response = Response::new(Full::new(body.clone()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    response
}

pub fn text_response(status: StatusCode, content_type: &str, body: impl Into<String>) -> Response<Body> {
    bytes_response(status, content_type, body.into())
}

/// Plain-text error response carrying the status' reason.
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    text_response(
        status,
        "text/plain",
        format!("{} {}", status.as_u16(), message),
    )
}
