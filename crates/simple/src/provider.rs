use crate::responder::{
    Body, NOT_FOUND_BODY, RequestInfo, Responder, split_query, text_response,
};
use async_trait::async_trait;
use hyper::{Method, Response, StatusCode};
use moldserve_api::Provider;
use moldserve_core::{dispatch, identifier};
use std::sync::Arc;
use tracing::{debug, error};

/// Serves everything under a path prefix as text.
///
/// The prefix defaults to the provider's base URL.
pub struct ProviderResponder {
    provider: Arc<dyn Provider>,
    prefix: String,
}

impl ProviderResponder {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        let prefix = provider.base_url().to_string();
        Self::with_prefix(provider, &prefix)
    }

    /// Mount `provider` under `prefix` instead of its own base URL.
    pub fn with_prefix(provider: Arc<dyn Provider>, prefix: &str) -> Self {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        Self { provider, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `path` is claimed by the provider.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

#[async_trait]
impl Responder for ProviderResponder {
    async fn respond(&self, request: &RequestInfo) -> Option<Response<Body>> {
        if request.method != Method::GET && request.method != Method::HEAD {
            return None;
        }

        let path = split_query(&request.target).0;
        let remainder = path.strip_prefix(&self.prefix)?;
        let identifier = identifier::join_segments(&identifier::decode(remainder));

        let provider = self.provider.clone();
        let lookup = identifier.clone();
        let fetched = tokio::task::spawn_blocking(move || {
            dispatch::fetch_identifier(provider.as_ref(), &lookup)
        })
        .await;

        let response = match fetched {
            Ok(Ok(text)) => {
                let content_type = dispatch::guess_content_type(&identifier);
                text_response(StatusCode::OK, &content_type, text)
            }
            Ok(Err(e)) => {
                debug!("{}: {}", path, e);
                text_response(StatusCode::NOT_FOUND, "text/plain", NOT_FOUND_BODY)
            }
            Err(e) => {
                error!("Lookup of {} did not complete: {}", path, e);
                text_response(StatusCode::NOT_FOUND, "text/plain", NOT_FOUND_BODY)
            }
        };
        Some(response)
    }
}
