//! Mounts a provider on an axum [`Router`].
//!
//! Core content is answered from memory; objects are streamed from disk.

use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use moldserve_api::{Provider, ServeError};
use moldserve_core::dispatch::guess_content_type;
use moldserve_core::identifier::join_segments;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const NOT_FOUND_BODY: &str = "404 NOT FOUND";

pub struct MoldRoutes {
    provider: Arc<dyn Provider>,
}

impl MoldRoutes {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Route pattern catching everything below the base URL.
    pub fn route_path(&self) -> String {
        format!(
            "{}/{{*identifier}}",
            self.provider.base_url().trim_end_matches('/')
        )
    }

    /// The base URL itself, which has no identifier.
    pub fn base_path(&self) -> String {
        format!("{}/", self.provider.base_url().trim_end_matches('/'))
    }

    /// Routes for the base URL and everything below it.
    ///
    /// The wildcard is percent-decoded by axum, matching the other adapters.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let provider = self.provider.clone();
        let bare = self.provider.clone();
        Router::new()
            .route(
                &self.route_path(),
                get(move |Path(identifier): Path<String>| {
                    let provider = provider.clone();
                    async move { serve_identifier(provider, identifier).await }
                }),
            )
            .route(
                &self.base_path(),
                get(move || {
                    let provider = bare.clone();
                    async move { serve_identifier(provider, String::new()).await }
                }),
            )
    }

    /// Add the provider routes to an existing application.
    pub fn setup<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.merge(self.router())
    }
}

fn not_found(identifier: &str, error: &ServeError) -> Response {
    debug!("{}: {}", identifier, error);
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        NOT_FOUND_BODY,
    )
        .into_response()
}

async fn serve_identifier(provider: Arc<dyn Provider>, identifier: String) -> Response {
    let identifier = join_segments(&identifier);
    let content_type = guess_content_type(&identifier);

    if provider.is_core(&identifier) {
        return match provider.fetch_core(&identifier) {
            Ok(text) => ([(header::CONTENT_TYPE, content_type)], text).into_response(),
            Err(e) => not_found(&identifier, &e),
        };
    }

    let lookup = identifier.clone();
    let path = match tokio::task::spawn_blocking(move || provider.fetch_path(&lookup)).await {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => return not_found(&identifier, &e),
        Err(e) => return not_found(&identifier, &ServeError::Internal(e.to_string())),
    };

    match tokio::fs::File::open(&path).await {
        Ok(file) => (
            [(header::CONTENT_TYPE, content_type)],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response(),
        Err(e) => not_found(
            &identifier,
            &ServeError::not_found(format!("{}: {}", path.display(), e)),
        ),
    }
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving HTTP on {}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
}
