//! Provider adapter for a blocking `tiny_http` server.

use moldserve_api::Provider;
use moldserve_core::{dispatch, identifier};
use std::io::Cursor;
use std::sync::Arc;
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, info, warn};

pub type TextResponse = Response<Cursor<Vec<u8>>>;

const NOT_FOUND_BODY: &str = "404 NOT FOUND";

fn with_content_type(response: TextResponse, content_type: &str) -> TextResponse {
    match Header::from_bytes("Content-Type", content_type) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn not_found() -> TextResponse {
    with_content_type(
        Response::from_string(NOT_FOUND_BODY).with_status_code(404),
        "text/plain",
    )
}

pub struct TinyAdapter {
    provider: Arc<dyn Provider>,
}

impl TinyAdapter {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Answer `url` from the provider; `None` when it is outside the base URL.
    pub fn respond(&self, url: &str) -> Option<TextResponse> {
        let path = url.split_once('?').map_or(url, |(path, _)| path);
        let raw = identifier::normalize(path, self.provider.base_url())?;
        let identifier = identifier::join_segments(&identifier::decode(&raw));
        match dispatch::fetch_identifier(self.provider.as_ref(), &identifier) {
            Ok(text) => {
                let content_type = dispatch::guess_content_type(&identifier);
                Some(with_content_type(Response::from_string(text), &content_type))
            }
            Err(e) => {
                debug!("{}: {}", path, e);
                Some(not_found())
            }
        }
    }

    pub fn handle(&self, request: Request) {
        let response = self.respond(request.url()).unwrap_or_else(not_found);
        info!(
            "\"{} {}\" {}",
            request.method(),
            request.url(),
            response.status_code().0
        );
        if let Err(e) = request.respond(response) {
            warn!("Failed to send response: {}", e);
        }
    }

    /// Handle requests from `server` on `workers` threads.
    ///
    /// Returns once every worker has been released with
    /// [`Server::unblock`].
    pub fn serve(&self, server: &Server, workers: usize) {
        std::thread::scope(|scope| {
            for _ in 0..workers.max(1) {
                scope.spawn(|| {
                    while let Ok(request) = server.recv() {
                        self.handle(request);
                    }
                });
            }
        });
    }
}
