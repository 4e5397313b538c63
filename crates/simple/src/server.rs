use crate::directory::DirectoryResponder;
use crate::error::Result;
use crate::options::ServeOptions;
use crate::provider::ProviderResponder;
use crate::responder::{Body, RequestInfo, Responder, dispatch, error_response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use moldserve_api::Provider;
use std::convert::Infallible;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Method gate plus the responder chain.
pub struct RequestHandler {
    responders: Vec<Arc<dyn Responder>>,
}

impl RequestHandler {
    /// Provider under its base URL, files and CGI scripts from `root` for
    /// everything else.
    pub fn new(provider: Arc<dyn Provider>, root: impl Into<PathBuf>) -> Self {
        let responders: Vec<Arc<dyn Responder>> = vec![
            Arc::new(ProviderResponder::new(provider)),
            Arc::new(DirectoryResponder::new(root)),
        ];
        Self::with_responders(responders)
    }

    /// Provider mounted under `options.prefix`, files and CGI scripts from
    /// `options.root` run with `options.interpreter`.
    pub fn from_options(options: &ServeOptions, provider: Arc<dyn Provider>) -> Self {
        let responders: Vec<Arc<dyn Responder>> = vec![
            Arc::new(ProviderResponder::with_prefix(provider, &options.prefix)),
            Arc::new(
                DirectoryResponder::new(options.root.clone())
                    .with_interpreter(options.interpreter.clone()),
            ),
        ];
        Self::with_responders(responders)
    }

    pub fn with_responders(responders: Vec<Arc<dyn Responder>>) -> Self {
        Self { responders }
    }

    pub async fn handle(&self, request: &RequestInfo) -> Response<Body> {
        let method = request.method.clone();
        let mut response = if method == Method::GET
            || method == Method::HEAD
            || method == Method::POST
        {
            dispatch(&self.responders, request).await
        } else {
            error_response(
                StatusCode::NOT_IMPLEMENTED,
                &format!("Unsupported method ('{}')", method),
            )
        };

        info!(
            "{} \"{} {} {:?}\" {}",
            request
                .remote_addr
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "-".to_string()),
            method,
            request.target,
            request.version,
            response.status().as_u16()
        );

        if method == Method::HEAD {
            *response.body_mut() = Full::new(Bytes::new());
        }
        response
    }

    async fn handle_incoming(
        &self,
        request: Request<Incoming>,
        remote_addr: SocketAddr,
        local_addr: Option<SocketAddr>,
    ) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body from {}: {}", remote_addr, e);
                return error_response(StatusCode::BAD_REQUEST, "Bad request body");
            }
        };

        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let info = RequestInfo {
            method: parts.method,
            target,
            version: parts.version,
            headers: parts.headers,
            body,
            remote_addr: Some(remote_addr),
            local_addr,
        };
        self.handle(&info).await
    }
}

/// Accept connections on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    handler: Arc<RequestHandler>,
    shutdown: CancellationToken,
) -> Result<()> {
    let local_addr = listener.local_addr().ok();

    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        let handler = handler.clone();
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let handler = handler.clone();
                async move {
                    Ok::<_, Infallible>(
                        handler
                            .handle_incoming(request, remote_addr, local_addr)
                            .await,
                    )
                }
            });
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                debug!("Connection from {} ended: {}", remote_addr, e);
            }
        });
    }

    Ok(())
}

/// Bind per `options`, announce the address on `out` and serve until
/// `shutdown` fires.
pub async fn serve_until(
    options: &ServeOptions,
    provider: Arc<dyn Provider>,
    out: &mut (dyn Write + Send),
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind((options.bind.as_str(), options.port)).await?;
    let addr = listener.local_addr()?;
    writeln!(out, "Serving HTTP on {}:{}...", addr.ip(), addr.port())?;
    out.flush()?;

    let handler = Arc::new(RequestHandler::from_options(options, provider));
    serve(listener, handler, shutdown).await
}

/// Serve in the foreground until Ctrl-C.
pub async fn serve_nunja(options: ServeOptions, provider: Arc<dyn Provider>) -> Result<()> {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nKeyboard interrupt received, shutting down...");
            trigger.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    serve_until(&options, provider, &mut stdout, shutdown).await
}
