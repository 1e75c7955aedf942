//! HTTP server shared by the watcher and mover roles
//!
//! Every role serves the same fixed routes:
//!
//! - `POST /` - the role's notification endpoint
//! - `GET /healthz` - liveness probe, always `200 ok`
//! - `GET /metrics` - Prometheus text exposition format
//!
//! Anything else is answered with `404`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::MetricsRegistry;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Pause after an `accept()` failure such as running out of descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

// ============================================================================
// Request / Reply
// ============================================================================

/// A fully buffered inbound request
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a `POST /` carrying `body`
    pub fn post(body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, "/").with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns a header value as trimmed text, if present and non-empty
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn has_body(&self) -> bool {
        !self.body.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// A plain-text reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub content_type: &'static str,
}

impl Reply {
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: TEXT_PLAIN,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::text(StatusCode::OK, body)
    }

    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "Not Found")
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        response
    }
}

/// Handler behind a role's `POST /` endpoint
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Role name used in logs and metric labels
    fn role(&self) -> &'static str;

    async fn handle(&self, request: InboundRequest) -> Reply;
}

// ============================================================================
// Router
// ============================================================================

/// Dispatches requests to the health, metrics and notification routes
pub struct Router {
    metrics: Arc<MetricsRegistry>,
    endpoint: Option<Arc<dyn RequestHandler>>,
}

impl Router {
    /// A router serving only `/healthz` and `/metrics`
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            metrics,
            endpoint: None,
        }
    }

    /// Mounts `endpoint` on `POST /`
    pub fn with_endpoint(mut self, endpoint: Arc<dyn RequestHandler>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub async fn dispatch(&self, request: InboundRequest) -> Reply {
        let is_get = request.method == Method::GET;
        let (route, reply) = if is_get && request.path == "/healthz" {
            ("/healthz", Reply::ok("ok"))
        } else if is_get && request.path == "/metrics" {
            ("/metrics", self.render_metrics())
        } else if request.method == Method::POST && request.path == "/" {
            match &self.endpoint {
                Some(endpoint) => ("/", endpoint.handle(request).await),
                None => ("other", Reply::not_found()),
            }
        } else {
            ("other", Reply::not_found())
        };
        self.metrics
            .record_http_request(route, reply.status.as_u16());
        reply
    }

    fn render_metrics(&self) -> Reply {
        match self.metrics.encode() {
            Ok(body) => Reply {
                status: StatusCode::OK,
                body,
                content_type: PROMETHEUS_TEXT,
            },
            Err(e) => Reply::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {e}"),
            ),
        }
    }
}

// ============================================================================
// HttpServer
// ============================================================================

/// HTTP/1 server bound to a local address
pub struct HttpServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl HttpServer {
    /// Binds the listening socket. Port `0` picks a free port.
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves requests until `shutdown` is cancelled.
    ///
    /// On shutdown the server stops accepting, and open connections finish
    /// the request they are handling before closing.
    pub async fn run(self, router: Arc<Router>, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(addr = %self.addr, "HTTP server listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            if let Some(pause) = accept_backoff(&e) {
                                warn!(error = %e, "Failed to accept connection; backing off");
                                tokio::time::sleep(pause).await;
                            } else {
                                debug!(error = %e, "Connection dropped before accept");
                            }
                            continue;
                        }
                    };
                    debug!(peer = %peer, "Connection accepted");
                    let io = TokioIo::new(stream);
                    let router = Arc::clone(&router);
                    let shutdown = shutdown.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { handle_request(req, &router).await }
                        });

                        let conn = http1::Builder::new().serve_connection(io, service);
                        tokio::pin!(conn);
                        let result = tokio::select! {
                            result = conn.as_mut() => result,
                            _ = shutdown.cancelled() => {
                                conn.as_mut().graceful_shutdown();
                                conn.as_mut().await
                            }
                        };
                        if let Err(e) = result {
                            error!(error = %e, "HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("HTTP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// How long to wait before accepting again after `e`.
///
/// Errors scoped to a single peer need no pause; anything else (EMFILE,
/// ENFILE, ENOBUFS) does, so the loop does not spin while it persists.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

/// Buffers one hyper request and hands it to the router.
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: &Router,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let reply = Reply::text(
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {e}"),
            );
            return Ok(reply.into_response());
        }
    };

    let request = InboundRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };
    Ok(router.dispatch(request).await.into_response())
}
