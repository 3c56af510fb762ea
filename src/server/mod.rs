//! HTTP server module
//!
//! Accepts connections with `hyper` and answers signing requests.
//!
//! # Architecture
//!
//! - One tokio task per connection, HTTP/1.1 only
//! - All request state is local to the task; the router and upload mode are
//!   shared read-only behind an `Arc`
//! - Nothing is written anywhere except the response, so a request dropped
//!   mid-flight leaves no trace
//!
//! # Example
//!
//! ```no_run
//! use s3_direct_upload::config::Config;
//! use s3_direct_upload::server::Server;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let server = Server::new(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::metrics;
use crate::router::{Route, Router, RouterError};
use crate::upload::{BodyFormat, SigningService, UploadError, UploadMode, UploadRequest};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Invalid upload configuration: {0}")]
    ConfigError(#[from] UploadError),
}

/// Read-only state shared by every connection
struct AppState {
    router: Router,
    mode: UploadMode,
    max_body_bytes: usize,
}

/// HTTP Server
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Create a new server instance and bind its listener
    ///
    /// The upload mode is chosen here, once, from the storage credentials.
    /// Port 0 lets the OS pick a port; see [`Server::local_addr`].
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let mode = UploadMode::from_config(&config.storage)?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);
        info!(
            "Upload mode: {} (bucket {})",
            mode.name(),
            config.storage.bucket
        );

        Ok(Self {
            state: Arc::new(AppState {
                router: Router::new(&config.server.sign_path),
                mode,
                max_body_bytes: config.server.max_body_bytes,
            }),
            listener,
            local_addr,
        })
    }

    /// The address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// "direct" or "plain"
    pub fn mode(&self) -> &'static str {
        self.state.mode.name()
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves
    ///
    /// Stops accepting new connections; connections already being served
    /// finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Accepting connections on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }

        info!("Shutting down server");
        Ok(())
    }
}

/// Handle HTTP request
///
/// # Supported Endpoints
///
/// * `GET /health` - Health check (returns "ok")
/// * `POST {sign_path}` - Issue a signed upload policy
/// * Other methods on a known path return 405, everything else 404
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    info!("Handling {} {}", method, path);

    let route = match state.router.resolve(method.as_str(), &path) {
        Ok(route) => route,
        Err(RouterError::NotFound(_)) => {
            return Ok(text_response(StatusCode::NOT_FOUND, "Not Found"));
        }
        Err(RouterError::MethodNotAllowed { allowed, .. }) => {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allowed));
            return Ok(response);
        }
    };

    let response = match route {
        Route::Health => text_response(StatusCode::OK, "ok"),
        Route::Sign => match state.mode.signing_service() {
            Some(service) => handle_sign(req, service, state.max_body_bytes).await,
            None => {
                info!("Signing requested but direct uploads are disabled");
                text_response(StatusCode::NOT_FOUND, "Direct uploads are not enabled")
            }
        },
    };

    Ok(response)
}

/// Validate, sign and serialize one upload request
async fn handle_sign(
    req: Request<Incoming>,
    service: &SigningService,
    max_body_bytes: usize,
) -> Response<Full<Bytes>> {
    let started = Instant::now();

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let format = match BodyFormat::from_content_type(content_type.as_deref()) {
        Ok(format) => format,
        Err(e) => return error_response(&e),
    };

    let body = match Limited::new(req.into_body(), max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!("Signing request body exceeds {} bytes", max_body_bytes);
            metrics::record_signature_rejected("body");
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
        Err(e) => {
            warn!("Failed to read signing request body: {}", e);
            metrics::record_signature_rejected("body");
            return text_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let request = match UploadRequest::from_body(&format, body).await {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let signed = match service.sign(&request) {
        Ok(signed) => signed,
        Err(e) => {
            return error_response_for(&e, &request);
        }
    };

    let body = match serde_json::to_vec(&signed) {
        Ok(body) => body,
        Err(e) => return error_response_for(&UploadError::Encoding(e.to_string()), &request),
    };

    metrics::record_signature_issued(started.elapsed().as_secs_f64());

    let mut response = Response::new(Full::new(Bytes::from(body)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Map an error raised before the request was validated
fn error_response(err: &UploadError) -> Response<Full<Bytes>> {
    if err.is_client_error() {
        warn!(error_kind = err.kind(), "Rejected signing request: {}", err);
        metrics::record_signature_rejected(err.kind());
        text_response(StatusCode::BAD_REQUEST, err.to_string())
    } else {
        error!(error_kind = err.kind(), "Signing request failed: {}", err);
        metrics::record_signature_failed(err.kind());
        text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// Map a server-side failure for a validated request
fn error_response_for(err: &UploadError, request: &UploadRequest) -> Response<Full<Bytes>> {
    error!(
        error_kind = err.kind(),
        file_name = %request.file_name,
        mime_type = %request.mime_type,
        "Signing request failed: {}",
        err
    );
    metrics::record_signature_failed(err.kind());
    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
