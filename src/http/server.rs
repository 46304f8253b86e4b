//! # HTTP Server
//!
//! Wraps the todo routes in request ids, request tracing, panic recovery and
//! a per-request timeout, and serves them until a shutdown signal arrives.

use std::any::Any;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info, info_span, warn};

use super::error::ApiError;
use super::routes::todo_routes;
use crate::config::ServiceConfig;
use crate::store::TodoStore;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the full application router.
///
/// A request that outlives `request_timeout` gets a 408 and its store future
/// is dropped, which interrupts any statement it was running.
#[must_use]
pub fn build_router(store: TodoStore, request_timeout: Duration) -> Router {
    with_middleware(todo_routes(store), request_timeout)
}

/// Layers run outermost first: the request id is assigned before the trace
/// span opens, and a panicking handler still gets its id echoed back.
fn with_middleware(routes: Router, request_timeout: Duration) -> Router {
    routes
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    };
    error!(panic = detail, "Handler panicked");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}

/// HTTP server for the todo API
pub struct HttpServer {
    addr: String,
    shutdown_grace: Duration,
    router: Router,
}

impl HttpServer {
    #[must_use]
    pub fn new(store: TodoStore, config: &ServiceConfig) -> Self {
        Self {
            addr: config.socket_addr(),
            shutdown_grace: config.shutdown_grace,
            router: build_router(store, config.request_timeout),
        }
    }

    /// Get the socket address
    #[must_use]
    pub fn socket_addr(&self) -> &str {
        &self.addr
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the accept loop
    /// fails.
    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// Once `shutdown` resolves no new connections are accepted and in-flight
    /// requests get `shutdown_grace` to finish; whatever is still running
    /// after that is abandoned.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %listener.local_addr()?, "Listening");

        let draining = Arc::new(Notify::new());
        let notify = Arc::clone(&draining);
        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown requested, draining in-flight requests");
                notify.notify_one();
            })
            .into_future();
        tokio::pin!(server);

        let grace = self.shutdown_grace;
        tokio::select! {
            result = &mut server => result,
            () = async {
                draining.notified().await;
                tokio::time::sleep(grace).await;
            } => {
                warn!(grace_secs = grace.as_secs(), "Shutdown grace period expired");
                Ok(())
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
