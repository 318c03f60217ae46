//! Whaapy webhook server implementation
//!
//! Receives webhook events over HTTP, filters them through a
//! [`WebhookAdapter`] and hands every accepted [`WebhookEnvelope`] to your
//! [`Handler`]. The endpoint answers `200` as soon as the body is parsed;
//! handlers run on their own task.
//!
//! # Key Components
//! - [`ServerBuilder`]: Configure the server's endpoint, route, event filter,
//!   shutdown signal, and optional signature verification.
//! - [`Server`]: The configured server, ready to run.
//! - [`Server::serve`]: Runs the server with your [`Handler`] until shutdown.
//! - [`Server::router`]: The bare `axum` router, for mounting into an
//!   existing application.
//!
//! # Example
//! ```rust,no_run
//! use whaapy_rs::{server::Server, webhook::{EventFilter, WebhookEnvelope}};
//!
//! # async fn example() -> Result<(), whaapy_rs::Error> {
//! let server = Server::builder()
//!     .endpoint("0.0.0.0:8080".parse().unwrap())
//!     .filter(EventFilter::exact("message.received"))
//!     .build();
//!
//! server
//!     .serve(|envelope: WebhookEnvelope| async move {
//!         println!("{:?}: {}", envelope.event, envelope.data);
//!     })
//!     .await?;
//! # Ok(()) }
//! ```

use std::{future::Future, net::SocketAddr, pin::Pin, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tokio::net::TcpListener;

use crate::{
    error::Error,
    webhook::{EventFilter, WebhookAdapter, WebhookEnvelope},
};

// Default Server configuration...
const DEFAULT_ENDPOINT: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 3000));
const DEFAULT_ROUTE_PATH: &str = "/webhook";
/// Header carrying `sha256=<hex>` when payload verification is enabled.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Whaapy webhook server
///
/// Create using [`Server::builder()`] or [`Server::new()`].
#[derive(Default)]
pub struct Server {
    config: ServerBuilder,
}

impl Server {
    /// Create a new server with default settings
    pub fn new() -> Self {
        ServerBuilder::new().build()
    }

    /// Create a server builder for custom configuration
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Builds the router serving the webhook route.
    pub fn router<H: Handler + 'static>(&self, handler: H) -> Router {
        let state = InnerServer {
            handler,
            adapter: WebhookAdapter::new(self.config.filter.clone()),
            secret: self.config.secret.clone(),
            signature_header: self.config.signature_header.clone(),
        };
        Router::new()
            .route(&self.config.route_path, post(handle_webhook::<H>))
            .with_state(Arc::new(state))
    }

    /// Binds the endpoint and serves until the shutdown signal (if any)
    /// completes.
    pub async fn serve<H: Handler + 'static>(mut self, handler: H) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.endpoint)
            .await
            .map_err(|err| Error::Network(err.into()))?;
        let app = self.router(handler);

        tracing::info!(
            endpoint = %self.config.endpoint,
            route = %self.config.route_path,
            filter = %self.config.filter,
            "webhook server listening"
        );

        let result = match self.config.shutdown.take() {
            Some(shutdown) => axum::serve(listener, app).with_graceful_shutdown(shutdown).await,
            None => axum::serve(listener, app).await,
        };
        result.map_err(|err| Error::Network(err.into()))
    }
}

/// Configuration for a [`Server`].
pub struct ServerBuilder {
    endpoint: SocketAddr,
    route_path: String,
    filter: EventFilter,
    shutdown: Option<Pin<Box<dyn Future<Output = ()> + Send + 'static>>>,
    secret: Option<Arc<[u8]>>,
    signature_header: String,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT,
            route_path: DEFAULT_ROUTE_PATH.to_owned(),
            filter: EventFilter::All,
            shutdown: None,
            secret: None,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_owned(),
        }
    }
}

impl ServerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind. Defaults to `127.0.0.1:3000`.
    pub fn endpoint(mut self, endpoint: SocketAddr) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the webhook route. Defaults to `/webhook`. A missing leading `/`
    /// is added.
    pub fn route_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.route_path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Sets which events reach the handler. Defaults to every event.
    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stops the server gracefully once `shutdown` completes.
    ///
    /// # Example
    /// ```rust,no_run
    /// use whaapy_rs::server::Server;
    ///
    /// let server = Server::builder()
    ///     .shutdown(async {
    ///         tokio::signal::ctrl_c().await.ok();
    ///     })
    ///     .build();
    /// ```
    pub fn shutdown<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Some(Box::pin(shutdown));
        self
    }

    /// Requires every payload to carry an HMAC-SHA256 signature made with
    /// `secret`, as `sha256=<hex>` in the signature header. Unsigned or
    /// mis-signed requests get `401`.
    pub fn verify_payload(mut self, secret: impl AsRef<[u8]>) -> Self {
        self.secret = Some(Arc::from(secret.as_ref()));
        self
    }

    /// Sets the header read by payload verification. Defaults to
    /// [`DEFAULT_SIGNATURE_HEADER`].
    pub fn signature_header(mut self, name: impl Into<String>) -> Self {
        self.signature_header = name.into().to_ascii_lowercase();
        self
    }

    pub fn build(self) -> Server {
        Server { config: self }
    }
}

/// Receives accepted webhook events.
///
/// Implemented for any `Fn(WebhookEnvelope) -> impl Future<Output = ()>`.
pub trait Handler: Send + Sync {
    /// Handle one accepted event.
    fn handle(&self, envelope: WebhookEnvelope) -> impl Future<Output = ()> + Send;

    /// Called for requests that were rejected (bad JSON, bad signature).
    fn handle_error(&self, error: String) -> impl Future<Output = ()> + Send {
        async move {
            tracing::warn!(%error, "webhook request rejected");
        }
    }
}

impl<F, Fut> Handler for F
where
    Fut: Future<Output = ()> + Send,
    F: Fn(WebhookEnvelope) -> Fut + Send + Sync,
{
    #[inline]
    fn handle(&self, envelope: WebhookEnvelope) -> impl Future<Output = ()> + Send {
        self(envelope)
    }
}

struct InnerServer<H> {
    handler: H,
    adapter: WebhookAdapter,
    secret: Option<Arc<[u8]>>,
    signature_header: String,
}

impl<H: Handler + 'static> InnerServer<H> {
    fn reject(self: &Arc<Self>, error: String) {
        let state = self.clone();
        tokio::spawn(async move { state.handler.handle_error(error).await });
    }
}

async fn handle_webhook<H: Handler + 'static>(
    State(state): State<Arc<InnerServer<H>>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if let Some(secret) = &state.secret {
        if let Err(err) = verify_signature(secret, &state.signature_header, &headers, &body) {
            state.reject(format!("Signature verification failed: {err}"));
            return (StatusCode::UNAUTHORIZED, "Signature verification failed");
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            state.reject(format!("JSON parsing failed: {err}"));
            return (
                StatusCode::BAD_REQUEST,
                "Invalid JSON payload. Please ensure the body is valid JSON.",
            );
        }
    };

    if let Some(envelope) = state.adapter.adapt(&payload, &headers) {
        let state = state.clone();
        tokio::spawn(async move { state.handler.handle(envelope).await });
    }

    (StatusCode::OK, "")
}

// Signature verification
pub(crate) fn verify_signature(
    secret: &[u8],
    header: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), String> {
    let signature = headers
        .get(header)
        .ok_or_else(|| format!("Missing {header} header"))?
        .to_str()
        .map_err(|_| "Invalid signature header".to_owned())?;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).map_err(|_| "Invalid webhook secret".to_owned())?;

    mac.update(body);
    let expected_signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    if subtle::ConstantTimeEq::ct_eq(signature.as_bytes(), expected_signature.as_bytes()).into() {
        Ok(())
    } else {
        Err("Signature mismatch. This usually indicates an incorrect webhook secret \
             or a tampered payload."
            .to_owned())
    }
}
