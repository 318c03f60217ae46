//! Whaapy REST API client
//!
//! This module provides the [`Client`] used to execute operations against the
//! Whaapy API. It handles authentication, base URL handling, response
//! mapping, and the per-item failure policy of batch execution.
//!
//! # Example – Creating a Client
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use whaapy_rs::client::Client;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .timeout(Duration::from_secs(15))
//!     .base_url("https://api.whaapy.com")
//!     .build("wha_YOUR_API_KEY")?;
//! # Ok(()) }
//! ```
//!
//! # Example – Sending a Message
//!
//! ```rust,no_run
//! use whaapy_rs::{client::Client, Fields, Operation, OperationRequest};
//!
//! # async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let request = OperationRequest::new(
//!     Operation::MessageSend,
//!     Fields::new()
//!         .with("to", "+5215512345678")
//!         .with("messageType", "text")
//!         .with("textContent", "Hello from Rust!"),
//! );
//!
//! let response = client.execute(&request).await?;
//! println!("{response:?}");
//! # Ok(()) }
//! ```

use std::{env, fmt, sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client as HttpClient, ClientBuilder as HttpClientBuilder, Response, Url,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{Error, ServiceError, ServiceErrorKind},
    fields::is_truthy,
    request::{OperationRequest, PreparedRequest, RequestPlan},
};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.whaapy.com";
/// Default user agent for the client
const USER_AGENT: &str = concat!("whaapy-rs/", env!("CARGO_PKG_VERSION"), " (Rust)");

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "WHAAPY_API_KEY";
/// Environment variable overriding the base URL.
pub const BASE_URL_VAR: &str = "WHAAPY_BASE_URL";

/// The entry point for executing operations against the **Whaapy API**.
///
/// `Client` is cheap to clone and can be shared between tasks. Every request
/// carries `Authorization: Bearer <api key>` and the crate's user agent.
///
/// # Example
/// ```rust,no_run
/// use whaapy_rs::{Client, Credentials};
///
/// # fn example() -> Result<(), whaapy_rs::Error> {
/// let client = Client::new(Credentials::from_env()?)?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<InnerClient>,
}

#[derive(Debug)]
struct InnerClient {
    http_client: HttpClient,
    base_url: String,
}

/// API key and base URL of a Whaapy account.
///
/// Deserializes from `{ "apiKey": "...", "baseUrl": "..." }`; the base URL
/// falls back to [`DEFAULT_BASE_URL`].
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reads [`API_KEY_VAR`] and, when set, [`BASE_URL_VAR`].
    pub fn from_env() -> Result<Self, Error> {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::validation(format!("{API_KEY_VAR} is not set")))?;
        let credentials = Self::new(api_key);
        Ok(match env::var(BASE_URL_VAR) {
            Ok(base_url) if !base_url.is_empty() => credentials.with_base_url(base_url),
            _ => credentials,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl From<&str> for Credentials {
    fn from(api_key: &str) -> Self {
        Self::new(api_key)
    }
}

impl From<String> for Credentials {
    fn from(api_key: String) -> Self {
        Self::new(api_key)
    }
}

/// What to do when one item of a batch fails.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FailureMode {
    /// Stop and return the error.
    #[default]
    Abort,
    /// Record `{"error": "<message>"}` for the item and keep going.
    ContinueOnFail,
}

impl Client {
    /// Creates a client with default settings.
    pub fn new(credentials: impl Into<Credentials>) -> Result<Self, Error> {
        Self::builder().build(credentials)
    }

    /// Returns a builder for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The normalized base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Executes one operation.
    ///
    /// Returns `Ok(None)` when the API answers with an empty (or falsy) body.
    pub async fn execute(&self, request: &OperationRequest) -> Result<Option<Value>, Error> {
        match request.plan()? {
            RequestPlan::Direct(prepared) => self.send(&prepared).await,
            RequestPlan::LookupByPhone { phone } => self.contact_by_phone(&phone).await,
        }
    }

    /// Executes a batch of operations in order.
    ///
    /// Items whose response is empty contribute nothing. With
    /// [`FailureMode::ContinueOnFail`] a failed item contributes
    /// `{"error": "<message>"}`; with [`FailureMode::Abort`] the first error is
    /// returned.
    ///
    /// # Example
    /// ```rust,no_run
    /// use whaapy_rs::{client::FailureMode, Client, Fields, OperationRequest};
    ///
    /// # async fn example(client: Client) -> Result<(), whaapy_rs::Error> {
    /// let requests = vec![
    ///     OperationRequest::parse("contact", "getTags", Fields::new())?,
    ///     OperationRequest::parse("funnel", "listStages", Fields::new())?,
    /// ];
    /// let items = client.execute_all(requests, FailureMode::ContinueOnFail).await?;
    /// # Ok(()) }
    /// ```
    pub async fn execute_all<I>(&self, requests: I, mode: FailureMode) -> Result<Vec<Value>, Error>
    where
        I: IntoIterator<Item = OperationRequest>,
    {
        let mut items = Vec::new();
        for (index, request) in requests.into_iter().enumerate() {
            match self.execute(&request).await {
                Ok(Some(value)) => items.push(value),
                Ok(None) => {}
                Err(err) if mode == FailureMode::ContinueOnFail => {
                    tracing::warn!(index, operation = %request.operation, error = %err, "item failed, continuing");
                    items.push(json!({ "error": err.to_string() }));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(items)
    }

    /// Checks the credentials by fetching the authenticated account.
    pub async fn verify_credentials(&self) -> Result<Option<Value>, Error> {
        self.send(&PreparedRequest::get("/auth/me")).await
    }

    async fn contact_by_phone(&self, phone: &str) -> Result<Option<Value>, Error> {
        let check = self
            .send(&RequestPlan::check_phone(phone))
            .await?
            .unwrap_or(Value::Null);

        let fetch = RequestPlan::fetch_found(&check).ok_or_else(|| {
            tracing::debug!(phone, "phone lookup found no contact");
            Error::ContactNotFound {
                phone: phone.to_owned(),
            }
        })?;
        self.send(&fetch).await
    }

    async fn send(&self, prepared: &PreparedRequest) -> Result<Option<Value>, Error> {
        let endpoint = prepared.endpoint();
        let url = format!("{}{}", self.inner.base_url, prepared.path);

        let mut request = self
            .inner
            .http_client
            .request(prepared.method.clone(), url);
        if !prepared.query.is_empty() {
            request = request.query(&prepared.query);
        }
        if let Some(body) = &prepared.body {
            request = request.json(body);
        }

        tracing::debug!(%endpoint, query = prepared.query.len(), "sending request");
        let response = request.send().await?;
        Self::handle_response(response, endpoint).await
    }

    /// Handles API responses with consistent error mapping
    async fn handle_response(response: Response, endpoint: String) -> Result<Option<Value>, Error> {
        let status = response.status();
        let body = response.bytes().await?;
        tracing::debug!(%endpoint, %status, len = body.len(), "received response");

        if !status.is_success() {
            return Err(Self::handle_not_ok(&body).service(endpoint, status).into());
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) if is_truthy(&value) => Ok(Some(value)),
            Ok(_) => Ok(None),
            Err(err) => Err(ServiceError::parse(
                err.into(),
                String::from_utf8_lossy(&body).into_owned(),
            )
            .service(endpoint, status)
            .into()),
        }
    }

    fn handle_not_ok(body: &[u8]) -> ServiceErrorKind {
        let raw = String::from_utf8_lossy(body).into_owned();
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|value| error_message(&value))
            .unwrap_or_else(|| raw.clone());
        ServiceError::api(message, raw)
    }
}

/// Extracts `error.message`, `message` or a string `error` from an error body.
fn error_message(body: &Value) -> Option<String> {
    let candidates = [
        body.pointer("/error/message"),
        body.get("message"),
        body.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|value| value.as_str().filter(|s| !s.is_empty()))
        .map(str::to_owned)
}

/// A builder for configuring and creating a [`Client`].
///
/// # Example
/// ```rust
/// use whaapy_rs::client::ClientBuilder;
///
/// let builder = ClientBuilder::new();
/// ```
#[derive(Debug)]
pub struct ClientBuilder {
    http: HttpClientBuilder,
    base_url: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            http: HttpClientBuilder::new(),
            base_url: None,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout for all API calls.
    ///
    /// Requests that exceed it fail with [`Error::Network`].
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.http = self.http.timeout(duration);
        self
    }

    /// Overrides the base URL of the credentials (e.g. a staging server).
    /// A trailing `/` is removed.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Finishes building the client.
    ///
    /// Fails with [`Error::Internal`] when the API key is not a valid header
    /// value or the base URL does not parse.
    pub fn build(self, credentials: impl Into<Credentials>) -> Result<Client, Error> {
        let credentials = credentials.into();

        let mut auth: HeaderValue = format!("Bearer {}", credentials.api_key)
            .parse()
            .map_err(|err| Error::internal(format!("Invalid API key: {err}").into()))?;
        auth.set_sensitive(true);

        let base_url = self
            .base_url
            .unwrap_or(credentials.base_url)
            .trim_end_matches('/')
            .to_owned();
        Url::parse(&base_url)
            .map_err(|err| Error::internal(format!("Invalid base URL {base_url:?}: {err}").into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http_client = self.http.default_headers(headers).build()?;
        Ok(Client {
            inner: Arc::new(InnerClient {
                http_client,
                base_url,
            }),
        })
    }
}
