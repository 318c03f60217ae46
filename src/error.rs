//! Error Handling
//!
//! This module defines the crate's error types. Failures fall into two
//! families: errors raised while *building* a request from field values
//! (validation, malformed embedded JSON, unsupported operations, lookup
//! misses), and errors raised while *talking* to the Whaapy API (transport
//! and service errors).

use std::error::Error as StdError;

use reqwest::StatusCode;

/// The **top-level error enum** for the `whaapy-rs` crate.
///
/// Every per-item failure surfaces as one of these variants. Its `Display`
/// output is the message recorded when a batch runs with
/// [`FailureMode::ContinueOnFail`](crate::client::FailureMode::ContinueOnFail).
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Required structured input was missing or invalid, e.g. a template
    /// message without a language or an unknown operation name.
    #[error("{0}")]
    Validation(String),

    /// A contact lookup by phone number found no contact.
    #[error("No contact found with phone number: {phone}")]
    ContactNotFound { phone: String },

    /// A field that carries embedded JSON could not be parsed.
    #[error("Field '{field}' does not contain valid JSON: {source}")]
    InvalidJson {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// The operation cannot be performed through this client.
    #[error("{0}")]
    Unsupported(String),

    /// Represents an error occurring during network operations (e.g., HTTP requests,
    /// connection issues, DNS resolution failures, timeouts or TLS errors).
    #[error("A network error occurred: {0}")]
    Network(#[from] BoxError),

    /// The Whaapy API answered with a non-success status, or with a body that
    /// could not be understood.
    #[error("An API service error occurred: {0}")]
    Service(#[from] ServiceError),

    /// Represents an **internal logic error**, or invalid input that could
    /// not be turned into a well-formed HTTP request (an API key that is not a
    /// valid header value, a base URL that does not parse).
    #[error("An internal library error occurred: {0}")]
    Internal(BoxError),
}

impl Error {
    pub(crate) fn network(err: BoxError) -> Self {
        Self::Network(err)
    }

    pub(crate) fn internal(err: BoxError) -> Self {
        Self::Internal(err)
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn missing(field: &str) -> Self {
        Self::Validation(format!("Missing required parameter '{field}'"))
    }
}

/// Represents **service-level errors** encountered during API interactions.
/// This struct provides context such as the HTTP status code, the affected
/// endpoint, and a more specific error kind.
#[derive(thiserror::Error, Debug)]
#[error("Service error at endpoint '{endpoint}': {kind} (HTTP status {status})")]
#[non_exhaustive]
pub struct ServiceError {
    pub(crate) status: StatusCode,
    pub(crate) kind: ServiceErrorKind,
    pub(crate) endpoint: String,
}

impl ServiceError {
    /// Returns the HTTP status code associated with this service error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the API endpoint where this service error occurred.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the specific kind of service error.
    pub fn kind(&self) -> &ServiceErrorKind {
        &self.kind
    }

    pub(crate) fn api(message: String, body: String) -> ServiceErrorKind {
        ServiceErrorKind::Api(ApiError { message, body })
    }

    pub(crate) fn parse(source: BoxError, body: String) -> ServiceErrorKind {
        ServiceErrorKind::Parse(ParseError {
            source: Some(source),
            body,
        })
    }
}

/// A sub-category of [`ServiceError`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ServiceErrorKind {
    /// The API rejected the request and explained why.
    #[error("The API returned an error: {0}")]
    Api(#[from] ApiError),

    /// The response body could not be parsed as JSON.
    #[error("Failed to parse the API response: {0}")]
    Parse(#[from] ParseError),
}

impl ServiceErrorKind {
    pub(crate) fn service(self, endpoint: impl Into<String>, status: StatusCode) -> ServiceError {
        ServiceError {
            status,
            kind: self,
            endpoint: endpoint.into(),
        }
    }
}

/// An error reported by the Whaapy API in a response body.
///
/// # Fields
/// - `message`: the API's own description (`error.message`, `message` or
///   `error` when it is a string), or the raw body when none is present.
/// - `body`: the raw response body.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
#[non_exhaustive]
pub struct ApiError {
    pub message: String,
    pub body: String,
}

/// Represents an error that occurred during **response parsing**.
#[derive(thiserror::Error, Debug)]
#[error("Failed to parse the response body. Raw body content was: '{}'.", body)]
#[non_exhaustive]
pub struct ParseError {
    #[source]
    pub(crate) source: Option<BoxError>,
    pub body: String,
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() || value.is_redirect() {
            // Builder and redirect errors point to misconfiguration or invalid input.
            Self::internal(value.into())
        } else {
            Self::network(value.into())
        }
    }
}

/// A convenient type alias for a boxed, trait-object error that can be sent across threads.
pub type BoxError = Box<dyn StdError + Send + Sync>;
