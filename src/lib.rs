#![deny(clippy::future_not_send)]
#![deny(clippy::large_enum_variant)]

//! # whaapy_rs
//!
//! A Rust client for the Whaapy WhatsApp Business REST API, built for
//! workflow hosts that describe every call as a resource, an operation and a
//! map of field values.
//!
//! ## ✨ Features
//!
//! - **Operations**: a closed catalog of resources and operations (messages,
//!   conversations, agent, templates, contacts, funnel), each with its route
//!   and declarative field placement rules.
//! - **Interactive messages**: reply buttons, list menus and CTA URL buttons
//!   built from flat form input, with WhatsApp's limits applied.
//! - **Client**: an authenticated HTTP client with batch execution and a
//!   continue-on-fail policy.
//! - **Webhooks**: an event filter and envelope adapter, plus an `axum`
//!   server with optional HMAC-SHA256 payload verification.
//!
//! ## 🚀 Examples
//!
//! ### Create a Client
//! ```rust,no_run
//! use std::time::Duration;
//! use whaapy_rs::Client;
//!
//! # fn create_client_example() -> Result<(), whaapy_rs::Error> {
//! let client = Client::builder()
//!     .timeout(Duration::from_secs(15))
//!     .build("wha_YOUR_API_KEY")?;
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Send an Interactive Message
//! ```rust,no_run
//! use serde_json::json;
//! use whaapy_rs::{Client, Fields, OperationRequest};
//!
//! # async fn send_buttons_example(client: Client) -> Result<(), whaapy_rs::Error> {
//! let fields = Fields::new()
//!     .with("to", "+5215512345678")
//!     .with("messageType", "interactive")
//!     .with("interactiveType", "button")
//!     .with("interactiveBodyText", "¿Qué te gustaría hacer?")
//!     .with(
//!         "interactiveButtons",
//!         json!({ "buttonValues": [{ "title": "Ver Menú" }, { "title": "Hablar con alguien" }] }),
//!     );
//!
//! let request = OperationRequest::parse("message", "send", fields)?;
//! client.execute(&request).await?;
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Look Up a Contact by Phone
//! ```rust,no_run
//! use whaapy_rs::{Client, Error, Fields, Operation, OperationRequest};
//!
//! # async fn lookup_example(client: Client) -> Result<(), Error> {
//! let request = OperationRequest::new(
//!     Operation::ContactGet,
//!     Fields::new()
//!         .with("contactLookupBy", "phone")
//!         .with("contactPhone_lookup", "+5215512345678"),
//! );
//!
//! match client.execute(&request).await {
//!     Ok(contact) => println!("{contact:?}"),
//!     Err(Error::ContactNotFound { phone }) => println!("nobody at {phone}"),
//!     Err(err) => return Err(err),
//! }
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Receive Webhook Events
//! ```rust,no_run
//! use whaapy_rs::{server::Server, webhook::{EventFilter, WebhookEnvelope}};
//!
//! # async fn webhook_example() -> Result<(), whaapy_rs::Error> {
//! Server::builder()
//!     .filter(EventFilter::exact("conversation.handoff"))
//!     .verify_payload("YOUR_WEBHOOK_SECRET")
//!     .build()
//!     .serve(|envelope: WebhookEnvelope| async move {
//!         println!("handoff: {}", envelope.data);
//!     })
//!     .await
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fields;
pub mod interactive;
pub mod message;
pub mod operation;
pub mod registration;
pub mod request;
pub mod rules;
pub mod server;
pub mod webhook;

pub use client::{Client, Credentials, FailureMode};
pub use error::Error;
pub use fields::Fields;
pub use operation::{catalog, Operation, OperationDescriptor, Resource};
pub use request::{OperationRequest, PreparedRequest, RequestPlan};
pub use webhook::{EventFilter, WebhookAdapter, WebhookEnvelope};
