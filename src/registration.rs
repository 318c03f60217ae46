//! Webhook registration bookkeeping.
//!
//! A trigger subscribes to events by registering its public URL with the
//! Whaapy API. The remote webhook id returned at registration is kept in a
//! [`RegistrationRecord`] for as long as the trigger is active, and is what
//! deregistration reads. Performing the registration calls is left to the
//! host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{fields::is_truthy, webhook::EventFilter};

/// Remote path webhooks are registered under.
pub const WEBHOOKS_PATH: &str = "/webhooks/v1";

/// Body of a webhook registration request.
///
/// # Example
/// ```rust
/// use whaapy_rs::{registration::Subscription, webhook::EventFilter};
/// use serde_json::json;
///
/// let subscription = Subscription::new("https://hooks.example.com/webhook", &EventFilter::All)
///     .with_secret("s3cret");
/// assert_eq!(
///     serde_json::to_value(&subscription).unwrap(),
///     json!({ "url": "https://hooks.example.com/webhook", "events": ["*"], "secret": "s3cret" })
/// );
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secret: Option<String>,
}

impl Subscription {
    pub fn new(url: impl Into<String>, filter: &EventFilter) -> Self {
        Self {
            url: url.into(),
            events: vec![filter.as_str().to_owned()],
            secret: None,
        }
    }

    /// Sets the shared secret. An empty secret is not sent.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret: String = secret.into();
        self.secret = (!secret.is_empty()).then_some(secret);
        self
    }

    /// Whether a registered webhook (as listed by the API) serves this
    /// subscription's URL and event.
    pub fn is_served_by(&self, webhook: &Value) -> bool {
        let same_url = webhook.get("url").and_then(Value::as_str) == Some(self.url.as_str());
        let events = webhook.get("events").and_then(Value::as_array);
        same_url
            && events.is_some_and(|events| {
                self.events
                    .iter()
                    .all(|wanted| events.iter().any(|e| e.as_str() == Some(wanted.as_str())))
            })
    }
}

/// Persistent state of an active trigger.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub webhook_id: Option<String>,
}

impl RegistrationRecord {
    pub fn webhook_id(&self) -> Option<&str> {
        self.webhook_id.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.webhook_id.is_some()
    }

    /// Stores the id from a registration response: `id`, else `webhook.id`.
    /// Returns whether an id was found.
    pub fn record(&mut self, response: &Value) -> bool {
        let id = response
            .get("id")
            .filter(|id| is_truthy(id))
            .or_else(|| response.pointer("/webhook/id"))
            .and_then(|id| match id {
                Value::String(id) if !id.is_empty() => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            });
        if id.is_none() {
            tracing::warn!("registration response carried no webhook id");
        }
        self.webhook_id = id;
        self.webhook_id.is_some()
    }

    /// Clears the record, returning the id to deregister.
    pub fn take(&mut self) -> Option<String> {
        self.webhook_id.take()
    }

    /// Path of the registered webhook, for deregistration.
    pub fn path(&self) -> Option<String> {
        self.webhook_id
            .as_deref()
            .map(|id| format!("{WEBHOOKS_PATH}/{}", urlencoding::encode(id)))
    }
}
