//! Inbound webhook adaptation.
//!
//! Whaapy posts one JSON event per request. The [`WebhookAdapter`] decides
//! whether an event passes the trigger's [`EventFilter`] and reshapes it into
//! a [`WebhookEnvelope`]. It does no I/O; [`crate::server`] wires it to HTTP.
//!
//! # Example
//! ```rust
//! use axum::http::HeaderMap;
//! use serde_json::json;
//! use whaapy_rs::webhook::{EventFilter, WebhookAdapter};
//!
//! let adapter = WebhookAdapter::new(EventFilter::exact("message.received"));
//! let body = json!({ "event": "message.received", "data": { "from": "+5215512345678" } });
//!
//! let envelope = adapter.adapt(&body, &HeaderMap::new()).unwrap();
//! assert_eq!(envelope.data, json!({ "from": "+5215512345678" }));
//!
//! let other = json!({ "event": "message.sent" });
//! assert!(adapter.adapt(&other, &HeaderMap::new()).is_none());
//! ```

use std::{collections::BTreeMap, convert::Infallible, fmt, str::FromStr};

use axum::http::HeaderMap;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::is_truthy;

/// The wildcard event value.
pub const ALL_EVENTS: &str = "*";

/// Which incoming events a trigger accepts.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum EventFilter {
    /// `*`: every event, including ones without a name.
    #[default]
    All,
    /// Only events with exactly this name.
    Exact(String),
}

impl EventFilter {
    pub fn exact(event: impl Into<String>) -> Self {
        match event.into() {
            event if event == ALL_EVENTS => EventFilter::All,
            event => EventFilter::Exact(event),
        }
    }

    pub fn matches(&self, event: Option<&str>) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Exact(expected) => event == Some(expected.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventFilter::All => ALL_EVENTS,
            EventFilter::Exact(event) => event,
        }
    }
}

impl FromStr for EventFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventFilter::exact(s))
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscribable event, as listed in a trigger's event dropdown.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct TriggerEvent {
    pub value: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl TriggerEvent {
    pub const ALL: &'static [TriggerEvent] = &[
        TriggerEvent::new("message.received", "Message Received", "Triggered when a new message is received"),
        TriggerEvent::new("message.sent", "Message Sent", "Triggered when a message is sent"),
        TriggerEvent::new("message.delivered", "Message Delivered", "Triggered when a message is delivered"),
        TriggerEvent::new("message.read", "Message Read", "Triggered when a message is read"),
        TriggerEvent::new("message.failed", "Message Failed", "Triggered when a message fails to send"),
        TriggerEvent::new("conversation.created", "Conversation Created", "Triggered when a new conversation is created"),
        TriggerEvent::new("conversation.updated", "Conversation Updated", "Triggered when a conversation is updated"),
        TriggerEvent::new("conversation.handoff", "Conversation Handoff", "Triggered when AI hands off to a human"),
        TriggerEvent::new(ALL_EVENTS, "All Events", "Triggered for any event"),
    ];

    /// The event a trigger subscribes to when none is chosen.
    pub const DEFAULT: &'static str = "message.received";

    const fn new(value: &'static str, name: &'static str, description: &'static str) -> Self {
        Self {
            value,
            name,
            description,
        }
    }

    pub fn find(value: &str) -> Option<&'static TriggerEvent> {
        Self::ALL.iter().find(|event| event.value == value)
    }
}

/// The normalized record emitted for an accepted event.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// `event`, or the legacy `type`, of the body.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event: Option<String>,
    /// The body's timestamp, or the receive time (RFC 3339, milliseconds).
    pub timestamp: String,
    /// `data`, else `payload`, else the whole body.
    pub data: Value,
    /// Request headers, lower-case names.
    pub headers: BTreeMap<String, String>,
    /// The body, verbatim.
    pub raw: Value,
}

/// Filters and reshapes inbound events.
#[derive(Clone, Debug, Default)]
pub struct WebhookAdapter {
    filter: EventFilter,
}

impl WebhookAdapter {
    pub fn new(filter: EventFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Returns the envelope for `body`, or `None` when the event is filtered
    /// out.
    pub fn adapt(&self, body: &Value, headers: &HeaderMap) -> Option<WebhookEnvelope> {
        let event = event_name(body);
        if !self.filter.matches(event.as_deref()) {
            tracing::debug!(event = ?event, filter = %self.filter, "event filtered out");
            return None;
        }

        Some(WebhookEnvelope {
            timestamp: truthy(body, "timestamp")
                .map(text)
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            data: truthy(body, "data")
                .or_else(|| truthy(body, "payload"))
                .unwrap_or(body)
                .clone(),
            headers: header_map(headers),
            raw: body.clone(),
            event,
        })
    }
}

fn event_name(body: &Value) -> Option<String> {
    truthy(body, "event").or_else(|| truthy(body, "type")).map(text)
}

fn truthy<'b>(body: &'b Value, key: &str) -> Option<&'b Value> {
    body.get(key).filter(|value| is_truthy(value))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lower-case header names to values; repeated headers are joined with `, `.
pub fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map = BTreeMap::<String, String>::new();
    for (name, value) in headers {
        let slot = map.entry(name.as_str().to_owned()).or_default();
        if !slot.is_empty() {
            slot.push_str(", ");
        }
        slot.push_str(&String::from_utf8_lossy(value.as_bytes()));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::CONTENT_TYPE, HeaderValue};
    use serde_json::json;

    fn adapt(filter: &str, body: Value) -> Option<WebhookEnvelope> {
        WebhookAdapter::new(filter.parse().unwrap()).adapt(&body, &HeaderMap::new())
    }

    #[test]
    fn wildcard_accepts_everything() {
        let envelope = adapt("*", json!({ "hello": "world" })).unwrap();
        assert_eq!(envelope.event, None);
        assert_eq!(envelope.data, json!({ "hello": "world" }));
        assert_eq!(envelope.raw, json!({ "hello": "world" }));

        let envelope = adapt("*", json!({ "event": "message.sent" })).unwrap();
        assert_eq!(envelope.event.as_deref(), Some("message.sent"));
    }

    #[test]
    fn exact_filter_emits_nothing_on_mismatch() {
        assert!(adapt("message.read", json!({ "event": "message.sent" })).is_none());
        assert!(adapt("message.read", json!({})).is_none());
    }

    #[test]
    fn legacy_type_names_the_event() {
        let envelope = adapt("conversation.handoff", json!({ "type": "conversation.handoff" })).unwrap();
        assert_eq!(envelope.event.as_deref(), Some("conversation.handoff"));

        // An empty `event` falls back to `type`.
        let envelope = adapt("message.sent", json!({ "event": "", "type": "message.sent" })).unwrap();
        assert_eq!(envelope.event.as_deref(), Some("message.sent"));
    }

    #[test]
    fn data_falls_back_to_payload_then_body() {
        let body = json!({ "event": "message.sent", "data": null, "payload": { "id": 7 } });
        assert_eq!(adapt("*", body).unwrap().data, json!({ "id": 7 }));

        let body = json!({ "event": "message.sent", "data": "" });
        assert_eq!(adapt("*", body.clone()).unwrap().data, body);
    }

    #[test]
    fn timestamp_is_kept_or_generated() {
        let envelope = adapt("*", json!({ "timestamp": "2024-05-01T10:00:00Z" })).unwrap();
        assert_eq!(envelope.timestamp, "2024-05-01T10:00:00Z");

        let envelope = adapt("*", json!({ "timestamp": 1714557600 })).unwrap();
        assert_eq!(envelope.timestamp, "1714557600");

        let envelope = adapt("*", json!({})).unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(&envelope.timestamp).unwrap();
        assert!(envelope.timestamp.ends_with('Z'));
        assert!((Utc::now() - parsed.with_timezone(&Utc)).num_seconds().abs() < 5);
    }

    #[test]
    fn headers_are_flattened() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));

        let envelope = WebhookAdapter::default()
            .adapt(&json!({}), &headers)
            .unwrap();
        assert_eq!(envelope.headers["content-type"], "application/json");
        assert_eq!(envelope.headers["x-forwarded-for"], "10.0.0.1, 10.0.0.2");
    }

    #[test]
    fn trigger_events_are_described() {
        assert_eq!(TriggerEvent::ALL.len(), 9);
        assert_eq!(TriggerEvent::find("*").unwrap().name, "All Events");
        assert!(TriggerEvent::find(TriggerEvent::DEFAULT).is_some());
        assert_eq!(EventFilter::exact("*"), EventFilter::All);
    }
}
