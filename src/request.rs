//! Outbound request assembly.
//!
//! [`OperationRequest::plan`] turns one operation invocation into a
//! transport-free [`RequestPlan`]. Nothing here performs I/O, so every
//! placement can be checked without a server.

use reqwest::Method;
use serde_json::Value;

use crate::{
    error::Error,
    fields::{is_truthy, Fields},
    message,
    operation::{Operation, Resource},
    rules::Placement,
};

/// Value of `contactLookupBy` that switches `contact.get` to a phone lookup.
pub const LOOKUP_BY_PHONE: &str = "phone";

/// One operation invocation with its field values.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationRequest {
    pub operation: Operation,
    pub fields: Fields,
}

impl OperationRequest {
    pub fn new(operation: Operation, fields: Fields) -> Self {
        Self { operation, fields }
    }

    /// Builds a request from the host's string identifiers.
    pub fn parse(resource: &str, operation: &str, fields: Fields) -> Result<Self, Error> {
        Ok(Self::new(Operation::parse(resource, operation)?, fields))
    }

    pub fn resource(&self) -> Resource {
        self.operation.resource()
    }

    /// Resolves the HTTP exchange(s) this invocation needs.
    ///
    /// # Example
    /// ```rust
    /// use whaapy_rs::{Fields, Operation, OperationRequest, RequestPlan};
    /// use serde_json::json;
    ///
    /// let request = OperationRequest::new(
    ///     Operation::ConversationList,
    ///     Fields::new().with("conversationFilters", json!({ "status": "all", "limit": 20 })),
    /// );
    ///
    /// let RequestPlan::Direct(prepared) = request.plan().unwrap() else { unreachable!() };
    /// assert_eq!(prepared.path, "/conversations/v1");
    /// assert_eq!(prepared.query, vec![("limit".to_owned(), "20".to_owned())]);
    /// assert!(prepared.body.is_none());
    /// ```
    pub fn plan(&self) -> Result<RequestPlan, Error> {
        let operation = self.operation;

        let route = operation.route().ok_or_else(|| {
            Error::Unsupported(
                "Media upload requires binary data handling. Use a separate HTTP request \
                 with binary data or upload via URL in the message instead."
                    .to_owned(),
            )
        })?;

        if operation == Operation::ContactGet
            && self.fields.str("contactLookupBy") == Some(LOOKUP_BY_PHONE)
        {
            let phone = self.fields.required_text("contactPhone_lookup")?;
            return Ok(RequestPlan::LookupByPhone {
                phone: phone.into_owned(),
            });
        }

        let path = route.render(&self.fields)?;

        let (body, query) = if operation == Operation::MessageSend {
            (
                Some(message::send_body(operation.rules(), &self.fields)?),
                Vec::new(),
            )
        } else {
            let mut placement = Placement::default();
            placement.apply(operation.rules(), &self.fields)?;
            let body = operation.has_body().then_some(placement.body);
            (body, placement.query)
        };

        Ok(RequestPlan::Direct(PreparedRequest {
            method: route.method,
            path,
            query,
            body: body.map(Value::Object),
        }))
    }
}

/// A fully resolved HTTP request, relative to the API base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl PreparedRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// `METHOD /path`, as used in logs and error endpoints.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// What the client has to do for one invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestPlan {
    Direct(PreparedRequest),
    /// Look the contact up by phone, then fetch it by id.
    LookupByPhone { phone: String },
}

impl RequestPlan {
    /// The pre-flight existence check of a phone lookup.
    pub(crate) fn check_phone(phone: &str) -> PreparedRequest {
        PreparedRequest::get("/contacts/check-phone").query("phone", phone)
    }

    /// The follow-up fetch, given the check response. `None` when the contact
    /// does not exist.
    pub(crate) fn fetch_found(check: &Value) -> Option<PreparedRequest> {
        let exists = check.get("exists").is_some_and(is_truthy);
        let contact = check.get("contact").filter(|c| !c.is_null())?;
        if !exists {
            return None;
        }
        let id = match contact.get("id")? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(PreparedRequest::get(format!(
            "/contacts/v1/{}",
            urlencoding::encode(&id)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn direct(operation: Operation, fields: Fields) -> PreparedRequest {
        match OperationRequest::new(operation, fields).plan().unwrap() {
            RequestPlan::Direct(prepared) => prepared,
            other => panic!("expected a direct request, got {other:?}"),
        }
    }

    #[test]
    fn media_upload_is_unsupported() {
        let err = OperationRequest::new(Operation::MediaUpload, Fields::new())
            .plan()
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.to_string().contains("upload via URL"));
    }

    #[test]
    fn message_send_carries_additional_fields() {
        let fields = Fields::new()
            .with("to", "+5215512345678")
            .with("messageType", "text")
            .with("textContent", "Hola")
            .with(
                "additionalFields",
                json!({
                    "pauseAi": true,
                    "pauseDuration": 45,
                    "disableAi": false,
                    "replyTo": "wamid.prev",
                    "createConversation": false,
                    "metadata": "{\"campaign\":\"spring\"}"
                }),
            );
        let prepared = direct(Operation::MessageSend, fields);
        assert_eq!(prepared.method, Method::POST);
        assert_eq!(prepared.path, "/messages/v1");
        assert_eq!(
            prepared.body.unwrap(),
            json!({
                "to": "+5215512345678",
                "type": "text",
                "content": "Hola",
                "ai": { "pause": true, "pauseDuration": 45 },
                "context": { "message_id": "wamid.prev" },
                "createConversation": false,
                "metadata": { "campaign": "spring" }
            })
        );
    }

    #[test]
    fn malformed_metadata_fails_the_item() {
        let fields = Fields::new()
            .with("to", "+1")
            .with("messageType", "text")
            .with("textContent", "x")
            .with("additionalFields", json!({ "metadata": "{nope" }));
        let err = OperationRequest::new(Operation::MessageSend, fields)
            .plan()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidJson { ref field, .. } if field == "metadata"));
    }

    #[test]
    fn bodyless_operations_send_no_body() {
        let prepared = direct(
            Operation::ConversationClose,
            Fields::new().with("conversationId", "c_1"),
        );
        assert_eq!(prepared.endpoint(), "POST /conversations/v1/c_1/close");
        assert!(prepared.body.is_none());
        assert!(prepared.query.is_empty());
    }

    #[test]
    fn contact_get_by_phone_plans_a_lookup() {
        let fields = Fields::new()
            .with("contactLookupBy", "phone")
            .with("contactPhone_lookup", "+5215512345678");
        assert_eq!(
            OperationRequest::new(Operation::ContactGet, fields).plan().unwrap(),
            RequestPlan::LookupByPhone {
                phone: "+5215512345678".into()
            }
        );

        let by_id = direct(
            Operation::ContactGet,
            Fields::new().with("contactLookupBy", "id").with("contactId", "ct_9"),
        );
        assert_eq!(by_id.path, "/contacts/v1/ct_9");
    }

    #[test]
    fn lookup_follow_up_requires_existing_contact() {
        assert!(RequestPlan::fetch_found(&json!({ "exists": false, "contact": { "id": "x" } })).is_none());
        assert!(RequestPlan::fetch_found(&json!({ "exists": true })).is_none());
        assert!(RequestPlan::fetch_found(&json!({ "exists": true, "contact": null })).is_none());

        let next = RequestPlan::fetch_found(&json!({ "exists": true, "contact": { "id": "ct 1" } })).unwrap();
        assert_eq!(next.path, "/contacts/v1/ct%201");
        assert_eq!(next.method, Method::GET);
    }

    #[test]
    fn contact_list_renames_query_keys() {
        let prepared = direct(
            Operation::ContactList,
            Fields::new().with(
                "contactFilters",
                json!({ "sortBy": "created_at", "sortOrder": "desc", "funnelStageId": "st_2", "search": "" }),
            ),
        );
        assert_eq!(
            prepared.query,
            vec![
                ("funnel_stage_id".to_owned(), "st_2".to_owned()),
                ("sort_by".to_owned(), "created_at".to_owned()),
                ("sort_order".to_owned(), "desc".to_owned()),
            ]
        );
        assert!(prepared.body.is_none());
    }

    #[test]
    fn contact_bulk_defaults_data() {
        let prepared = direct(
            Operation::ContactBulk,
            Fields::new()
                .with("bulkOperation", "add_tags")
                .with("bulkContacts", "[\"ct_1\",\"ct_2\"]"),
        );
        assert_eq!(
            prepared.body.unwrap(),
            json!({ "operation": "add_tags", "contacts": ["ct_1", "ct_2"], "data": {} })
        );
    }

    #[test]
    fn funnel_stage_position_zero_is_sent() {
        let prepared = direct(
            Operation::FunnelCreateStage,
            Fields::new()
                .with("stageName", "Leads")
                .with("stageOptions", json!({ "position": 0, "color": "" })),
        );
        assert_eq!(prepared.body.unwrap(), json!({ "name": "Leads", "position": 0 }));
    }

    #[test]
    fn update_with_empty_collection_sends_empty_object() {
        let prepared = direct(
            Operation::FunnelUpdateStage,
            Fields::new().with("stageId", "st_1"),
        );
        assert_eq!(prepared.body.unwrap(), json!({}));
    }
}
