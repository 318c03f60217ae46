mod common;

use common::*;
use serde_json::json;
use whaapy_rs::{Error, FailureMode, Fields, Operation, OperationRequest};
use wiremock::{
    matchers::{bearer_token, body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn by_phone(phone: &str) -> OperationRequest {
    OperationRequest::new(
        Operation::ContactGet,
        Fields::new()
            .with("contactLookupBy", "phone")
            .with("contactPhone_lookup", phone),
    )
}

#[tokio::test]
async fn test_get_contact_by_phone() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    let contact = json!({ "id": CONTACT_ID, "name": "Ana", "phone_number": RECIPIENT });

    Mock::given(method("GET"))
        .and(path("/contacts/check-phone"))
        .and(query_param("phone", RECIPIENT))
        .and(bearer_token(API_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "exists": true, "contact": { "id": CONTACT_ID } })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/contacts/v1/{CONTACT_ID}")))
        .and(bearer_token(API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(&contact))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client.execute(&by_phone(RECIPIENT)).await.unwrap();
    assert_eq!(result, Some(contact));
}

#[tokio::test]
async fn test_unknown_phone_makes_no_second_call() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    Mock::given(method("GET"))
        .and(path("/contacts/check-phone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exists": false })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/contacts/v1/{CONTACT_ID}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = client.execute(&by_phone("+34600000000")).await.unwrap_err();
    assert!(matches!(err, Error::ContactNotFound { ref phone } if phone == "+34600000000"));
    assert_eq!(
        err.to_string(),
        "No contact found with phone number: +34600000000"
    );
}

#[tokio::test]
async fn test_list_contacts_with_filters() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    Mock::given(method("GET"))
        .and(path("/contacts/v1"))
        .and(query_param("search", "ana"))
        .and(query_param("sort_by", "last_message_at"))
        .and(query_param("sort_order", "desc"))
        .and(query_param("funnel_stage_id", STAGE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contacts": [], "total": 0 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = OperationRequest::parse(
        "contact",
        "list",
        Fields::new().with(
            "contactFilters",
            json!({
                "search": "ana",
                "sortBy": "last_message_at",
                "sortOrder": "desc",
                "funnelStageId": STAGE_ID,
                "tags": ""
            }),
        ),
    )
    .unwrap();

    client.execute(&request).await.unwrap();
}

#[tokio::test]
async fn test_update_contact_renames_fields() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    Mock::given(method("PATCH"))
        .and(path(format!("/contacts/v1/{CONTACT_ID}")))
        .and(body_json(json!({
            "name": "Ana María",
            "phone_number": RECIPIENT,
            "custom_fields": { "plan": "gold" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": CONTACT_ID })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = OperationRequest::new(
        Operation::ContactUpdate,
        Fields::new().with("contactId", CONTACT_ID).with(
            "contactUpdateFields",
            json!({
                "name": "Ana María",
                "phoneNumber": RECIPIENT,
                "email": "",
                "customFields": "{\"plan\":\"gold\"}"
            }),
        ),
    );

    client.execute(&request).await.unwrap();
}

#[tokio::test]
async fn test_create_contact_with_json_fields() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    Mock::given(method("POST"))
        .and(path("/contacts/v1"))
        .and(body_json(json!({
            "name": "Luis",
            "phoneNumber": "+5215599999999",
            "tags": ["vip"],
            "metadata": { "source": "landing" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "ct_new" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = OperationRequest::new(
        Operation::ContactCreate,
        Fields::new()
            .with("contactName", "Luis")
            .with("contactPhone", "+5215599999999")
            .with(
                "contactAdditional",
                json!({ "email": "", "tags": ["vip"], "metadata": "{\"source\":\"landing\"}" }),
            ),
    );

    let created = client.execute(&request).await.unwrap();
    assert_eq!(created, Some(json!({ "id": "ct_new" })));
}

#[tokio::test]
async fn test_batch_continue_on_fail() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    Mock::given(method("GET"))
        .and(path("/contacts/v1/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tags": ["vip"] })))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/contacts/v1/{CONTACT_ID}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let requests = vec![
        OperationRequest::new(Operation::ContactGetTags, Fields::new()),
        // Malformed embedded JSON fails this item only.
        OperationRequest::new(
            Operation::ContactBulk,
            Fields::new()
                .with("bulkOperation", "delete")
                .with("bulkContacts", "[oops"),
        ),
        // Empty success body contributes nothing.
        OperationRequest::new(
            Operation::ContactDelete,
            Fields::new().with("contactId", CONTACT_ID),
        ),
        OperationRequest::new(Operation::ContactGetTags, Fields::new()),
    ];

    let items = client
        .execute_all(requests, FailureMode::ContinueOnFail)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], json!({ "tags": ["vip"] }));
    assert!(items[1]["error"]
        .as_str()
        .unwrap()
        .starts_with("Field 'bulkContacts' does not contain valid JSON"));
    assert_eq!(items[2], json!({ "tags": ["vip"] }));
}

#[tokio::test]
async fn test_batch_abort_stops_at_first_error() {
    let mock_server = MockServer::start().await;
    let client = client(&mock_server);

    Mock::given(method("GET"))
        .and(path("/contacts/v1/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fields": [] })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let requests = vec![
        OperationRequest::new(Operation::ContactGet, Fields::new().with("contactId", "")),
        OperationRequest::new(Operation::ContactGetFields, Fields::new()),
    ];

    let err = client
        .execute_all(requests, FailureMode::Abort)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing required parameter 'contactId'");
}
