//! Resources, operations and their routes.
//!
//! Resources and operations form a closed set. Each operation carries its
//! metadata (display name and description for a host UI), its route (HTTP
//! method and path template) and the declarative [`Rule`]s that place field
//! values into the request.

use std::{fmt, str::FromStr};

use reqwest::Method;
use serde::Serialize;

use crate::{
    error::Error,
    fields::Fields,
    rules::{field, option, spread_body, spread_query, Presence::Defined, Rule},
};

/// A top-level entity type exposed by the Whaapy API.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Message,
    Media,
    Conversation,
    Agent,
    Template,
    Contact,
    Funnel,
}

impl Resource {
    pub const ALL: &'static [Resource] = &[
        Resource::Message,
        Resource::Media,
        Resource::Conversation,
        Resource::Agent,
        Resource::Template,
        Resource::Contact,
        Resource::Funnel,
    ];

    /// The identifier used by the host (`"message"`, `"contact"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Message => "message",
            Resource::Media => "media",
            Resource::Conversation => "conversation",
            Resource::Agent => "agent",
            Resource::Template => "template",
            Resource::Contact => "contact",
            Resource::Funnel => "funnel",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Resource::Message => "Message",
            Resource::Media => "Media",
            Resource::Conversation => "Conversation",
            Resource::Agent => "Agent",
            Resource::Template => "Template",
            Resource::Contact => "Contact",
            Resource::Funnel => "Funnel",
        }
    }

    /// Operations available on this resource, in display order.
    pub fn operations(self) -> impl Iterator<Item = Operation> {
        Operation::ALL
            .iter()
            .copied()
            .filter(move |op| op.resource() == self)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .copied()
            .find(|resource| resource.as_str() == s)
            .ok_or_else(|| Error::validation(format!("The resource \"{s}\" is not known")))
    }
}

/// HTTP method and path template of an operation.
///
/// Placeholders are written `{fieldName}` and filled from the field of the
/// same name.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
}

impl Route {
    fn new(method: Method, path: &'static str) -> Self {
        Self { method, path }
    }

    /// Names of the path placeholders, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> {
        let path = self.path;
        path.split('{')
            .skip(1)
            .filter_map(|rest| rest.split_once('}').map(|(name, _)| name))
    }

    /// Substitutes path placeholders with percent-encoded field values.
    ///
    /// An absent or empty placeholder value is a validation error.
    pub fn render(&self, fields: &Fields) -> Result<String, Error> {
        let mut rendered = String::with_capacity(self.path.len() + 32);
        let mut rest = self.path;
        while let Some((head, tail)) = rest.split_once('{') {
            let (name, tail) = tail
                .split_once('}')
                .ok_or_else(|| Error::internal(format!("Unclosed placeholder in {}", self.path).into()))?;
            let value = fields
                .text(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::missing(name))?;
            rendered.push_str(head);
            rendered.push_str(&urlencoding::encode(&value));
            rest = tail;
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

macro_rules! route {
    () => {
        None
    };
    ($method:ident $path:literal) => {
        Some(Route::new(Method::$method, $path))
    };
}

macro_rules! operations {
    ($(
        $variant:ident: $resource:ident $name:literal, $display:literal, $description:literal
            => $($method:ident $path:literal)?;
    )*) => {
        /// An action performable on a [`Resource`].
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Operation {
            $($variant,)*
        }

        impl Operation {
            /// Every operation, grouped by resource.
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)*];

            pub fn resource(&self) -> Resource {
                match self {
                    $(Operation::$variant => Resource::$resource,)*
                }
            }

            /// The identifier used by the host (`"send"`, `"getByPhone"`, ...).
            pub fn name(&self) -> &'static str {
                match self {
                    $(Operation::$variant => $name,)*
                }
            }

            pub fn display_name(&self) -> &'static str {
                match self {
                    $(Operation::$variant => $display,)*
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(Operation::$variant => $description,)*
                }
            }

            /// The operation's route. `None` for operations this client cannot
            /// perform.
            pub fn route(&self) -> Option<Route> {
                match self {
                    $(Operation::$variant => route!($($method $path)?),)*
                }
            }
        }
    };
}

operations! {
    MessageSend: Message "send", "Send", "Send a WhatsApp message"
        => POST "/messages/v1";
    MessageRetry: Message "retry", "Retry", "Retry sending a failed message"
        => POST "/messages/v1/{messageId}/retry";

    MediaUpload: Media "upload", "Upload", "Upload media to WhatsApp CDN"
        => ;

    ConversationList: Conversation "list", "List", "Get all conversations"
        => GET "/conversations/v1";
    ConversationGet: Conversation "get", "Get", "Get a specific conversation"
        => GET "/conversations/v1/{conversationId}";
    ConversationGetByPhone: Conversation "getByPhone", "Get by Phone", "Find conversation by phone number"
        => GET "/conversations/v1/by-phone/{phoneNumber}";
    ConversationGetMessages: Conversation "getMessages", "Get Messages", "Get message history of a conversation"
        => GET "/conversations/v1/{conversationId}/messages";
    ConversationClose: Conversation "close", "Close", "Close a conversation"
        => POST "/conversations/v1/{conversationId}/close";
    ConversationArchive: Conversation "archive", "Archive", "Archive a conversation"
        => POST "/conversations/v1/{conversationId}/archive";
    ConversationMarkRead: Conversation "markRead", "Mark Read", "Mark a conversation as read"
        => PATCH "/conversations/v1/{conversationId}/mark-read";
    ConversationSetAi: Conversation "setAi", "Set AI", "Enable or disable AI for a conversation"
        => PATCH "/conversations/v1/{conversationId}/ai";
    ConversationPauseAi: Conversation "pauseAi", "Pause AI", "Pause AI for a conversation"
        => POST "/conversations/v1/{conversationId}/ai/pause";
    ConversationAiSuggest: Conversation "aiSuggest", "AI Suggest", "Get an AI suggestion without sending"
        => POST "/conversations/v1/{conversationId}/ai-suggest";

    AgentToggle: Agent "toggle", "Toggle", "Enable or disable AI globally"
        => POST "/agent/v1/toggle";
    AgentPause: Agent "pause", "Pause", "Pause AI globally for X minutes"
        => POST "/agent/v1/pause";

    TemplateList: Template "list", "List", "Get all WhatsApp templates"
        => GET "/templates/v1";
    TemplateGet: Template "get", "Get", "Get a specific template"
        => GET "/templates/v1/{templateId}";
    TemplateGetVariables: Template "getVariables", "Get Variables", "Get available template variables"
        => GET "/templates/v1/variables";
    TemplateSync: Template "sync", "Sync", "Sync templates from Meta"
        => POST "/templates/v1/sync";

    ContactList: Contact "list", "List", "Get all contacts"
        => GET "/contacts/v1";
    ContactGet: Contact "get", "Get", "Get a specific contact"
        => GET "/contacts/v1/{contactId}";
    ContactCreate: Contact "create", "Create", "Create a new contact"
        => POST "/contacts/v1";
    ContactUpdate: Contact "update", "Update", "Update an existing contact"
        => PATCH "/contacts/v1/{contactId}";
    ContactDelete: Contact "delete", "Delete", "Delete a contact"
        => DELETE "/contacts/v1/{contactId}";
    ContactSearch: Contact "search", "Search", "Advanced search for contacts"
        => POST "/contacts/v1/search";
    ContactBulk: Contact "bulk", "Bulk", "Perform bulk operations on contacts"
        => POST "/contacts/v1/bulk";
    ContactMerge: Contact "merge", "Merge", "Merge two contacts"
        => POST "/contacts/v1/{contactId}/merge";
    ContactGetTags: Contact "getTags", "Get Tags", "Get all available tags"
        => GET "/contacts/v1/tags";
    ContactGetFields: Contact "getFields", "Get Fields", "Get available custom fields"
        => GET "/contacts/v1/fields";

    FunnelListStages: Funnel "listStages", "List Stages", "Get all funnel stages"
        => GET "/funnel/v1/stages";
    FunnelGetStage: Funnel "getStage", "Get Stage", "Get a specific funnel stage"
        => GET "/funnel/v1/stages/{stageId}";
    FunnelCreateStage: Funnel "createStage", "Create Stage", "Create a new funnel stage"
        => POST "/funnel/v1/stages";
    FunnelUpdateStage: Funnel "updateStage", "Update Stage", "Update an existing funnel stage"
        => PATCH "/funnel/v1/stages/{stageId}";
    FunnelDeleteStage: Funnel "deleteStage", "Delete Stage", "Delete a funnel stage"
        => DELETE "/funnel/v1/stages/{stageId}";
    FunnelReorderStages: Funnel "reorderStages", "Reorder Stages", "Reorder the funnel stages"
        => PATCH "/funnel/v1/stages/reorder";
    FunnelMoveContact: Funnel "moveContact", "Move Contact", "Move a contact to a funnel stage"
        => POST "/funnel/v1/contacts/{contactIdFunnel}/move";
}

const CONTACT_LIST_RENAMES: &[(&str, &str)] = &[
    ("sortBy", "sort_by"),
    ("sortOrder", "sort_order"),
    ("funnelStageId", "funnel_stage_id"),
];

const CONTACT_UPDATE_RENAMES: &[(&str, &str)] = &[
    ("phoneNumber", "phone_number"),
    ("funnelStageId", "funnel_stage_id"),
    ("customFields", "custom_fields"),
];

const MESSAGE_SEND: &[Rule] = &[
    field("to").rule(),
    field("messageType").to_body("type").rule(),
    option("additionalFields", "pauseAi").to_body("ai.pause").rule(),
    option("additionalFields", "pauseDuration")
        .to_body("ai.pauseDuration")
        .rule(),
    option("additionalFields", "disableAi").to_body("ai.disable").rule(),
    option("additionalFields", "replyTo")
        .to_body("context.message_id")
        .rule(),
    option("additionalFields", "createConversation")
        .when(Defined)
        .rule(),
    option("additionalFields", "metadata").json().rule(),
];

const CONVERSATION_LIST: &[Rule] = &[
    option("conversationFilters", "search").to_query("search").rule(),
    option("conversationFilters", "status")
        .to_query("status")
        .except("all")
        .rule(),
    option("conversationFilters", "limit").to_query("limit").rule(),
    option("conversationFilters", "offset").to_query("offset").rule(),
];

const CONVERSATION_GET_MESSAGES: &[Rule] = &[
    option("messagesOptions", "limit").to_query("limit").rule(),
    option("messagesOptions", "cursor").to_query("cursor").rule(),
];

const CONVERSATION_SET_AI: &[Rule] = &[field("aiEnabled").rule()];

const CONVERSATION_PAUSE_AI: &[Rule] = &[field("pauseDurationConv").to_body("duration").rule()];

const AGENT_TOGGLE: &[Rule] = &[field("agentEnabled").to_body("enabled").rule()];

const AGENT_PAUSE: &[Rule] = &[field("agentPauseDuration").to_body("duration").rule()];

const TEMPLATE_LIST: &[Rule] = &[
    option("templateFilters", "status").to_query("status").rule(),
    option("templateFilters", "limit").to_query("limit").rule(),
    option("templateFilters", "offset").to_query("offset").rule(),
];

const CONTACT_LIST: &[Rule] = &[spread_query("contactFilters")
    .renames(CONTACT_LIST_RENAMES)
    .rule()];

const CONTACT_CREATE: &[Rule] = &[
    field("contactName").to_body("name").rule(),
    field("contactPhone").to_body("phoneNumber").rule(),
    option("contactAdditional", "email").rule(),
    option("contactAdditional", "tags").rule(),
    option("contactAdditional", "customFields").json().rule(),
    option("contactAdditional", "metadata").json().rule(),
];

const CONTACT_UPDATE: &[Rule] = &[spread_body("contactUpdateFields")
    .renames(CONTACT_UPDATE_RENAMES)
    .json(&["customFields"])
    .rule()];

const CONTACT_SEARCH: &[Rule] = &[
    field("searchQuery").to_body("query").rule(),
    option("searchOptions", "filters").json().rule(),
    option("searchOptions", "limit").rule(),
    option("searchOptions", "cursor").rule(),
];

const CONTACT_BULK: &[Rule] = &[
    field("bulkOperation").to_body("operation").rule(),
    field("bulkContacts").to_body("contacts").json().rule(),
    field("bulkData").to_body("data").json().or_default("{}").rule(),
];

const CONTACT_MERGE: &[Rule] = &[field("mergeWithId").to_body("mergeWith").rule()];

const FUNNEL_LIST_STAGES: &[Rule] = &[
    option("stageListOptions", "limit").to_query("limit").rule(),
    option("stageListOptions", "offset").to_query("offset").rule(),
];

const FUNNEL_CREATE_STAGE: &[Rule] = &[
    field("stageName").to_body("name").rule(),
    option("stageOptions", "position").when(Defined).rule(),
    option("stageOptions", "color").rule(),
    option("stageOptions", "description").rule(),
];

const FUNNEL_UPDATE_STAGE: &[Rule] = &[spread_body("stageUpdateFields").rule()];

const FUNNEL_REORDER_STAGES: &[Rule] = &[field("stagesOrder").to_body("stages").json().rule()];

const FUNNEL_MOVE_CONTACT: &[Rule] = &[field("targetStageId").to_body("stage_id").rule()];

impl Operation {
    /// Resolves the host's string identifiers.
    ///
    /// # Example
    /// ```rust
    /// use whaapy_rs::Operation;
    ///
    /// let op = Operation::parse("contact", "getTags").unwrap();
    /// assert_eq!(op, Operation::ContactGetTags);
    /// assert!(Operation::parse("contact", "teleport").is_err());
    /// ```
    pub fn parse(resource: &str, operation: &str) -> Result<Operation, Error> {
        let resource: Resource = resource.parse()?;
        resource
            .operations()
            .find(|op| op.name() == operation)
            .ok_or_else(|| {
                Error::validation(format!(
                    "The operation \"{operation}\" is not known for resource \"{resource}\""
                ))
            })
    }

    /// Field placement rules. Message sending adds per-type content on top of
    /// these (see [`crate::message`]).
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            Operation::MessageSend => MESSAGE_SEND,
            Operation::ConversationList => CONVERSATION_LIST,
            Operation::ConversationGetMessages => CONVERSATION_GET_MESSAGES,
            Operation::ConversationSetAi => CONVERSATION_SET_AI,
            Operation::ConversationPauseAi => CONVERSATION_PAUSE_AI,
            Operation::AgentToggle => AGENT_TOGGLE,
            Operation::AgentPause => AGENT_PAUSE,
            Operation::TemplateList => TEMPLATE_LIST,
            Operation::ContactList => CONTACT_LIST,
            Operation::ContactCreate => CONTACT_CREATE,
            Operation::ContactUpdate => CONTACT_UPDATE,
            Operation::ContactSearch => CONTACT_SEARCH,
            Operation::ContactBulk => CONTACT_BULK,
            Operation::ContactMerge => CONTACT_MERGE,
            Operation::FunnelListStages => FUNNEL_LIST_STAGES,
            Operation::FunnelCreateStage => FUNNEL_CREATE_STAGE,
            Operation::FunnelUpdateStage => FUNNEL_UPDATE_STAGE,
            Operation::FunnelReorderStages => FUNNEL_REORDER_STAGES,
            Operation::FunnelMoveContact => FUNNEL_MOVE_CONTACT,
            _ => &[],
        }
    }

    /// Whether the request carries a JSON body.
    pub fn has_body(&self) -> bool {
        self.rules().iter().any(Rule::targets_body)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource(), self.name())
    }
}

/// Host-facing description of one operation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub resource: Resource,
    pub operation: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'static str>,
}

impl From<Operation> for OperationDescriptor {
    fn from(op: Operation) -> Self {
        let route = op.route();
        Self {
            resource: op.resource(),
            operation: op.name(),
            name: op.display_name(),
            description: op.description(),
            method: route.as_ref().map(|route| route.method.to_string()),
            path: route.map(|route| route.path),
        }
    }
}

/// Describes every operation for a host UI.
pub fn catalog() -> Vec<OperationDescriptor> {
    Operation::ALL.iter().copied().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_operation_round_trips_through_its_names() {
        for op in Operation::ALL {
            let parsed = Operation::parse(op.resource().as_str(), op.name()).unwrap();
            assert_eq!(parsed, *op);
        }
    }

    #[test]
    fn operations_outlive_the_resource() {
        let ops: Vec<_> = "agent".parse::<Resource>().unwrap().operations().collect();
        assert_eq!(ops, vec![Operation::AgentToggle, Operation::AgentPause]);
    }

    #[test]
    fn same_name_resolves_per_resource() {
        assert_eq!(Operation::parse("template", "get").unwrap(), Operation::TemplateGet);
        assert_eq!(Operation::parse("contact", "get").unwrap(), Operation::ContactGet);
        assert!(Operation::parse("agent", "get").is_err());
        assert!(Operation::parse("invoice", "get").is_err());
    }

    #[test]
    fn only_media_upload_lacks_a_route() {
        let missing: Vec<_> = Operation::ALL
            .iter()
            .filter(|op| op.route().is_none())
            .collect();
        assert_eq!(missing, vec![&Operation::MediaUpload]);
    }

    #[test]
    fn placeholders_are_listed() {
        let route = Operation::FunnelMoveContact.route().unwrap();
        assert_eq!(route.placeholders().collect::<Vec<_>>(), vec!["contactIdFunnel"]);
        assert_eq!(Operation::ContactGetTags.route().unwrap().placeholders().count(), 0);
    }

    #[test]
    fn render_encodes_values() {
        let route = Operation::ConversationGetByPhone.route().unwrap();
        let fields = Fields::new().with("phoneNumber", "+52 155");
        assert_eq!(
            route.render(&fields).unwrap(),
            "/conversations/v1/by-phone/%2B52%20155"
        );
    }

    #[test]
    fn render_requires_placeholders() {
        let route = Operation::ContactMerge.route().unwrap();
        let err = route.render(&Fields::new().with("contactId", "")).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter 'contactId'");
    }

    #[test]
    fn body_presence_follows_rules() {
        assert!(Operation::MessageSend.has_body());
        assert!(Operation::ContactUpdate.has_body());
        assert!(!Operation::ContactList.has_body());
        assert!(!Operation::ConversationClose.has_body());
    }

    #[test]
    fn catalog_describes_routes() {
        let catalog = catalog();
        assert_eq!(catalog.len(), Operation::ALL.len());
        let reorder = catalog
            .iter()
            .find(|d| d.operation == "reorderStages")
            .unwrap();
        assert_eq!(
            serde_json::to_value(reorder).unwrap(),
            json!({
                "resource": "funnel",
                "operation": "reorderStages",
                "name": "Reorder Stages",
                "description": "Reorder the funnel stages",
                "method": "PATCH",
                "path": "/funnel/v1/stages/reorder"
            })
        );
    }
}
