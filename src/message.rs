//! Message sending.
//!
//! A send-message body always starts with `to` and `type`. The rest depends
//! on the [`MessageType`]: most types are plain field placements expressed
//! as [`Rule`] tables, while templates (language selection) and interactive
//! messages (see [`crate::interactive`]) need a little code.

use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{
    error::Error,
    fields::{is_truthy, Fields},
    interactive::InteractiveInput,
    rules::{field, option, set_path, Placement, Presence::Truthy, Rule},
};

/// Sentinel selected in the language dropdown when the user types a code.
pub const CUSTOM_LANGUAGE: &str = "__custom__";

/// The kind of WhatsApp message to send.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Template,
    Interactive,
    Location,
    Contacts,
    Reaction,
}

impl MessageType {
    pub const ALL: &'static [MessageType] = &[
        MessageType::Text,
        MessageType::Image,
        MessageType::Video,
        MessageType::Audio,
        MessageType::Document,
        MessageType::Sticker,
        MessageType::Template,
        MessageType::Interactive,
        MessageType::Location,
        MessageType::Contacts,
        MessageType::Reaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::Document => "document",
            MessageType::Sticker => "sticker",
            MessageType::Template => "template",
            MessageType::Interactive => "interactive",
            MessageType::Location => "location",
            MessageType::Contacts => "contacts",
            MessageType::Reaction => "reaction",
        }
    }

    fn content_rules(&self) -> &'static [Rule] {
        match self {
            MessageType::Text => TEXT,
            MessageType::Image => IMAGE,
            MessageType::Video => VIDEO,
            MessageType::Audio => AUDIO,
            MessageType::Document => DOCUMENT,
            MessageType::Sticker => STICKER,
            MessageType::Template => TEMPLATE,
            MessageType::Location => LOCATION,
            MessageType::Contacts => CONTACTS,
            MessageType::Reaction => REACTION,
            MessageType::Interactive => &[],
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::validation(format!("The message type \"{s}\" is not supported")))
    }
}

const TEXT: &[Rule] = &[field("textContent").to_body("content").rule()];

macro_rules! media_rules {
    ($($name:ident => $kind:literal $(, $caption:literal)?;)*) => {
        $(
            const $name: &[Rule] = &[
                field("mediaUrl").to_body(concat!($kind, ".link")).rule(),
                $(field("caption").to_body($caption).when(Truthy).rule(),)?
            ];
        )*
    };
}

media_rules! {
    IMAGE => "image", "image.caption";
    VIDEO => "video", "video.caption";
    AUDIO => "audio";
    DOCUMENT => "document", "document.caption";
    STICKER => "sticker";
}

const TEMPLATE: &[Rule] = &[
    field("templateName").rule(),
    option("templateOptions", "parameters")
        .to_body("template_parameters")
        .comma_list()
        .rule(),
];

const LOCATION: &[Rule] = &[
    field("latitude").to_body("location.latitude").rule(),
    field("longitude").to_body("location.longitude").rule(),
    field("locationName").to_body("location.name").when(Truthy).rule(),
    field("locationAddress")
        .to_body("location.address")
        .when(Truthy)
        .rule(),
];

const CONTACTS: &[Rule] = &[field("contactsData").to_body("contacts").json().rule()];

const REACTION: &[Rule] = &[
    field("reactionMessageId")
        .to_body("reaction.message_id")
        .rule(),
    field("reactionEmoji").to_body("reaction.emoji").rule(),
];

/// Builds the body of a send-message request.
///
/// `common` are the rules shared by every message type (recipient, type and
/// the `additionalFields` collection).
pub(crate) fn send_body(common: &[Rule], fields: &Fields) -> Result<Map<String, Value>, Error> {
    let kind: MessageType = fields.required_text("messageType")?.parse()?;

    let mut placement = Placement::default();
    placement.apply(common, fields)?;
    placement.apply(kind.content_rules(), fields)?;
    let mut body = placement.body;

    match kind {
        MessageType::Template => {
            set_path(&mut body, "language", Value::String(template_language(fields)?));
            if let Some(header) = template_header_media(fields) {
                set_path(&mut body, "header_media", header);
            }
        }
        MessageType::Interactive => {
            let payload = InteractiveInput::from_fields(fields)?.build()?;
            let payload = serde_json::to_value(payload).map_err(|err| Error::internal(err.into()))?;
            set_path(&mut body, "interactive", payload);
        }
        _ => {}
    }

    Ok(body)
}

/// Resolves the template language, honoring the custom-code escape hatch.
fn template_language(fields: &Fields) -> Result<String, Error> {
    let selected = fields.text("templateLanguage").unwrap_or_default();
    let language = if selected == CUSTOM_LANGUAGE {
        fields
            .text("templateLanguageCustom")
            .unwrap_or_default()
            .trim()
            .to_owned()
    } else {
        selected.into_owned()
    };

    if language.is_empty() {
        return Err(Error::validation(
            "Template language is required. Select a language or enter a custom language code.",
        ));
    }
    Ok(language)
}

fn template_header_media(fields: &Fields) -> Option<Value> {
    let options = fields.collection("templateOptions");
    let kind = options.get("headerMediaType").filter(|v| is_truthy(v))?;
    let url = options.get("headerMediaUrl").filter(|v| is_truthy(v))?;
    Some(json!({ "type": kind, "url": url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMON: &[Rule] = &[field("to").rule(), field("messageType").to_body("type").rule()];

    fn body(fields: Fields) -> Result<Value, Error> {
        send_body(COMMON, &fields).map(Value::Object)
    }

    fn message(kind: &str) -> Fields {
        Fields::new().with("to", "+5215512345678").with("messageType", kind)
    }

    #[test]
    fn text_message() {
        let fields = message("text").with("textContent", "Hola 👋");
        assert_eq!(
            body(fields).unwrap(),
            json!({ "to": "+5215512345678", "type": "text", "content": "Hola 👋" })
        );
    }

    #[test]
    fn captions_only_on_captionable_media() {
        let image = message("image")
            .with("mediaUrl", "https://cdn.example.com/a.jpg")
            .with("caption", "Menú");
        assert_eq!(
            body(image).unwrap()["image"],
            json!({ "link": "https://cdn.example.com/a.jpg", "caption": "Menú" })
        );

        let audio = message("audio")
            .with("mediaUrl", "https://cdn.example.com/a.ogg")
            .with("caption", "ignored");
        assert_eq!(
            body(audio).unwrap()["audio"],
            json!({ "link": "https://cdn.example.com/a.ogg" })
        );

        let empty_caption = message("document")
            .with("mediaUrl", "https://cdn.example.com/a.pdf")
            .with("caption", "");
        assert!(body(empty_caption).unwrap()["document"].get("caption").is_none());
    }

    #[test]
    fn template_with_custom_language_and_parameters() {
        let fields = message("template")
            .with("templateName", "order_update")
            .with("templateLanguage", CUSTOM_LANGUAGE)
            .with("templateLanguageCustom", "  pt_BR ")
            .with(
                "templateOptions",
                json!({
                    "parameters": "Ana, #123 , mañana",
                    "headerMediaType": "image",
                    "headerMediaUrl": "https://cdn.example.com/h.png"
                }),
            );
        assert_eq!(
            body(fields).unwrap(),
            json!({
                "to": "+5215512345678",
                "type": "template",
                "templateName": "order_update",
                "language": "pt_BR",
                "template_parameters": ["Ana", "#123", "mañana"],
                "header_media": { "type": "image", "url": "https://cdn.example.com/h.png" }
            })
        );
    }

    #[test]
    fn template_header_media_needs_both_parts() {
        let fields = message("template")
            .with("templateName", "promo")
            .with("templateLanguage", "es_MX")
            .with("templateOptions", json!({ "headerMediaType": "image" }));
        assert!(body(fields).unwrap().get("header_media").is_none());
    }

    #[test]
    fn template_language_is_required() {
        let fields = message("template")
            .with("templateName", "promo")
            .with("templateLanguage", CUSTOM_LANGUAGE)
            .with("templateLanguageCustom", "   ");
        let err = body(fields).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Template language is required. Select a language or enter a custom language code."
        );
    }

    #[test]
    fn location_omits_empty_labels() {
        let fields = message("location")
            .with("latitude", 19.4326)
            .with("longitude", -99.1332)
            .with("locationName", "Zócalo")
            .with("locationAddress", "");
        assert_eq!(
            body(fields).unwrap()["location"],
            json!({ "latitude": 19.4326, "longitude": -99.1332, "name": "Zócalo" })
        );
    }

    #[test]
    fn contacts_and_reactions() {
        let contacts = message("contacts").with("contactsData", r#"[{"name":{"formatted_name":"Ana"}}]"#);
        assert_eq!(
            body(contacts).unwrap()["contacts"],
            json!([{ "name": { "formatted_name": "Ana" } }])
        );

        let bad = message("contacts").with("contactsData", "[{");
        assert!(matches!(body(bad), Err(Error::InvalidJson { ref field, .. }) if field == "contactsData"));

        let reaction = message("reaction")
            .with("reactionMessageId", "wamid.abc")
            .with("reactionEmoji", "👍");
        assert_eq!(
            body(reaction).unwrap()["reaction"],
            json!({ "message_id": "wamid.abc", "emoji": "👍" })
        );
    }

    #[test]
    fn interactive_is_delegated() {
        let fields = message("interactive")
            .with("interactiveType", "cta_url")
            .with("interactiveBodyText", "Reserva aquí")
            .with("ctaButtonText", "Reservar")
            .with("ctaButtonUrl", "https://example.com/book");
        assert_eq!(
            body(fields).unwrap()["interactive"],
            json!({
                "type": "cta_url",
                "body": { "text": "Reserva aquí" },
                "action": {
                    "name": "cta_url",
                    "parameters": { "display_text": "Reservar", "url": "https://example.com/book" }
                }
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(body(message("fax")), Err(Error::Validation(_))));
    }
}
