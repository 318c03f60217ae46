//! Interactive message payloads.
//!
//! Interactive messages carry tappable UI: up to three reply buttons, a list
//! menu of sections and rows, or a single call-to-action URL button. This
//! module turns the flat form input of the host into the nested structure
//! the messaging API expects.
//!
//! Titles that exceed the API's limits are silently truncated, and buttons
//! or rows without an explicit ID get one derived from their title with
//! [`slugify`], so the click IDs reported by webhooks are predictable.
//!
//! # Example
//! ```rust
//! use whaapy_rs::interactive::{InteractiveInput, InteractiveType, ButtonInput};
//! use serde_json::json;
//!
//! let input = InteractiveInput {
//!     buttons: vec![ButtonInput::new("Ver Menú"), ButtonInput::new("Hablar con alguien")],
//!     ..InteractiveInput::new(InteractiveType::Button, "¿Qué te gustaría hacer?")
//! };
//!
//! let payload = input.build().unwrap();
//! assert_eq!(
//!     serde_json::to_value(&payload).unwrap()["action"]["buttons"][1]["reply"],
//!     json!({ "id": "hablar_con_alguien", "title": "Hablar con alguien" })
//! );
//! ```

use std::{convert::Infallible, fmt, str::FromStr};

use serde::Serialize;

use crate::{error::Error, fields::Fields};

/// Maximum length of a reply button title.
pub const BUTTON_TITLE_MAX: usize = 20;
/// Maximum length of a list row title.
pub const ROW_TITLE_MAX: usize = 24;
/// Maximum length of a list row description.
pub const ROW_DESCRIPTION_MAX: usize = 72;
/// Maximum length of the CTA button text.
pub const CTA_TEXT_MAX: usize = 20;
/// Maximum length of a generated ID.
pub const ID_MAX: usize = 256;

pub const MAX_BUTTONS: usize = 3;
pub const MAX_SECTIONS: usize = 10;
pub const MAX_ROWS: usize = 10;

/// Label of the list menu button when none is given.
pub const DEFAULT_LIST_BUTTON: &str = "Ver Opciones";

/// The kind of interactive message.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum InteractiveType {
    #[serde(rename = "button")]
    Button,
    #[serde(rename = "list")]
    List,
    #[serde(rename = "cta_url")]
    CtaUrl,
}

impl InteractiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractiveType::Button => "button",
            InteractiveType::List => "list",
            InteractiveType::CtaUrl => "cta_url",
        }
    }
}

impl fmt::Display for InteractiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractiveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "button" => Ok(InteractiveType::Button),
            "list" => Ok(InteractiveType::List),
            "cta_url" => Ok(InteractiveType::CtaUrl),
            other => Err(Error::validation(format!(
                "Unknown interactive type \"{other}\". Expected button, list or cta_url"
            ))),
        }
    }
}

/// The header variant selected in the form.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum HeaderType {
    #[default]
    None,
    Text,
    Image,
    Video,
    Document,
}

/// Unknown values mean no header.
impl FromStr for HeaderType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "text" => HeaderType::Text,
            "image" => HeaderType::Image,
            "video" => HeaderType::Video,
            "document" => HeaderType::Document,
            "" | "none" => HeaderType::None,
            other => {
                tracing::debug!(header_type = other, "ignoring unknown interactive header type");
                HeaderType::None
            }
        })
    }
}

/// A reply button as entered by the user.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ButtonInput {
    pub title: String,
    pub id: Option<String>,
}

impl ButtonInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A list row as entered by the user.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct RowInput {
    pub title: String,
    pub description: Option<String>,
    pub id: Option<String>,
}

impl RowInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A list section as entered by the user.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SectionInput {
    pub title: Option<String>,
    pub rows: Vec<RowInput>,
}

/// Structured form input for an interactive message.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InteractiveInput {
    pub kind: InteractiveType,
    pub body_text: String,
    pub header_type: HeaderType,
    pub header_text: Option<String>,
    pub header_media_url: Option<String>,
    pub footer_text: Option<String>,
    pub buttons: Vec<ButtonInput>,
    pub list_button_text: Option<String>,
    pub sections: Vec<SectionInput>,
    pub cta_button_text: Option<String>,
    pub cta_button_url: Option<String>,
}

impl InteractiveInput {
    pub fn new(kind: InteractiveType, body_text: impl Into<String>) -> Self {
        Self {
            kind,
            body_text: body_text.into(),
            header_type: HeaderType::None,
            header_text: None,
            header_media_url: None,
            footer_text: None,
            buttons: Vec::new(),
            list_button_text: None,
            sections: Vec::new(),
            cta_button_text: None,
            cta_button_url: None,
        }
    }

    /// Reads the interactive form fields of a send-message invocation.
    ///
    /// Only the fields that belong to the selected type are read; the rest of
    /// the form is ignored.
    pub fn from_fields(fields: &Fields) -> Result<Self, Error> {
        let kind: InteractiveType = fields.required_text("interactiveType")?.parse()?;
        let body_text = fields
            .text("interactiveBodyText")
            .map(|text| text.into_owned())
            .unwrap_or_default();

        let mut input = InteractiveInput::new(kind, body_text);
        input.header_type = fields
            .str("interactiveHeaderType")
            .unwrap_or_default()
            .parse::<HeaderType>()
            .unwrap_or_default();
        input.header_text = owned(fields.str("interactiveHeaderText"));
        input.header_media_url = owned(fields.str("interactiveHeaderMediaUrl"));
        input.footer_text = owned(fields.str("interactiveFooterText"));

        match kind {
            InteractiveType::Button => {
                input.buttons = fields
                    .group("interactiveButtons", "buttonValues")
                    .iter()
                    .map(|button| ButtonInput {
                        title: title_of(button),
                        id: owned(button.str("id")),
                    })
                    .collect();
            }
            InteractiveType::List => {
                input.list_button_text = owned(fields.str("interactiveListButtonText"));
                input.sections = fields
                    .group("interactiveSections", "sectionValues")
                    .iter()
                    .map(|section| SectionInput {
                        title: owned(section.str("title")),
                        rows: section
                            .group("rows", "rowValues")
                            .iter()
                            .map(|row| RowInput {
                                title: title_of(row),
                                description: owned(row.str("description")),
                                id: owned(row.str("id")),
                            })
                            .collect(),
                    })
                    .collect();
            }
            InteractiveType::CtaUrl => {
                input.cta_button_text = owned(fields.str("ctaButtonText"));
                input.cta_button_url = owned(fields.str("ctaButtonUrl"));
            }
        }

        Ok(input)
    }

    /// Builds the API payload.
    ///
    /// When the selected type has no usable data (no buttons, no sections,
    /// or a CTA without text or URL) the `action` is omitted rather than
    /// rejected; the API decides what to do with such a message.
    pub fn build(&self) -> Result<InteractivePayload, Error> {
        if self.body_text.trim().is_empty() {
            return Err(Error::validation(
                "Interactive messages require a non-empty body text",
            ));
        }

        Ok(InteractivePayload {
            kind: self.kind,
            body: Text {
                text: self.body_text.clone(),
            },
            header: self.header(),
            footer: non_empty(self.footer_text.as_deref().map(str::trim)).map(|text| Text {
                text: text.to_owned(),
            }),
            action: self.action(),
        })
    }

    fn header(&self) -> Option<InteractiveHeader> {
        let link = || {
            non_empty(self.header_media_url.as_deref()).map(|link| MediaLink {
                link: link.to_owned(),
            })
        };
        match self.header_type {
            HeaderType::None => None,
            HeaderType::Text => non_empty(self.header_text.as_deref()).map(|text| {
                InteractiveHeader::Text {
                    text: text.to_owned(),
                }
            }),
            HeaderType::Image => link().map(|image| InteractiveHeader::Image { image }),
            HeaderType::Video => link().map(|video| InteractiveHeader::Video { video }),
            HeaderType::Document => link().map(|document| InteractiveHeader::Document { document }),
        }
    }

    fn action(&self) -> Option<InteractiveAction> {
        match self.kind {
            InteractiveType::Button if !self.buttons.is_empty() => {
                warn_capped("buttons", self.buttons.len(), MAX_BUTTONS);
                Some(InteractiveAction::Buttons {
                    buttons: self
                        .buttons
                        .iter()
                        .take(MAX_BUTTONS)
                        .map(|button| ReplyButton {
                            kind: "reply",
                            reply: Reply {
                                id: id_or_slug(button.id.as_deref(), &button.title),
                                title: truncate(&button.title, BUTTON_TITLE_MAX),
                            },
                        })
                        .collect(),
                })
            }
            InteractiveType::List if !self.sections.is_empty() => {
                warn_capped("sections", self.sections.len(), MAX_SECTIONS);
                Some(InteractiveAction::List {
                    button: non_empty(self.list_button_text.as_deref())
                        .unwrap_or(DEFAULT_LIST_BUTTON)
                        .to_owned(),
                    sections: self
                        .sections
                        .iter()
                        .take(MAX_SECTIONS)
                        .map(|section| {
                            warn_capped("rows", section.rows.len(), MAX_ROWS);
                            Section {
                                title: non_empty(section.title.as_deref()).map(str::to_owned),
                                rows: section
                                    .rows
                                    .iter()
                                    .take(MAX_ROWS)
                                    .map(|row| Row {
                                        id: id_or_slug(row.id.as_deref(), &row.title),
                                        title: truncate(&row.title, ROW_TITLE_MAX),
                                        description: non_empty(row.description.as_deref())
                                            .map(|d| truncate(d, ROW_DESCRIPTION_MAX)),
                                    })
                                    .collect(),
                            }
                        })
                        .collect(),
                })
            }
            InteractiveType::CtaUrl => {
                let text = non_empty(self.cta_button_text.as_deref())?;
                let url = non_empty(self.cta_button_url.as_deref())?;
                Some(InteractiveAction::CtaUrl {
                    name: "cta_url",
                    parameters: CtaParameters {
                        display_text: truncate(text, CTA_TEXT_MAX),
                        url: url.to_owned(),
                    },
                })
            }
            _ => None,
        }
    }
}

/// The `interactive` object of a send-message request.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct InteractivePayload {
    #[serde(rename = "type")]
    pub kind: InteractiveType,
    pub body: Text,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<InteractiveHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Text>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<InteractiveAction>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Text {
    pub text: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct MediaLink {
    pub link: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InteractiveHeader {
    Text { text: String },
    Image { image: MediaLink },
    Video { video: MediaLink },
    Document { document: MediaLink },
}

/// The action shape matching the message's type.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(untagged)]
pub enum InteractiveAction {
    Buttons {
        buttons: Vec<ReplyButton>,
    },
    List {
        button: String,
        sections: Vec<Section>,
    },
    CtaUrl {
        name: &'static str,
        parameters: CtaParameters,
    },
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ReplyButton {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub reply: Reply,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Reply {
    pub id: String,
    pub title: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Section {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub rows: Vec<Row>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Row {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct CtaParameters {
    pub display_text: String,
    pub url: String,
}

/// Derives a stable identifier from a title.
///
/// Lower-cases and trims the title, turns whitespace runs into `_`, drops
/// everything outside `[A-Za-z0-9_-]`, collapses `--` runs into `_`, strips
/// leading and trailing `-` and keeps at most [`ID_MAX`] characters.
///
/// ```rust
/// use whaapy_rs::interactive::slugify;
///
/// assert_eq!(slugify("  Ver Menú  "), "ver_men");
/// assert_eq!(slugify("Pizza -- Grande!"), "pizza___grande");
/// ```
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();

    let mut underscored = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                underscored.push('_');
            }
            in_space = true;
        } else {
            underscored.push(c);
            in_space = false;
        }
    }

    let kept: String = underscored
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    let mut collapsed = String::with_capacity(kept.len());
    let mut dashes = 0usize;
    for c in kept.chars().chain(std::iter::once('\0')) {
        if c == '-' {
            dashes += 1;
            continue;
        }
        match dashes {
            0 => {}
            1 => collapsed.push('-'),
            _ => collapsed.push('_'),
        }
        dashes = 0;
        if c != '\0' {
            collapsed.push(c);
        }
    }

    collapsed.trim_matches('-').chars().take(ID_MAX).collect()
}

/// Keeps at most `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn id_or_slug(id: Option<&str>, title: &str) -> String {
    match non_empty(id) {
        Some(id) => id.to_owned(),
        None => slugify(title),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}

fn title_of(entry: &Fields) -> String {
    entry
        .text("title")
        .map(|title| title.into_owned())
        .unwrap_or_default()
}

fn warn_capped(what: &str, count: usize, max: usize) {
    if count > max {
        tracing::warn!(count, max, "dropping interactive {what} beyond the limit");
    }
}
