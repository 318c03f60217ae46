//! Declarative field placement.
//!
//! Every operation owns a static list of [`Rule`]s. A rule reads one field
//! (or a field inside an option collection) and places it in the JSON body
//! at a dotted path or in the query string, optionally transforming it
//! first. Spread rules copy a whole collection through a rename table.
//! The table is evaluated without any transport so it can be tested in
//! isolation.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::{
    error::Error,
    fields::{is_blank, is_truthy, parse_json, Fields},
};

/// Where a value is read from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
    /// A top-level field.
    Field(&'static str),
    /// An entry of an option collection: `(collection, name)`.
    Option(&'static str, &'static str),
}

impl Source {
    /// The field name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Source::Field(name) | Source::Option(_, name) => *name,
        }
    }

    fn read<'f>(&self, fields: &'f Fields) -> Option<Cow<'f, Value>> {
        match self {
            Source::Field(name) => fields.get(name).map(Cow::Borrowed),
            Source::Option(collection, name) => fields
                .collection(collection)
                .get(name)
                .cloned()
                .map(Cow::Owned),
        }
    }
}

/// Where a value lands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Target {
    /// The JSON body, at a dotted path (`ai.pause`).
    Body(&'static str),
    /// A query-string key.
    Query(&'static str),
}

/// Value transformation applied before placement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transform {
    Identity,
    /// Parse textual JSON, pass structured values through.
    Json,
    /// Split a comma-separated string into trimmed entries.
    CommaList,
    /// Drop the value when it equals the given sentinel (e.g. `"all"`).
    Except(&'static str),
}

/// When a value is placed at all.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Presence {
    /// Absent values fail the item.
    Required,
    /// Placed unless absent.
    Defined,
    /// Placed unless absent or an empty string.
    NonEmpty,
    /// Placed only when truthy (`false`, `0` and `""` are skipped).
    Truthy,
}

impl Presence {
    fn admits(self, value: &Value) -> bool {
        match self {
            Presence::Required | Presence::Defined => !value.is_null(),
            Presence::NonEmpty => !is_blank(value),
            Presence::Truthy => is_truthy(value),
        }
    }
}

/// Moves one field to one place.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FieldRule {
    pub source: Source,
    pub target: Target,
    pub transform: Transform,
    pub presence: Presence,
    /// Textual default used when the field is absent.
    pub default: Option<&'static str>,
}

/// Copies every non-blank entry of an option collection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SpreadRule {
    pub collection: &'static str,
    pub query: bool,
    /// `(field name, wire name)` pairs.
    pub renames: &'static [(&'static str, &'static str)],
    /// Entries that carry embedded JSON, by field name.
    pub json: &'static [&'static str],
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rule {
    Field(FieldRule),
    Spread(SpreadRule),
}

impl Rule {
    /// Whether the rule writes into the JSON body.
    pub fn targets_body(&self) -> bool {
        match self {
            Rule::Field(rule) => matches!(rule.target, Target::Body(_)),
            Rule::Spread(rule) => !rule.query,
        }
    }
}

/// A required top-level field placed in the body under its own name.
pub const fn field(name: &'static str) -> FieldRule {
    FieldRule {
        source: Source::Field(name),
        target: Target::Body(name),
        transform: Transform::Identity,
        presence: Presence::Required,
        default: None,
    }
}

/// An optional entry of a collection, placed in the body when truthy.
pub const fn option(collection: &'static str, name: &'static str) -> FieldRule {
    FieldRule {
        source: Source::Option(collection, name),
        target: Target::Body(name),
        transform: Transform::Identity,
        presence: Presence::Truthy,
        default: None,
    }
}

/// Copies a collection into the body.
pub const fn spread_body(collection: &'static str) -> SpreadRule {
    SpreadRule {
        collection,
        query: false,
        renames: &[],
        json: &[],
    }
}

/// Copies a collection into the query string.
pub const fn spread_query(collection: &'static str) -> SpreadRule {
    SpreadRule {
        collection,
        query: true,
        renames: &[],
        json: &[],
    }
}

impl FieldRule {
    pub const fn to_body(mut self, path: &'static str) -> Self {
        self.target = Target::Body(path);
        self
    }

    pub const fn to_query(mut self, key: &'static str) -> Self {
        self.target = Target::Query(key);
        self
    }

    pub const fn json(mut self) -> Self {
        self.transform = Transform::Json;
        self
    }

    pub const fn comma_list(mut self) -> Self {
        self.transform = Transform::CommaList;
        self
    }

    pub const fn except(mut self, sentinel: &'static str) -> Self {
        self.transform = Transform::Except(sentinel);
        self
    }

    pub const fn when(mut self, presence: Presence) -> Self {
        self.presence = presence;
        self
    }

    pub const fn or_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn rule(self) -> Rule {
        Rule::Field(self)
    }
}

impl SpreadRule {
    pub const fn renames(mut self, renames: &'static [(&'static str, &'static str)]) -> Self {
        self.renames = renames;
        self
    }

    pub const fn json(mut self, json: &'static [&'static str]) -> Self {
        self.json = json;
        self
    }

    pub const fn rule(self) -> Rule {
        Rule::Spread(self)
    }

    fn wire_name<'k>(&self, key: &'k str) -> &'k str {
        self.renames
            .iter()
            .find(|(from, _)| *from == key)
            .map_or(key, |&(_, to)| to)
    }
}

/// Body and query produced by evaluating rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Placement {
    pub body: Map<String, Value>,
    pub query: Vec<(String, String)>,
}

impl Placement {
    /// Evaluates `rules` against `fields`, accumulating into `self`.
    pub fn apply(&mut self, rules: &[Rule], fields: &Fields) -> Result<(), Error> {
        rules.iter().try_for_each(|rule| match rule {
            Rule::Field(rule) => self.apply_field(rule, fields),
            Rule::Spread(rule) => self.apply_spread(rule, fields),
        })
    }

    fn apply_field(&mut self, rule: &FieldRule, fields: &Fields) -> Result<(), Error> {
        let name = rule.source.name();
        let value = match (rule.source.read(fields), rule.default) {
            (Some(value), _) => value,
            (None, Some(default)) => Cow::Owned(Value::String(default.to_owned())),
            (None, None) if rule.presence == Presence::Required => {
                return Err(Error::missing(name))
            }
            (None, None) => return Ok(()),
        };

        if !rule.presence.admits(&value) {
            return Ok(());
        }

        let value = match rule.transform {
            Transform::Identity => value.into_owned(),
            Transform::Json => parse_json(name, &value)?,
            Transform::CommaList => comma_list(value.into_owned()),
            Transform::Except(sentinel) if value.as_str() == Some(sentinel) => return Ok(()),
            Transform::Except(_) => value.into_owned(),
        };

        self.place(rule.target, value);
        Ok(())
    }

    fn apply_spread(&mut self, rule: &SpreadRule, fields: &Fields) -> Result<(), Error> {
        for (key, value) in fields.collection(rule.collection).iter() {
            if is_blank(value) {
                continue;
            }
            let value = if rule.json.contains(&key.as_str()) {
                parse_json(key, value)?
            } else {
                value.clone()
            };
            let wire = rule.wire_name(key);
            if rule.query {
                self.push_query(wire, value);
            } else {
                set_path(&mut self.body, wire, value);
            }
        }
        Ok(())
    }

    fn place(&mut self, target: Target, value: Value) {
        match target {
            Target::Body(path) => set_path(&mut self.body, path, value),
            Target::Query(key) => self.push_query(key, value),
        }
    }

    /// Arrays repeat the key; objects are sent as JSON text.
    fn push_query(&mut self, key: &str, value: Value) {
        match value {
            Value::Array(items) => items
                .into_iter()
                .for_each(|item| self.query.push((key.to_owned(), query_text(item)))),
            other => self.query.push((key.to_owned(), query_text(other))),
        }
    }
}

fn query_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn comma_list(value: Value) -> Value {
    match value {
        Value::String(text) => text
            .split(',')
            .map(|part| Value::String(part.trim().to_owned()))
            .collect(),
        other => other,
    }
}

/// Writes `value` at a dotted path, creating intermediate objects.
pub(crate) fn set_path(body: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = body;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_owned(), value);
            return;
        }
        let slot = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        };
    }
}
