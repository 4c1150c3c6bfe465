//! Built-in structural comparator for JSON OpenAPI documents.
//!
//! Walks both documents side by side, mapping well-known OpenAPI sections
//! onto [`ObjectKind`]s so the result has the same shape an external engine
//! would produce. Breaking-change detection is a small rule set, not a full
//! compatibility checker; configure an external engine for that.

use std::collections::{BTreeMap, BTreeSet};

use changelens_core::{
    Change, ChangeKind, ChangelensError, DiffResult, ObjectChanges, ObjectKind, Slot, SlotValue,
};
use serde_json::{Map, Value};

use crate::engine::DiffEngine;

/// Compares two JSON documents structurally.
///
/// # Examples
///
/// ```
/// use changelens_history::engine::DiffEngine;
/// use changelens_history::structural::StructuralEngine;
///
/// let old = br#"{"info": {"title": "Pets", "version": "1.0"}}"#;
/// let new = br#"{"info": {"title": "Pets", "version": "1.1"}}"#;
/// let diff = StructuralEngine::new().compare(old, new).unwrap();
/// assert_eq!(diff.total_changes(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StructuralEngine;

impl StructuralEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DiffEngine for StructuralEngine {
    fn compare(&self, old: &[u8], new: &[u8]) -> Result<DiffResult, ChangelensError> {
        let old = parse_document(old, "original")?;
        let new = parse_document(new, "modified")?;
        Ok(compare_object(ObjectKind::Document, &old, &new))
    }
}

fn parse_document(bytes: &[u8], which: &str) -> Result<Map<String, Value>, ChangelensError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ChangelensError::Engine(format!(
            "{which} document is not a JSON object"
        ))),
        Err(e) => Err(ChangelensError::Engine(format!(
            "{which} document is not valid JSON: {e}"
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    /// A single sub-object.
    Object(ObjectKind),
    /// A map of key to sub-object, entries reported on the owner.
    Keyed(ObjectKind),
    /// A map of key to sub-object wrapped in its own container object.
    /// Added and removed entries are reported on the container under
    /// `entry_property`, or under the key itself when unset.
    Wrapped {
        container: ObjectKind,
        entry: ObjectKind,
        entry_property: Option<&'static str>,
    },
    /// An array of sub-objects paired by identity.
    Ordered(ObjectKind),
}

const OPERATIONS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

fn field_shape(kind: ObjectKind, field: &str) -> Option<Field> {
    use ObjectKind as K;
    let shape = match (kind, field) {
        (K::Document, "info") => Field::Object(K::Info),
        (K::Document, "servers") => Field::Ordered(K::Server),
        (K::Document, "paths") => Field::Wrapped {
            container: K::Paths,
            entry: K::PathItem,
            entry_property: None,
        },
        (K::Document, "webhooks") => Field::Keyed(K::PathItem),
        (K::Document, "components") => Field::Object(K::Components),
        (K::Document | K::Operation, "security") => Field::Ordered(K::SecurityRequirement),
        (K::Document, "tags") => Field::Ordered(K::Tag),
        (K::Info, "contact") => Field::Object(K::Contact),
        (K::Info, "license") => Field::Object(K::License),
        (K::Server, "variables") => Field::Keyed(K::ServerVariable),
        (K::Components, "schemas") => Field::Keyed(K::Schema),
        (K::Components | K::Operation, "callbacks") => Field::Keyed(K::Callback),
        (K::Components, "responses") => Field::Keyed(K::Response),
        (K::Components, "parameters") => Field::Keyed(K::Parameter),
        (K::Components, "requestBodies") => Field::Keyed(K::RequestBody),
        (K::Components | K::Encoding | K::Response, "headers") => Field::Keyed(K::Header),
        (K::Components, "securitySchemes") => Field::Keyed(K::SecurityScheme),
        (K::Components | K::Response, "links") => Field::Keyed(K::Link),
        (K::Components | K::Parameter | K::Header | K::MediaType, "examples") => {
            Field::Keyed(K::Example)
        }
        (K::PathItem, f) if OPERATIONS.contains(&f) => Field::Object(K::Operation),
        (K::PathItem | K::Operation, "parameters") => Field::Ordered(K::Parameter),
        (K::PathItem | K::Operation, "servers") => Field::Ordered(K::Server),
        (K::Operation, "requestBody") => Field::Object(K::RequestBody),
        (K::Operation, "responses") => Field::Wrapped {
            container: K::Responses,
            entry: K::Response,
            entry_property: Some("codes"),
        },
        (K::Callback, f) if !f.starts_with("x-") => Field::Object(K::PathItem),
        (K::Parameter | K::Header | K::MediaType, "schema") => Field::Object(K::Schema),
        (K::Parameter | K::Header | K::RequestBody | K::Response, "content") => {
            Field::Keyed(K::MediaType)
        }
        (K::MediaType, "encoding") => Field::Keyed(K::Encoding),
        (K::Schema | K::Items, "properties") => Field::Keyed(K::Schema),
        (K::Schema | K::Items, "items") => Field::Object(K::Items),
        (K::Schema | K::Items, "allOf" | "oneOf" | "anyOf" | "prefixItems") => {
            Field::Ordered(K::Schema)
        }
        (K::Schema | K::Items, "not" | "additionalProperties") => Field::Object(K::Schema),
        (K::Schema | K::Items, "discriminator") => Field::Object(K::Discriminator),
        (K::Schema | K::Items, "xml") => Field::Object(K::Xml),
        (K::SecurityScheme, "flows") => Field::Object(K::OAuthFlows),
        (
            K::OAuthFlows,
            "implicit" | "password" | "clientCredentials" | "authorizationCode",
        ) => Field::Object(K::OAuthFlow),
        (K::OAuthFlow, "scopes") => Field::Object(K::Scopes),
        (_, "externalDocs") if kind != K::Extensions => Field::Object(K::ExternalDocs),
        _ => return None,
    };
    Some(shape)
}

/// Properties whose changes never break consumers.
const NON_BREAKING: &[&str] = &[
    "description",
    "summary",
    "title",
    "example",
    "examples",
    "externalDocs",
    "termsOfService",
    "contact",
    "license",
    "deprecated",
    "tags",
    "operationId",
];

/// Properties whose modification breaks consumers.
const BREAKING_MODIFICATIONS: &[&str] = &[
    "type",
    "format",
    "in",
    "name",
    "$ref",
    "pattern",
    "style",
    "explode",
    "allowEmptyValue",
    "nullable",
];

fn is_breaking(property: &str, kind: ChangeKind, new: Option<&Value>) -> bool {
    if property.starts_with("x-") || NON_BREAKING.contains(&property) {
        return false;
    }
    match kind {
        ChangeKind::PropertyRemoved | ChangeKind::ObjectRemoved => true,
        ChangeKind::Modified if property == "required" => new == Some(&Value::Bool(true)),
        ChangeKind::Modified => BREAKING_MODIFICATIONS.contains(&property),
        ChangeKind::PropertyAdded | ChangeKind::ObjectAdded => false,
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn change(
    property: &str,
    kind: ChangeKind,
    original: Option<String>,
    new: Option<String>,
    breaking: bool,
) -> Change {
    Change {
        property: property.to_string(),
        kind,
        original,
        new,
        breaking,
        original_location: None,
        new_location: None,
    }
}

/// Accumulates the slots of one object as it is compared.
struct ObjectBuilder {
    out: ObjectChanges,
    changes: Vec<Change>,
}

impl ObjectBuilder {
    fn new(kind: ObjectKind) -> Self {
        Self {
            out: ObjectChanges::new(kind),
            changes: Vec::new(),
        }
    }

    fn finish(self) -> ObjectChanges {
        let mut out = self.out;
        if !self.changes.is_empty() {
            out.slots.insert(
                0,
                Slot {
                    name: "changes".into(),
                    value: SlotValue::Properties(self.changes),
                },
            );
        }
        out
    }

    fn added(&mut self, property: &str, value: Option<String>, breaking: bool) {
        self.changes.push(change(
            property,
            ChangeKind::ObjectAdded,
            None,
            value,
            breaking,
        ));
    }

    fn removed(&mut self, property: &str, value: Option<String>) {
        let breaking = is_breaking(property, ChangeKind::ObjectRemoved, None);
        self.changes.push(change(
            property,
            ChangeKind::ObjectRemoved,
            value,
            None,
            breaking,
        ));
    }

    /// A removed entry of a keyed collection: a path, a response code, a
    /// schema property. The key is user data, so keyword rules do not
    /// apply. Only removed examples are harmless.
    fn removed_entry(&mut self, entry: ObjectKind, property: &str, key: &str) {
        self.changes.push(change(
            property,
            ChangeKind::ObjectRemoved,
            Some(key.to_string()),
            None,
            entry != ObjectKind::Example,
        ));
    }

    fn push(&mut self, name: &str, value: SlotValue) {
        self.out.slots.push(Slot {
            name: name.to_string(),
            value,
        });
    }

    fn push_object(&mut self, name: &str, object: ObjectChanges) {
        if !object.is_empty() {
            self.push(name, SlotValue::Object(Some(Box::new(object))));
        }
    }

    fn push_keyed(&mut self, name: &str, entries: BTreeMap<String, ObjectChanges>) {
        if !entries.is_empty() {
            self.push(name, SlotValue::Keyed(Some(entries)));
        }
    }

    fn push_ordered(&mut self, name: &str, items: Vec<ObjectChanges>) {
        if !items.is_empty() {
            self.push(name, SlotValue::Ordered(Some(items)));
        }
    }

    /// Compare a field with no known structure.
    fn scalar(&mut self, property: &str, old: Option<&Value>, new: Option<&Value>) {
        match (old, new) {
            (Some(Value::Array(o)), Some(Value::Array(n)))
                if o.iter().all(is_scalar) && n.iter().all(is_scalar) =>
            {
                self.scalar_array(property, o, n);
            }
            (Some(o), Some(n)) if o != n => {
                let kind = ChangeKind::Modified;
                let breaking = is_breaking(property, kind, Some(n));
                self.changes
                    .push(change(property, kind, render(o), render(n), breaking));
            }
            (None, Some(n)) => {
                let kind = ChangeKind::PropertyAdded;
                self.changes.push(change(property, kind, None, render(n), false));
            }
            (Some(o), None) => {
                let kind = ChangeKind::PropertyRemoved;
                let breaking = is_breaking(property, kind, None);
                self.changes.push(change(property, kind, render(o), None, breaking));
            }
            _ => {}
        }
    }

    /// Element-wise comparison of arrays of scalars (tags, enums, required
    /// lists, security scopes).
    fn scalar_array(&mut self, property: &str, old: &[Value], new: &[Value]) {
        let old_set: BTreeSet<String> = old.iter().filter_map(render).collect();
        let new_set: BTreeSet<String> = new.iter().filter_map(render).collect();
        for added in new_set.difference(&old_set) {
            let breaking = property == "required";
            self.added(property, Some(added.clone()), breaking);
        }
        for removed in old_set.difference(&new_set) {
            if property == "required" {
                self.changes.push(change(
                    property,
                    ChangeKind::ObjectRemoved,
                    Some(removed.clone()),
                    None,
                    false,
                ));
            } else {
                self.removed(property, Some(removed.clone()));
            }
        }
    }
}

fn compare_object(
    kind: ObjectKind,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) -> ObjectChanges {
    let mut builder = ObjectBuilder::new(kind);

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let mut old_ext = Map::new();
    let mut new_ext = Map::new();

    for key in keys {
        let (o, n) = (old.get(key), new.get(key));
        if kind != ObjectKind::Extensions && key.starts_with("x-") {
            if let Some(o) = o {
                old_ext.insert(key.clone(), o.clone());
            }
            if let Some(n) = n {
                new_ext.insert(key.clone(), n.clone());
            }
            continue;
        }

        match (field_shape(kind, key), o, n) {
            (_, None, None) => {}
            (Some(Field::Ordered(elem)), Some(Value::Array(o)), Some(Value::Array(n))) => {
                let items = compare_ordered(&mut builder, key, elem, o, n);
                builder.push_ordered(key, items);
            }
            (Some(Field::Ordered(elem)), None, Some(Value::Array(n))) => {
                for (idx, item) in n.iter().enumerate() {
                    let breaking = is_required_parameter(item);
                    builder.added(key, Some(identity(elem, idx, item)), breaking);
                }
            }
            (Some(Field::Ordered(elem)), Some(Value::Array(o)), None) => {
                for (idx, item) in o.iter().enumerate() {
                    builder.removed(key, Some(identity(elem, idx, item)));
                }
            }
            (Some(Field::Object(sub)), Some(Value::Object(o)), Some(Value::Object(n))) => {
                builder.push_object(key, compare_object(sub, o, n));
            }
            (Some(Field::Keyed(entry)), Some(Value::Object(o)), Some(Value::Object(n))) => {
                let entries = compare_keyed(&mut builder, entry, None, o, n);
                builder.push_keyed(key, entries);
            }
            (
                Some(Field::Wrapped {
                    container,
                    entry,
                    entry_property,
                }),
                Some(Value::Object(o)),
                Some(Value::Object(n)),
            ) => {
                let mut inner = ObjectBuilder::new(container);
                let entries = compare_keyed(&mut inner, entry, entry_property, o, n);
                inner.push_keyed(key, entries);
                builder.push_object(key, inner.finish());
            }
            (Some(_), None, Some(n)) if !is_scalar(n) => {
                builder.added(key, Some(key.clone()), false);
            }
            (Some(_), Some(o), None) if !is_scalar(o) => {
                builder.removed(key, Some(key.clone()));
            }
            (_, o, n) => builder.scalar(key, o, n),
        }
    }

    if !old_ext.is_empty() || !new_ext.is_empty() {
        let extensions = compare_object(ObjectKind::Extensions, &old_ext, &new_ext);
        builder.push_object("extensions", extensions);
    }

    builder.finish()
}

/// Compare two maps of sub-objects. Entries present on both sides are
/// returned; added and removed entries are recorded on `owner`.
fn compare_keyed(
    owner: &mut ObjectBuilder,
    entry: ObjectKind,
    entry_property: Option<&str>,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) -> BTreeMap<String, ObjectChanges> {
    let mut entries = BTreeMap::new();
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        let property = entry_property.unwrap_or(key.as_str());
        match (old.get(key), new.get(key)) {
            (Some(Value::Object(o)), Some(Value::Object(n))) => {
                let changes = compare_object(entry, o, n);
                if !changes.is_empty() {
                    entries.insert(key.clone(), changes);
                }
            }
            (None, Some(_)) if !key.starts_with("x-") => {
                owner.added(property, Some(key.clone()), false);
            }
            (Some(_), None) if !key.starts_with("x-") => {
                owner.removed_entry(entry, property, key);
            }
            (o, n) => owner.scalar(key, o, n),
        }
    }
    entries
}

/// Compare two arrays of sub-objects, pairing elements by identity.
fn compare_ordered(
    owner: &mut ObjectBuilder,
    property: &str,
    elem: ObjectKind,
    old: &[Value],
    new: &[Value],
) -> Vec<ObjectChanges> {
    let old_ids: Vec<(String, &Value)> = old
        .iter()
        .enumerate()
        .map(|(i, v)| (identity(elem, i, v), v))
        .collect();
    let new_ids: Vec<(String, &Value)> = new
        .iter()
        .enumerate()
        .map(|(i, v)| (identity(elem, i, v), v))
        .collect();

    let mut items = Vec::new();
    for (id, n) in &new_ids {
        match old_ids.iter().find(|(old_id, _)| old_id == id) {
            Some((_, o)) => match (o, n) {
                (Value::Object(o), Value::Object(n)) => {
                    let changes = compare_object(elem, o, n);
                    if !changes.is_empty() {
                        items.push(changes);
                    }
                }
                (o, n) => owner.scalar(property, Some(o), Some(n)),
            },
            None => owner.added(property, Some(id.clone()), is_required_parameter(n)),
        }
    }
    for (id, _) in &old_ids {
        if !new_ids.iter().any(|(new_id, _)| new_id == id) {
            owner.removed(property, Some(id.clone()));
        }
    }
    items
}

fn is_required_parameter(value: &Value) -> bool {
    value.get("in").is_some() && value.get("required") == Some(&Value::Bool(true))
}

/// Stable identity of an array element, used to pair old and new entries.
fn identity(kind: ObjectKind, index: usize, value: &Value) -> String {
    let text = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_string);
    let named = match kind {
        ObjectKind::Server => text("url"),
        ObjectKind::Tag => text("name"),
        ObjectKind::Parameter => match (text("in"), text("name")) {
            (Some(location), Some(name)) => Some(format!("{location}:{name}")),
            _ => text("$ref"),
        },
        ObjectKind::SecurityRequirement => value.as_object().map(|map| {
            if map.is_empty() {
                "{}".to_string()
            } else {
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            }
        }),
        _ => text("$ref"),
    };
    named.unwrap_or_else(|| index.to_string())
}
