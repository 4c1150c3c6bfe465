use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a single property-level or object-level change.
///
/// # Examples
///
/// ```
/// use changelens_core::ChangeKind;
///
/// assert!(ChangeKind::ObjectAdded.is_added());
/// assert!(ChangeKind::PropertyRemoved.is_removed());
/// assert_eq!(ChangeKind::Modified.to_string(), "Modified");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    /// A value changed in place.
    Modified,
    /// A scalar property appeared.
    PropertyAdded,
    /// A whole object appeared.
    ObjectAdded,
    /// A whole object disappeared.
    ObjectRemoved,
    /// A scalar property disappeared.
    PropertyRemoved,
}

impl ChangeKind {
    /// Numeric code used by the upstream change-type convention (1-5).
    pub fn code(self) -> u8 {
        match self {
            ChangeKind::Modified => 1,
            ChangeKind::PropertyAdded => 2,
            ChangeKind::ObjectAdded => 3,
            ChangeKind::ObjectRemoved => 4,
            ChangeKind::PropertyRemoved => 5,
        }
    }

    pub fn is_added(self) -> bool {
        matches!(self, ChangeKind::PropertyAdded | ChangeKind::ObjectAdded)
    }

    pub fn is_removed(self) -> bool {
        matches!(self, ChangeKind::PropertyRemoved | ChangeKind::ObjectRemoved)
    }

    /// Coarse direction of the change.
    pub fn direction(self) -> Direction {
        if self.is_added() {
            Direction::Added
        } else if self.is_removed() {
            Direction::Removed
        } else {
            Direction::Modified
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Modified => write!(f, "Modified"),
            ChangeKind::PropertyAdded => write!(f, "Property Added"),
            ChangeKind::ObjectAdded => write!(f, "Object Added"),
            ChangeKind::ObjectRemoved => write!(f, "Object Removed"),
            ChangeKind::PropertyRemoved => write!(f, "Property Removed"),
        }
    }
}

/// Direction of a change, ignoring the property/object distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Added => write!(f, "Added"),
            Direction::Removed => write!(f, "Removed"),
            Direction::Modified => write!(f, "Modified"),
        }
    }
}

/// A line/column position inside a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// One leaf change reported by a diff engine.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind};
///
/// let change = Change::new("description", ChangeKind::Modified)
///     .with_values(Some("old"), Some("new"));
/// assert_eq!(change.original.as_deref(), Some("old"));
/// assert!(!change.breaking);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Name of the property that changed.
    pub property: String,
    /// What kind of change this is.
    pub kind: ChangeKind,
    /// Value before the change, if any.
    #[serde(default)]
    pub original: Option<String>,
    /// Value after the change, if any.
    #[serde(default)]
    pub new: Option<String>,
    /// Whether the change breaks existing consumers.
    #[serde(default)]
    pub breaking: bool,
    #[serde(default)]
    pub original_location: Option<Location>,
    #[serde(default)]
    pub new_location: Option<Location>,
}

impl Change {
    pub fn new(property: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            property: property.into(),
            kind,
            original: None,
            new: None,
            breaking: false,
            original_location: None,
            new_location: None,
        }
    }

    /// Set the before/after values.
    pub fn with_values(mut self, original: Option<&str>, new: Option<&str>) -> Self {
        self.original = original.map(str::to_string);
        self.new = new.map(str::to_string);
        self
    }

    /// Mark the change as breaking.
    pub fn breaking(mut self) -> Self {
        self.breaking = true;
        self
    }

    pub fn with_locations(mut self, original: Option<Location>, new: Option<Location>) -> Self {
        self.original_location = original;
        self.new_location = new;
        self
    }

    /// The value a reader cares about: the new value for additions,
    /// the original value for removals and modifications.
    pub fn subject_value(&self) -> Option<&str> {
        if self.kind.is_added() {
            self.new.as_deref()
        } else {
            self.original.as_deref()
        }
    }
}

/// The closed set of semantic object kinds a diff result may contain.
///
/// Kinds that a newer engine emits but this version does not know about
/// deserialize to [`ObjectKind::Unknown`] and are skipped when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Document,
    Info,
    Contact,
    License,
    Paths,
    PathItem,
    Operation,
    Server,
    ServerVariable,
    Components,
    RequestBody,
    Tag,
    Schema,
    Items,
    Parameter,
    SecurityRequirement,
    SecurityScheme,
    Responses,
    Response,
    MediaType,
    Encoding,
    Header,
    Example,
    Examples,
    Link,
    Callback,
    Extensions,
    ExternalDocs,
    Xml,
    Scopes,
    OAuthFlow,
    OAuthFlows,
    Discriminator,
    #[serde(other)]
    Unknown,
}

impl ObjectKind {
    /// Human-readable label used for container nodes.
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Document => "Document",
            ObjectKind::Info => "Info",
            ObjectKind::Contact => "Contact",
            ObjectKind::License => "License",
            ObjectKind::Paths => "Paths",
            ObjectKind::PathItem => "Path Item",
            ObjectKind::Operation => "Operation",
            ObjectKind::Server => "Server",
            ObjectKind::ServerVariable => "Server Variable",
            ObjectKind::Components => "Components",
            ObjectKind::RequestBody => "Request Body",
            ObjectKind::Tag => "Tag",
            ObjectKind::Schema => "Schema",
            ObjectKind::Items => "Items",
            ObjectKind::Parameter => "Parameter",
            ObjectKind::SecurityRequirement => "Security Requirements",
            ObjectKind::SecurityScheme => "Security Scheme",
            ObjectKind::Responses => "Responses",
            ObjectKind::Response => "Response",
            ObjectKind::MediaType => "Media Type",
            ObjectKind::Encoding => "Encoding",
            ObjectKind::Header => "Header",
            ObjectKind::Example => "Example",
            ObjectKind::Examples => "Examples",
            ObjectKind::Link => "Link",
            ObjectKind::Callback => "Callback",
            ObjectKind::Extensions => "Extensions",
            ObjectKind::ExternalDocs => "External Docs",
            ObjectKind::Xml => "XML",
            ObjectKind::Scopes => "Scopes",
            ObjectKind::OAuthFlow => "oAuth Flow",
            ObjectKind::OAuthFlows => "oAuth Flows",
            ObjectKind::Discriminator => "Discriminator",
            ObjectKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The changes recorded for one object in the document.
///
/// Each declared field of the object is a [`Slot`]. Slots keep their
/// declaration order; keyed collections are ordered by key.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind, ObjectChanges, ObjectKind};
///
/// let info = ObjectChanges::new(ObjectKind::Info)
///     .with_properties("changes", vec![Change::new("title", ChangeKind::Modified)]);
/// let doc = ObjectChanges::new(ObjectKind::Document).with_object("info", info);
/// assert_eq!(doc.total_changes(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChanges {
    pub kind: ObjectKind,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

/// Root of a diff: the changes for a whole document.
pub type DiffResult = ObjectChanges;

impl ObjectChanges {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
        }
    }

    pub fn with_slot(mut self, name: impl Into<String>, value: SlotValue) -> Self {
        self.slots.push(Slot {
            name: name.into(),
            value,
        });
        self
    }

    pub fn with_properties(self, name: impl Into<String>, changes: Vec<Change>) -> Self {
        self.with_slot(name, SlotValue::Properties(changes))
    }

    pub fn with_object(self, name: impl Into<String>, object: ObjectChanges) -> Self {
        self.with_slot(name, SlotValue::Object(Some(Box::new(object))))
    }

    pub fn with_keyed(
        self,
        name: impl Into<String>,
        entries: BTreeMap<String, ObjectChanges>,
    ) -> Self {
        self.with_slot(name, SlotValue::Keyed(Some(entries)))
    }

    pub fn with_ordered(self, name: impl Into<String>, items: Vec<ObjectChanges>) -> Self {
        self.with_slot(name, SlotValue::Ordered(Some(items)))
    }

    /// Count every leaf change below this object, skipping nested objects
    /// of unknown kind.
    pub fn total_changes(&self) -> usize {
        self.slots.iter().map(|s| s.value.total_changes()).sum()
    }

    /// Count breaking leaf changes below this object.
    pub fn breaking_changes(&self) -> usize {
        self.all_changes().filter(|c| c.breaking).count()
    }

    /// Iterate every leaf change below this object, depth first.
    pub fn all_changes(&self) -> Box<dyn Iterator<Item = &Change> + '_> {
        Box::new(self.slots.iter().flat_map(|s| s.value.all_changes()))
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// One declared field of an object, holding one of the slot shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSlot", into = "RawSlot")]
pub struct Slot {
    pub name: String,
    pub value: SlotValue,
}

/// The structural shape of a slot.
///
/// `None` inside a variant means the slot is absent, which is different
/// from present-but-empty. Both render nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// Leaf changes recorded directly on the owning object.
    Properties(Vec<Change>),
    /// A single named sub-object.
    Object(Option<Box<ObjectChanges>>),
    /// A map from key (path, status code, media type...) to sub-object.
    Keyed(Option<BTreeMap<String, ObjectChanges>>),
    /// A sequence of sub-objects kept in source order.
    Ordered(Option<Vec<ObjectChanges>>),
    /// A shape this version does not understand.
    Unsupported,
}

impl SlotValue {
    /// Count leaf changes in this slot. Sub-objects of
    /// [`ObjectKind::Unknown`] are not shown anywhere, so they count as zero.
    pub fn total_changes(&self) -> usize {
        self.all_changes().count()
    }

    fn all_changes(&self) -> Box<dyn Iterator<Item = &Change> + '_> {
        match self {
            SlotValue::Properties(changes) => Box::new(changes.iter()),
            SlotValue::Object(Some(obj)) => known(obj),
            SlotValue::Keyed(Some(map)) => Box::new(map.values().flat_map(known)),
            SlotValue::Ordered(Some(items)) => Box::new(items.iter().flat_map(known)),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            SlotValue::Properties(_) => "properties",
            SlotValue::Object(_) => "object",
            SlotValue::Keyed(_) => "keyed",
            SlotValue::Ordered(_) => "ordered",
            SlotValue::Unsupported => "unsupported",
        }
    }
}

fn known(object: &ObjectChanges) -> Box<dyn Iterator<Item = &Change> + '_> {
    if object.kind == ObjectKind::Unknown {
        Box::new(std::iter::empty())
    } else {
        object.all_changes()
    }
}

/// Wire form of a slot: `{"name": .., "shape": .., "value": ..}`.
///
/// Unknown shapes and values that do not match their declared shape
/// become [`SlotValue::Unsupported`] rather than failing the whole diff.
/// Inside a `properties` slot, each change that cannot be read is dropped
/// on its own and its siblings are kept.
#[derive(Serialize, Deserialize)]
struct RawSlot {
    name: String,
    shape: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl From<RawSlot> for Slot {
    fn from(raw: RawSlot) -> Self {
        let value = match raw.shape.as_str() {
            "properties" => match raw.value {
                serde_json::Value::Null => Some(SlotValue::Properties(Vec::new())),
                // changes of a kind this version does not know are dropped one by one
                serde_json::Value::Array(items) => Some(SlotValue::Properties(
                    items
                        .into_iter()
                        .filter_map(|item| serde_json::from_value(item).ok())
                        .collect(),
                )),
                _ => None,
            },
            "object" => serde_json::from_value(raw.value).ok().map(SlotValue::Object),
            "keyed" => serde_json::from_value(raw.value).ok().map(SlotValue::Keyed),
            "ordered" => serde_json::from_value(raw.value).ok().map(SlotValue::Ordered),
            _ => None,
        };
        Slot {
            name: raw.name,
            value: value.unwrap_or(SlotValue::Unsupported),
        }
    }
}

impl From<Slot> for RawSlot {
    fn from(slot: Slot) -> Self {
        let shape = slot.value.shape().to_string();
        let value = match slot.value {
            SlotValue::Properties(changes) => serde_json::to_value(changes),
            SlotValue::Object(obj) => serde_json::to_value(obj),
            SlotValue::Keyed(map) => serde_json::to_value(map),
            SlotValue::Ordered(items) => serde_json::to_value(items),
            SlotValue::Unsupported => Ok(serde_json::Value::Null),
        }
        .unwrap_or(serde_json::Value::Null);
        RawSlot {
            name: slot.name,
            shape,
            value,
        }
    }
}
