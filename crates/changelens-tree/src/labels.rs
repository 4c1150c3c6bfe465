//! Label rules for change-tree nodes.
//!
//! Two heuristics override the generic `"<Property> <Direction>"` wording:
//! response-code changes show the code itself, and security scope changes
//! show `scheme/scope`. Both only affect labels, never counts.

use changelens_core::{Change, ChangeKind, ObjectKind};

/// Marker appended to breaking removals and modifications.
pub const BREAKING_MARKER: &str = " [breaking]";

/// Property names that are never security scheme names.
const NON_SECURITY_PROPERTIES: &[&str] = &[
    "servers",
    "parent",
    "kind",
    "enum",
    "default",
    "description",
    "name",
    "url",
    "summary",
    "title",
    "version",
    "email",
    "license",
    "contact",
    "termsofservice",
    "openapi",
    "info",
    "tags",
    "paths",
    "components",
    "security",
    "externaldocs",
    "identifier",
    "jsonschemadialect",
    "$self",
    "parameters",
    "codes",
    "callbacks",
    "required",
    "type",
];

/// True when the change is to a set of response codes.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind};
/// use changelens_tree::labels::is_codes_change;
///
/// assert!(is_codes_change(&Change::new("Codes", ChangeKind::ObjectAdded)));
/// assert!(!is_codes_change(&Change::new("code", ChangeKind::ObjectAdded)));
/// ```
pub fn is_codes_change(change: &Change) -> bool {
    change.property.eq_ignore_ascii_case("codes")
}

/// The code a codes change refers to: the new value for additions, the
/// original value otherwise.
pub fn codes_label(change: &Change) -> Option<&str> {
    change.subject_value().filter(|v| !v.is_empty())
}

/// True when the change looks like a scope being added to or removed from
/// a security requirement, where `property` is the scheme name and the
/// value is the scope.
///
/// Deliberately conservative: structural keywords are rejected first, and
/// only whole-object additions and removals of bare tokens qualify.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind};
/// use changelens_tree::labels::is_security_scope_change;
///
/// let scope = Change::new("petstore_auth", ChangeKind::ObjectAdded)
///     .with_values(None, Some("write:pets"));
/// assert!(is_security_scope_change(&scope));
///
/// let tag = Change::new("tags", ChangeKind::ObjectAdded).with_values(None, Some("pets"));
/// assert!(!is_security_scope_change(&tag));
/// ```
pub fn is_security_scope_change(change: &Change) -> bool {
    let property = change.property.as_str();
    if property.is_empty() || property.contains('/') {
        return false;
    }
    let lower = property.to_lowercase();
    if NON_SECURITY_PROPERTIES.contains(&lower.as_str()) {
        return false;
    }
    let value = match change.kind {
        ChangeKind::ObjectAdded => change.new.as_deref(),
        ChangeKind::ObjectRemoved => change.original.as_deref(),
        _ => return false,
    };
    match value {
        Some(v) => !v.is_empty() && v != property && !v.contains("://") && !v.contains('/'),
        None => false,
    }
}

/// `scheme/scope` for a security scope change.
pub fn security_scope_label(change: &Change) -> String {
    match change.subject_value() {
        Some(value) if !value.is_empty() => format!("{}/{value}", change.property),
        _ => change.property.clone(),
    }
}

/// Uppercase the first character of every word.
///
/// ```
/// use changelens_tree::labels::title_case;
///
/// assert_eq!(title_case("requestBody"), "RequestBody");
/// assert_eq!(title_case("max length"), "Max Length");
/// ```
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// What a leaf is about, without direction wording: the code, the
/// `scheme/scope`, or the property name. Used as the graph label.
pub fn leaf_subject(change: &Change) -> String {
    if is_codes_change(change) {
        if let Some(code) = codes_label(change) {
            return code.to_string();
        }
    }
    if is_security_scope_change(change) {
        return security_scope_label(change);
    }
    change.property.clone()
}

/// Title of the tree leaf for one change.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind};
/// use changelens_tree::labels::leaf_title;
///
/// let added = Change::new("post", ChangeKind::ObjectAdded);
/// assert_eq!(leaf_title(&added), "Post Added");
///
/// let removed = Change::new("email", ChangeKind::PropertyRemoved).breaking();
/// assert_eq!(leaf_title(&removed), "Email Removed [breaking]");
///
/// let code = Change::new("codes", ChangeKind::ObjectAdded).with_values(None, Some("404"));
/// assert_eq!(leaf_title(&code), "404");
/// ```
pub fn leaf_title(change: &Change) -> String {
    let breaking = change.breaking && !change.kind.is_added();
    let marker = if breaking { BREAKING_MARKER } else { "" };

    if is_codes_change(change) {
        if let Some(code) = codes_label(change) {
            return format!("{code}{marker}");
        }
    }
    let subject = if is_security_scope_change(change) {
        security_scope_label(change)
    } else {
        title_case(&change.property)
    };
    format!("{subject} {}{marker}", change.kind.direction())
}

/// Label of a container node for a named sub-object or an element of an
/// ordered collection.
///
/// Operations are named after their HTTP method and ordered schema
/// collections after their keyword (`ALLOF`, `ONEOF`); everything else uses
/// the kind's display name.
pub fn container_label(slot_name: &str, kind: ObjectKind, ordered: bool) -> String {
    match kind {
        ObjectKind::Operation => slot_name.trim_end_matches("Changes").to_uppercase(),
        ObjectKind::Schema if ordered => slot_name.to_uppercase(),
        _ => kind.label().to_string(),
    }
}
