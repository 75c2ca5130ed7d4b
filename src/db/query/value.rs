//! Field values and their database type tags

use std::fmt;

use serde_json::Value as JsonValue;
use sqlx::Arguments;
use sqlx::sqlite::SqliteArguments;
use uuid::Uuid;

use crate::db::error::{RepositoryError, Result};

/// Database-level type annotation for a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Str,
    Int64,
    Uuid,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Str => "str",
            TypeTag::Int64 => "int64",
            TypeTag::Uuid => "uuid",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.as_str())
    }
}

/// A scalar that can be bound to a query.
///
/// The set of variants is closed: anything else is rejected when the value is
/// built (see the `TryFrom<JsonValue>` impl), so tagging itself cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    Int(i64),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn tag(&self) -> TypeTag {
        tag(self)
    }

    /// Append this value to a positional argument list.
    pub fn add_to<'q>(&'q self, args: &mut SqliteArguments<'q>) -> std::result::Result<(), sqlx::Error> {
        let added = match self {
            FieldValue::Bool(b) => args.add(*b),
            FieldValue::Text(s) => args.add(s.as_str()),
            FieldValue::Int(i) => args.add(*i),
            // UUIDs are stored as hyphenated TEXT
            FieldValue::Uuid(u) => args.add(u.to_string()),
        };
        added.map_err(sqlx::Error::Encode)
    }
}

/// Map a value to its type tag.
pub fn tag(value: &FieldValue) -> TypeTag {
    match value {
        FieldValue::Bool(_) => TypeTag::Bool,
        FieldValue::Text(_) => TypeTag::Str,
        FieldValue::Int(_) => TypeTag::Int64,
        FieldValue::Uuid(_) => TypeTag::Uuid,
    }
}

/// Build the argument list for a statement from its values, in bind order.
pub fn to_arguments(values: &[FieldValue]) -> std::result::Result<SqliteArguments<'_>, sqlx::Error> {
    let mut args = SqliteArguments::default();
    for value in values {
        value.add_to(&mut args)?;
    }
    Ok(args)
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl TryFrom<JsonValue> for FieldValue {
    type Error = RepositoryError;

    fn try_from(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Bool(b) => Ok(FieldValue::Bool(b)),
            JsonValue::String(s) => Ok(FieldValue::Text(s)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(FieldValue::Int)
                .ok_or(RepositoryError::UnsupportedType { kind: "float" }),
            JsonValue::Null => Err(RepositoryError::UnsupportedType { kind: "null" }),
            JsonValue::Array(_) => Err(RepositoryError::UnsupportedType { kind: "array" }),
            JsonValue::Object(_) => Err(RepositoryError::UnsupportedType { kind: "object" }),
        }
    }
}

/// A field a resource accepts in filters or shapes, with its expected tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub tag: TypeTag,
}

impl FieldDef {
    pub const fn new(name: &'static str, tag: TypeTag) -> Self {
        Self { name, tag }
    }
}

/// Look up `name` in `allowed` and check that `value` carries the declared tag.
pub(crate) fn check_field(allowed: &[FieldDef], name: &str, value: &FieldValue) -> Result<()> {
    let def = allowed
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| RepositoryError::UnknownField(name.to_string()))?;

    let found = value.tag();
    if found != def.tag {
        return Err(RepositoryError::TypeMismatch {
            field: name.to_string(),
            expected: def.tag,
            found,
        });
    }
    Ok(())
}

/// Insertion-ordered map of field name to value.
///
/// Only fields the caller explicitly set go in here, so "not provided" and
/// "cleared" stay distinguishable for partial updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Insert only when the caller actually provided a value.
    pub fn insert_opt<V: Into<FieldValue>>(&mut self, name: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(name, value);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a map from a JSON object body, accepting only declared fields.
    ///
    /// Every value must convert to a [FieldValue] with the declared tag; an
    /// explicit `null` is rejected rather than treated as "unset".
    pub fn from_json_object(
        object: serde_json::Map<String, JsonValue>,
        accepted: &[FieldDef],
    ) -> Result<Self> {
        let mut map = FieldMap::new();
        for (name, value) in object {
            let value = FieldValue::try_from(value)?;
            check_field(accepted, &name, &value)?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_tag_covers_every_variant() {
        assert_eq!(tag(&FieldValue::Bool(true)), TypeTag::Bool);
        assert_eq!(tag(&"desk".into()), TypeTag::Str);
        assert_eq!(tag(&FieldValue::Int(3)), TypeTag::Int64);
        assert_eq!(tag(&Uuid::new_v4().into()), TypeTag::Uuid);
    }

    #[test]
    fn test_json_values_outside_the_closed_set_are_rejected() {
        assert_matches!(
            FieldValue::try_from(json!(null)),
            Err(RepositoryError::UnsupportedType { kind: "null" })
        );
        assert_matches!(
            FieldValue::try_from(json!(1.5)),
            Err(RepositoryError::UnsupportedType { kind: "float" })
        );
        assert_matches!(
            FieldValue::try_from(json!(["a"])),
            Err(RepositoryError::UnsupportedType { kind: "array" })
        );
        assert_eq!(FieldValue::try_from(json!(7)).unwrap(), FieldValue::Int(7));
    }

    #[test]
    fn test_field_map_keeps_insertion_order_on_replace() {
        let mut map = FieldMap::new();
        map.insert("title", "a");
        map.insert("description", "b");
        map.insert("title", "c");

        let names: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["title", "description"]);
        let title = map.iter().find(|(k, _)| *k == "title").map(|(_, v)| v);
        assert_eq!(title, Some(&FieldValue::Text("c".into())));
    }

    #[test]
    fn test_insert_opt_skips_unset_fields() {
        let mut map = FieldMap::new();
        map.insert_opt("full_name", None::<String>);
        map.insert_opt("is_active", Some(false));
        assert_eq!(map.len(), 1);
        assert!(map.iter().all(|(k, _)| k != "full_name"));
    }

    #[test]
    fn test_from_json_object_checks_names_and_tags() {
        const ACCEPTED: &[FieldDef] = &[
            FieldDef::new("title", TypeTag::Str),
            FieldDef::new("is_active", TypeTag::Bool),
        ];

        let ok = json!({"title": "Desk", "is_active": true});
        let map = FieldMap::from_json_object(ok.as_object().unwrap().clone(), ACCEPTED).unwrap();
        assert_eq!(map.len(), 2);

        let unknown = json!({"hashed_password": "x"});
        assert_matches!(
            FieldMap::from_json_object(unknown.as_object().unwrap().clone(), ACCEPTED),
            Err(RepositoryError::UnknownField(f)) if f == "hashed_password"
        );

        let mismatch = json!({"is_active": "yes"});
        assert_matches!(
            FieldMap::from_json_object(mismatch.as_object().unwrap().clone(), ACCEPTED),
            Err(RepositoryError::TypeMismatch { expected: TypeTag::Bool, found: TypeTag::Str, .. })
        );

        let cleared = json!({"title": null});
        assert_matches!(
            FieldMap::from_json_object(cleared.as_object().unwrap().clone(), ACCEPTED),
            Err(RepositoryError::UnsupportedType { kind: "null" })
        );
    }
}
