//! Shape, filter and order builders
//!
//! Turn field maps and ordering specs into parameterized SQL fragments.
//! Identifiers only ever come from the resource's static allow-lists; caller
//! data travels exclusively as bound [FieldValue]s.

use super::value::{FieldDef, FieldMap, FieldValue, check_field};
use crate::db::error::{RepositoryError, Result};

/// Separator used in field names to address a related entity (`owner__email`).
pub const PATH_SEPARATOR: &str = "__";

/// Prefix marking a descending ordering token.
pub const DESCENDING_MARKER: char = '-';

/// Predicate used when there is nothing to filter on.
pub const MATCH_ALL: &str = "1 = 1";

/// A SQL fragment plus the values to bind for its `?` placeholders, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub sql: String,
    pub params: Vec<FieldValue>,
}

/// Column assignments for an INSERT or UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    columns: Vec<String>,
    params: Vec<FieldValue>,
}

impl Shape {
    /// Append a repository-owned column (id, timestamps, foreign keys).
    pub fn push(&mut self, column: &'static str, value: impl Into<FieldValue>) {
        self.columns.push(column.to_string());
        self.params.push(value.into());
    }

    /// `a = ?, b = ?` for UPDATE ... SET
    pub fn assignments(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `(a, b) VALUES (?, ?)` for INSERT INTO
    pub fn insert_clause(&self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!("({}) VALUES ({})", self.columns.join(", "), placeholders)
    }

    pub fn params(&self) -> &[FieldValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<FieldValue> {
        self.params
    }
}

/// Resolve a possibly dotted field name into a column path.
///
/// `owner__email` addresses the `email` column of the joined `owner` relation;
/// a plain `title` addresses the root entity (`<root>.title`).
pub fn resolve_path(name: &str, root: &str) -> String {
    if name.contains(PATH_SEPARATOR) {
        name.split(PATH_SEPARATOR).collect::<Vec<_>>().join(".")
    } else {
        format!("{}.{}", root, name)
    }
}

/// Build the assignment shape for the fields a caller set.
///
/// Every field must be declared in `allowed` with a matching tag. An empty map
/// yields an empty shape.
pub fn build_shape(fields: &FieldMap, allowed: &[FieldDef]) -> Result<Shape> {
    let mut shape = Shape::default();
    for (name, value) in fields.iter() {
        check_field(allowed, name, value)?;
        shape.columns.push(name.to_string());
        shape.params.push(value.clone());
    }
    Ok(shape)
}

/// Build an AND of equality predicates, one per field.
///
/// An empty map yields [MATCH_ALL].
pub fn build_filter(fields: &FieldMap, root: &str, allowed: &[FieldDef]) -> Result<Expression> {
    if fields.is_empty() {
        return Ok(Expression {
            sql: MATCH_ALL.to_string(),
            params: Vec::new(),
        });
    }

    let mut predicates = Vec::with_capacity(fields.len());
    let mut params = Vec::with_capacity(fields.len());
    for (name, value) in fields.iter() {
        check_field(allowed, name, value)?;
        predicates.push(format!("{} = ?", resolve_path(name, root)));
        params.push(value.clone());
    }

    Ok(Expression {
        sql: predicates.join(" AND "),
        params,
    })
}

/// Build a multi-key ORDER BY list from a comma separated ordering string.
///
/// The first token is the primary key and later tokens break ties. Any token
/// missing from `allowed` fails the whole build.
pub fn build_order(ordering: &str, root: &str, allowed: &[&str]) -> Result<Expression> {
    let mut keys = Vec::new();
    for token in ordering.split(',') {
        let (field, descending) = match token.strip_prefix(DESCENDING_MARKER) {
            Some(field) => (field, true),
            None => (token, false),
        };

        if !allowed.contains(&field) {
            return Err(RepositoryError::InvalidOrderingField(field.to_string()));
        }

        let path = resolve_path(field, root);
        keys.push(if descending {
            format!("{} DESC", path)
        } else {
            path
        });
    }

    Ok(Expression {
        sql: keys.join(", "),
        params: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::TypeTag;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    const ITEM_FIELDS: &[FieldDef] = &[
        FieldDef::new("title", TypeTag::Str),
        FieldDef::new("description", TypeTag::Str),
        FieldDef::new("owner__id", TypeTag::Uuid),
        FieldDef::new("owner__email", TypeTag::Str),
    ];

    const ITEM_ORDERING: &[&str] = &["id", "title", "owner__full_name", "owner__email"];

    #[test]
    fn test_shape_has_one_assignment_per_field_in_order() {
        let fields: FieldMap = [("title", "Desk"), ("description", "Oak")].into_iter().collect();
        let shape = build_shape(&fields, ITEM_FIELDS).unwrap();

        assert_eq!(shape.params().len(), 2);
        assert_eq!(shape.assignments(), "title = ?, description = ?");
        assert_eq!(shape.insert_clause(), "(title, description) VALUES (?, ?)");
        assert_eq!(
            shape.params(),
            &[FieldValue::Text("Desk".into()), FieldValue::Text("Oak".into())]
        );
    }

    #[test]
    fn test_shape_is_empty_iff_map_is_empty() {
        let shape = build_shape(&FieldMap::new(), ITEM_FIELDS).unwrap();
        assert!(shape.params().is_empty());
        assert_eq!(shape.assignments(), "");
    }

    #[test]
    fn test_shape_rejects_undeclared_fields() {
        let fields: FieldMap = [("owner_id; DROP TABLE items", "x")].into_iter().collect();
        assert_matches!(
            build_shape(&fields, ITEM_FIELDS),
            Err(RepositoryError::UnknownField(_))
        );
    }

    #[test]
    fn test_filter_resolves_plain_and_dotted_paths() {
        let owner = Uuid::new_v4();
        let mut fields = FieldMap::new();
        fields.insert("title", "Desk");
        fields.insert("owner__id", owner);

        let filter = build_filter(&fields, "item", ITEM_FIELDS).unwrap();
        assert_eq!(filter.sql, "item.title = ? AND owner.id = ?");
        assert_eq!(
            filter.params,
            vec![FieldValue::Text("Desk".into()), FieldValue::Uuid(owner)]
        );
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = build_filter(&FieldMap::new(), "item", ITEM_FIELDS).unwrap();
        assert_eq!(filter.sql, MATCH_ALL);
        assert!(filter.params.is_empty());
    }

    #[test]
    fn test_filter_rejects_tag_mismatch() {
        let mut fields = FieldMap::new();
        fields.insert("owner__id", "not-a-uuid");
        assert_matches!(
            build_filter(&fields, "item", ITEM_FIELDS),
            Err(RepositoryError::TypeMismatch { expected: TypeTag::Uuid, .. })
        );
    }

    #[test]
    fn test_order_preserves_token_priority() {
        let order = build_order("-owner__email,title", "item", ITEM_ORDERING).unwrap();
        assert_eq!(order.sql, "owner.email DESC, item.title");
        assert!(order.params.is_empty());
    }

    #[test]
    fn test_order_fails_on_any_unlisted_token() {
        for ordering in ["hashed_password", "title,-hashed_password", "-num_items,title"] {
            let err = build_order(ordering, "item", ITEM_ORDERING).unwrap_err();
            assert_matches!(err, RepositoryError::InvalidOrderingField(ref f) if ordering.contains(f.as_str()));
        }
    }

    #[test]
    fn test_order_error_names_the_unprefixed_token() {
        assert_matches!(
            build_order("title,-secret", "item", ITEM_ORDERING),
            Err(RepositoryError::InvalidOrderingField(f)) if f == "secret"
        );
    }

    #[test]
    fn test_order_rejects_padded_tokens() {
        for ordering in [" title", "title, -id", "-title "] {
            assert_matches!(
                build_order(ordering, "item", ITEM_ORDERING),
                Err(RepositoryError::InvalidOrderingField(_))
            );
        }
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("title", "item"), "item.title");
        assert_eq!(resolve_path("owner__email", "item"), "owner.email");
    }
}
