//! Users repository
//!
//! Handles user lookup, listing, creation, partial updates, removal and
//! credential checks. Plaintext passwords are swapped for a bcrypt hash before
//! any field reaches the shape builder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::error::{RepositoryError, Result};
use super::query::{
    FieldDef, FieldMap, FieldValue, PageWindow, Paginated, TypeTag, build_filter, build_order,
    build_shape, to_arguments,
};
use super::sqlite_helpers::{now_iso8601, placeholders, str_to_uuid};
use crate::services::auth::{hash_password, verify_against_dummy, verify_password};

/// Alias of the root relation in user queries
const ROOT: &str = "user";

/// Fields a user list can be filtered on
pub const USER_FILTER_FIELDS: &[FieldDef] = &[
    FieldDef::new("full_name", TypeTag::Str),
    FieldDef::new("email", TypeTag::Str),
    FieldDef::new("is_active", TypeTag::Bool),
    FieldDef::new("is_superuser", TypeTag::Bool),
    FieldDef::new("num_items", TypeTag::Int64),
];

/// Fields a user list can be sorted by
pub const USER_ORDERING_FIELDS: &[&str] = &[
    "id",
    "full_name",
    "email",
    "is_active",
    "is_superuser",
    "num_items",
];

/// Columns create/update may write
const USER_SHAPE_FIELDS: &[FieldDef] = &[
    FieldDef::new("email", TypeTag::Str),
    FieldDef::new("full_name", TypeTag::Str),
    FieldDef::new("hashed_password", TypeTag::Str),
    FieldDef::new("is_active", TypeTag::Bool),
    FieldDef::new("is_superuser", TypeTag::Bool),
];

const DEFAULT_ORDER: &str = "user.email";

/// Users joined with their derived item count, aliased as `user`
const FROM_USERS: &str = "FROM (SELECT users.*, \
     (SELECT COUNT(*) FROM items WHERE items.owner_id = users.id) AS num_items \
     FROM users) AS user";

const USER_COLUMNS: &str = "user.id, user.email, user.full_name, user.is_active, \
     user.is_superuser, user.num_items, user.created_at, user.updated_at";

// ============================================================================
// Records
// ============================================================================

/// Item summary embedded in a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NestedItem {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub num_items: i64,
    pub items: Vec<NestedItem>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UserCreate {
    /// Only the fields that were provided; defaults come from the table.
    pub fn into_field_map(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("email", self.email);
        fields.insert("password", self.password);
        fields.insert_opt("full_name", self.full_name);
        fields.insert_opt("is_active", self.is_active);
        fields.insert_opt("is_superuser", self.is_superuser);
        fields
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: Option<String>,
    is_active: bool,
    is_superuser: bool,
    num_items: i64,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct NestedItemRow {
    id: String,
    title: String,
    owner_id: String,
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: String,
    hashed_password: String,
}

impl UserRow {
    fn into_record(self, items: Vec<NestedItem>) -> std::result::Result<UserRecord, sqlx::Error> {
        Ok(UserRecord {
            id: str_to_uuid(&self.id)?,
            email: self.email,
            full_name: self.full_name,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            num_items: self.num_items,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

pub struct UsersRepository {
    pool: SqlitePool,
    bcrypt_cost: u32,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    /// Get user by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_where(&mut conn, "user.id = ?", id.into()).await
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_where(&mut conn, "user.email = ?", email.into()).await
    }

    /// List users matching `filter`, sorted by `ordering`, sliced by `window`.
    ///
    /// The count and the page are read in one transaction so both see the
    /// same rows.
    pub async fn get_multi(
        &self,
        filter: &FieldMap,
        ordering: Option<&str>,
        window: PageWindow,
    ) -> Result<Paginated<UserRecord>> {
        let filter = build_filter(filter, ROOT, USER_FILTER_FIELDS)?;
        let order = match ordering.filter(|o| !o.is_empty()) {
            Some(ordering) => build_order(ordering, ROOT, USER_ORDERING_FIELDS)?.sql,
            None => DEFAULT_ORDER.to_string(),
        };

        let count_sql = format!("SELECT COUNT(*) {} WHERE {}", FROM_USERS, filter.sql);
        let page_sql = format!(
            "SELECT {} {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            USER_COLUMNS, FROM_USERS, filter.sql, order
        );
        let mut page_params = filter.params.clone();
        page_params.push(FieldValue::Int(window.limit()));
        page_params.push(FieldValue::Int(window.offset()));

        debug!(sql = %page_sql, "Executing user list query");

        let mut tx = self.pool.begin().await?;
        let count: i64 = sqlx::query_scalar_with(&count_sql, to_arguments(&filter.params)?)
            .fetch_one(&mut *tx)
            .await?;
        let rows: Vec<UserRow> = sqlx::query_as_with(&page_sql, to_arguments(&page_params)?)
            .fetch_all(&mut *tx)
            .await?;
        let data = attach_items(&mut tx, rows).await?;
        tx.commit().await?;

        Ok(Paginated::new(count, data))
    }

    /// Create a user from the provided fields.
    ///
    /// A `password` field is hashed into `hashed_password`; the plaintext is
    /// dropped from the map.
    pub async fn create(&self, mut fields: FieldMap) -> Result<UserRecord> {
        self.hash_password_field(&mut fields)?;
        let mut shape = build_shape(&fields, USER_SHAPE_FIELDS)?;

        let id = Uuid::new_v4();
        let now = now_iso8601();
        shape.push("id", id);
        shape.push("created_at", now.clone());
        shape.push("updated_at", now);

        let sql = format!("INSERT INTO users {}", shape.insert_clause());
        debug!(sql = %sql, "Creating user");

        let mut tx = self.pool.begin().await?;
        sqlx::query_with(&sql, to_arguments(shape.params())?)
            .execute(&mut *tx)
            .await?;
        let user = fetch_where(&mut tx, "user.id = ?", id.into())
            .await?
            .ok_or(RepositoryError::Backend(sqlx::Error::RowNotFound))?;
        tx.commit().await?;

        Ok(user)
    }

    /// Apply a partial update.
    ///
    /// With no fields set this is a plain [get](Self::get): nothing is written
    /// and `updated_at` is left alone. Returns `None` if the user is missing.
    pub async fn update(&self, id: Uuid, mut fields: FieldMap) -> Result<Option<UserRecord>> {
        if fields.is_empty() {
            return self.get(id).await;
        }

        self.hash_password_field(&mut fields)?;
        let mut shape = build_shape(&fields, USER_SHAPE_FIELDS)?;
        shape.push("updated_at", now_iso8601());

        let sql = format!("UPDATE users SET {} WHERE id = ?", shape.assignments());
        let mut params = shape.into_params();
        params.push(id.into());
        debug!(sql = %sql, "Updating user");

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query_with(&sql, to_arguments(&params)?)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let user = fetch_where(&mut tx, "user.id = ?", id.into()).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Delete a user (and, by cascade, their items), returning it as it was.
    pub async fn remove(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let mut tx = self.pool.begin().await?;
        let Some(user) = fetch_where(&mut tx, "user.id = ?", id.into()).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(user))
    }

    /// Check an email/password pair.
    ///
    /// An unknown email and a wrong password both return `None`, and both pay
    /// for one bcrypt verification.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<UserRecord>> {
        let credentials: Option<CredentialsRow> =
            sqlx::query_as("SELECT id, hashed_password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        let Some(credentials) = credentials else {
            verify_against_dummy(password, self.bcrypt_cost);
            return Ok(None);
        };

        if !verify_password(password, &credentials.hashed_password) {
            return Ok(None);
        }

        self.get(str_to_uuid(&credentials.id)?).await
    }

    fn hash_password_field(&self, fields: &mut FieldMap) -> Result<()> {
        match fields.remove("password") {
            Some(FieldValue::Text(password)) => {
                let hashed = hash_password(&password, self.bcrypt_cost)
                    .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?;
                fields.insert("hashed_password", hashed);
                Ok(())
            }
            Some(other) => Err(RepositoryError::TypeMismatch {
                field: "password".to_string(),
                expected: TypeTag::Str,
                found: other.tag(),
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Row loading
// ============================================================================

async fn fetch_where(
    conn: &mut SqliteConnection,
    predicate: &str,
    value: FieldValue,
) -> Result<Option<UserRecord>> {
    let sql = format!("SELECT {} {} WHERE {}", USER_COLUMNS, FROM_USERS, predicate);
    let params = [value];
    let row: Option<UserRow> = sqlx::query_as_with(&sql, to_arguments(&params)?)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(attach_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Owners per `IN (...)` lookup, well under SQLite's bound variable limit.
const OWNER_CHUNK: usize = 500;

/// Load the item summaries for every row, one query per chunk of owners.
async fn attach_items(conn: &mut SqliteConnection, rows: Vec<UserRow>) -> Result<Vec<UserRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_owner: HashMap<String, Vec<NestedItem>> = HashMap::new();
    for chunk in rows.chunks(OWNER_CHUNK) {
        let owner_ids: Vec<FieldValue> =
            chunk.iter().map(|r| FieldValue::Text(r.id.clone())).collect();
        let sql = format!(
            "SELECT id, title, owner_id FROM items WHERE owner_id IN ({}) ORDER BY title, id",
            placeholders(owner_ids.len())
        );
        let item_rows: Vec<NestedItemRow> = sqlx::query_as_with(&sql, to_arguments(&owner_ids)?)
            .fetch_all(&mut *conn)
            .await?;

        for item in item_rows {
            by_owner.entry(item.owner_id).or_default().push(NestedItem {
                id: str_to_uuid(&item.id)?,
                title: item.title,
            });
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let items = by_owner.remove(&row.id).unwrap_or_default();
        records.push(row.into_record(items)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn new_user(email: &str, password: &str) -> FieldMap {
        UserCreate {
            email: email.to_string(),
            password: password.to_string(),
            full_name: None,
            is_active: None,
            is_superuser: None,
        }
        .into_field_map()
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_hides_password() {
        let db = Database::connect_in_memory().await.unwrap();
        let user = db.users().create(new_user("a@example.com", "secret")).await.unwrap();

        assert_eq!(user.email, "a@example.com");
        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert_eq!(user.num_items, 0);
        assert!(user.items.is_empty());

        let (stored,): (String,) = sqlx::query_as("SELECT hashed_password FROM users WHERE id = ?")
            .bind(user.id.to_string())
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_ne!(stored, "secret");
        assert!(verify_password("secret", &stored));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(db.users().get(Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(db.users().get_by_email("nobody@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_backend_error() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        users.create(new_user("a@example.com", "x")).await.unwrap();
        assert_matches!(
            users.create(new_user("a@example.com", "y")).await,
            Err(RepositoryError::Backend(_))
        );
    }

    #[tokio::test]
    async fn test_empty_update_is_a_read() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        let user = users.create(new_user("a@example.com", "x")).await.unwrap();

        let same = users.update(user.id, FieldMap::new()).await.unwrap().unwrap();
        assert_eq!(same, user);
        assert_eq!(same.updated_at, user.updated_at);
    }

    #[tokio::test]
    async fn test_update_changes_only_set_fields() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        let mut create = new_user("a@example.com", "x");
        create.insert("full_name", "Ada");
        let user = users.create(create).await.unwrap();

        let mut patch = FieldMap::new();
        patch.insert("is_active", false);
        let updated = users.update(user.id, patch).await.unwrap().unwrap();

        assert!(!updated.is_active);
        assert_eq!(updated.full_name.as_deref(), Some("Ada"));
        assert_eq!(updated.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_update_password_rehashes() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        let user = users.create(new_user("a@example.com", "old")).await.unwrap();

        let mut patch = FieldMap::new();
        patch.insert("password", "new");
        users.update(user.id, patch).await.unwrap().unwrap();

        assert_eq!(users.authenticate("a@example.com", "old").await.unwrap(), None);
        assert!(users.authenticate("a@example.com", "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_user_is_none() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut patch = FieldMap::new();
        patch.insert("full_name", "Ghost");
        assert_eq!(db.users().update(Uuid::new_v4(), patch).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_authenticate_does_not_distinguish_failures() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        users.create(new_user("real@x.com", "rightpass")).await.unwrap();

        let missing = users.authenticate("missing@x.com", "anything").await.unwrap();
        let wrong = users.authenticate("real@x.com", "wrongpass").await.unwrap();
        assert_eq!(missing, None);
        assert_eq!(missing, wrong);

        let ok = users.authenticate("real@x.com", "rightpass").await.unwrap().unwrap();
        assert_eq!(ok.email, "real@x.com");
    }

    #[tokio::test]
    async fn test_get_multi_counts_before_slicing() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        for i in 0..5 {
            users.create(new_user(&format!("u{i}@example.com"), "x")).await.unwrap();
        }

        for limit in [0, 2, 5, 10] {
            let page = users
                .get_multi(&FieldMap::new(), None, PageWindow::new(0, limit))
                .await
                .unwrap();
            assert_eq!(page.count, 5);
            assert_eq!(page.data.len(), (limit as usize).min(5));
        }

        let tail = users
            .get_multi(&FieldMap::new(), Some("email"), PageWindow::new(3, 10))
            .await
            .unwrap();
        let emails: Vec<&str> = tail.data.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["u3@example.com", "u4@example.com"]);
    }

    #[tokio::test]
    async fn test_get_multi_attaches_items_across_owner_chunks() {
        let db = Database::connect_in_memory().await.unwrap();
        let total = OWNER_CHUNK * 2 + 1;
        let now = now_iso8601();
        for i in 0..total {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO users (id, email, hashed_password, created_at, updated_at) \
                 VALUES (?, ?, 'x', ?, ?)",
            )
            .bind(&id)
            .bind(format!("u{i:05}@example.com"))
            .bind(&now)
            .bind(&now)
            .execute(db.pool())
            .await
            .unwrap();
            sqlx::query(
                "INSERT INTO items (id, title, owner_id, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(format!("item {i}"))
            .bind(&id)
            .bind(&now)
            .bind(&now)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let page = db
            .users()
            .get_multi(&FieldMap::new(), Some("email"), PageWindow::new(0, total as u32))
            .await
            .unwrap();
        assert_eq!(page.count, total as i64);
        assert_eq!(page.data.len(), total);
        let last = &page.data[total - 1];
        assert_eq!(last.email, format!("u{:05}@example.com", total - 1));
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].title, format!("item {}", total - 1));
        assert!(page.data.iter().all(|u| u.num_items == 1 && u.items.len() == 1));
    }

    #[tokio::test]
    async fn test_get_multi_filters_and_orders() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        let mut admin = new_user("b@example.com", "x");
        admin.insert("is_superuser", true);
        users.create(admin).await.unwrap();
        users.create(new_user("a@example.com", "x")).await.unwrap();
        users.create(new_user("c@example.com", "x")).await.unwrap();

        let mut filter = FieldMap::new();
        filter.insert("is_superuser", false);
        let page = users
            .get_multi(&filter, Some("-email"), PageWindow::default())
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        let emails: Vec<&str> = page.data.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["c@example.com", "a@example.com"]);
    }

    #[tokio::test]
    async fn test_get_multi_rejects_unlisted_ordering() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_matches!(
            db.users()
                .get_multi(&FieldMap::new(), Some("email,-hashed_password"), PageWindow::default())
                .await,
            Err(RepositoryError::InvalidOrderingField(f)) if f == "hashed_password"
        );
    }

    #[tokio::test]
    async fn test_remove_returns_removed_user() {
        let db = Database::connect_in_memory().await.unwrap();
        let users = db.users();
        let user = users.create(new_user("a@example.com", "x")).await.unwrap();

        assert_eq!(users.remove(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(users.get(user.id).await.unwrap(), None);
        assert_eq!(users.remove(user.id).await.unwrap(), None);
    }
}
