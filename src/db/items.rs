//! Items repository
//!
//! Every item row is read joined with its owner, aliased `item` and `owner`,
//! so filters and orderings can address `owner__email` and friends.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::error::{RepositoryError, Result};
use super::query::{
    FieldDef, FieldMap, FieldValue, PageWindow, Paginated, TypeTag, build_filter, build_order,
    build_shape, to_arguments,
};
use super::sqlite_helpers::{now_iso8601, str_to_uuid};

const ROOT: &str = "item";

pub const ITEM_FILTER_FIELDS: &[FieldDef] = &[
    FieldDef::new("title", TypeTag::Str),
    FieldDef::new("description", TypeTag::Str),
    FieldDef::new("owner__id", TypeTag::Uuid),
    FieldDef::new("owner__full_name", TypeTag::Str),
    FieldDef::new("owner__email", TypeTag::Str),
];

pub const ITEM_ORDERING_FIELDS: &[&str] = &[
    "id",
    "title",
    "description",
    "owner__full_name",
    "owner__email",
];

/// Columns a caller may write; `owner_id` is set by the repository only.
pub const ITEM_SHAPE_FIELDS: &[FieldDef] = &[
    FieldDef::new("title", TypeTag::Str),
    FieldDef::new("description", TypeTag::Str),
];

const DEFAULT_ORDER: &str = "item.title, item.id";

const FROM_ITEMS: &str = "FROM items AS item JOIN users AS owner ON owner.id = item.owner_id";

const ITEM_COLUMNS: &str = "item.id, item.title, item.description, item.owner_id, \
     owner.email AS owner_email, owner.full_name AS owner_full_name, \
     item.created_at, item.updated_at";

// ============================================================================
// Records
// ============================================================================

/// Owner summary embedded in an item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NestedUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner: NestedUser,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating an item
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCreate {
    pub title: String,
    pub description: Option<String>,
}

impl ItemCreate {
    pub fn into_field_map(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("title", self.title);
        fields.insert_opt("description", self.description);
        fields
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    title: String,
    description: Option<String>,
    owner_id: String,
    owner_email: String,
    owner_full_name: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ItemRow> for ItemRecord {
    type Error = sqlx::Error;

    fn try_from(row: ItemRow) -> std::result::Result<Self, Self::Error> {
        Ok(ItemRecord {
            id: str_to_uuid(&row.id)?,
            title: row.title,
            description: row.description,
            owner: NestedUser {
                id: str_to_uuid(&row.owner_id)?,
                email: row.owner_email,
                full_name: row.owner_full_name,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

pub struct ItemsRepository {
    pool: SqlitePool,
}

impl ItemsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get item by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<ItemRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// List items matching `filter`, sorted by `ordering`, sliced by `window`.
    pub async fn get_multi(
        &self,
        filter: &FieldMap,
        ordering: Option<&str>,
        window: PageWindow,
    ) -> Result<Paginated<ItemRecord>> {
        let filter = build_filter(filter, ROOT, ITEM_FILTER_FIELDS)?;
        let order = match ordering.filter(|o| !o.is_empty()) {
            Some(ordering) => build_order(ordering, ROOT, ITEM_ORDERING_FIELDS)?.sql,
            None => DEFAULT_ORDER.to_string(),
        };

        let count_sql = format!("SELECT COUNT(*) {} WHERE {}", FROM_ITEMS, filter.sql);
        let page_sql = format!(
            "SELECT {} {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            ITEM_COLUMNS, FROM_ITEMS, filter.sql, order
        );
        let mut page_params = filter.params.clone();
        page_params.push(FieldValue::Int(window.limit()));
        page_params.push(FieldValue::Int(window.offset()));

        debug!(sql = %page_sql, "Executing item list query");

        let mut tx = self.pool.begin().await?;
        let count: i64 = sqlx::query_scalar_with(&count_sql, to_arguments(&filter.params)?)
            .fetch_one(&mut *tx)
            .await?;
        let rows: Vec<ItemRow> = sqlx::query_as_with(&page_sql, to_arguments(&page_params)?)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let data = rows
            .into_iter()
            .map(ItemRecord::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Paginated::new(count, data))
    }

    /// Create an item owned by `owner_id`
    pub async fn create(&self, fields: FieldMap, owner_id: Uuid) -> Result<ItemRecord> {
        let mut shape = build_shape(&fields, ITEM_SHAPE_FIELDS)?;

        let id = Uuid::new_v4();
        let now = now_iso8601();
        shape.push("id", id);
        shape.push("owner_id", owner_id);
        shape.push("created_at", now.clone());
        shape.push("updated_at", now);

        let sql = format!("INSERT INTO items {}", shape.insert_clause());
        debug!(sql = %sql, owner_id = %owner_id, "Creating item");

        let mut tx = self.pool.begin().await?;
        sqlx::query_with(&sql, to_arguments(shape.params())?)
            .execute(&mut *tx)
            .await?;
        let item = fetch_by_id(&mut tx, id)
            .await?
            .ok_or(RepositoryError::Backend(sqlx::Error::RowNotFound))?;
        tx.commit().await?;

        Ok(item)
    }

    /// Apply a partial update. An empty map reads the item back unchanged.
    pub async fn update(&self, id: Uuid, fields: FieldMap) -> Result<Option<ItemRecord>> {
        if fields.is_empty() {
            return self.get(id).await;
        }

        let mut shape = build_shape(&fields, ITEM_SHAPE_FIELDS)?;
        shape.push("updated_at", now_iso8601());

        let sql = format!("UPDATE items SET {} WHERE id = ?", shape.assignments());
        let mut params = shape.into_params();
        params.push(id.into());
        debug!(sql = %sql, "Updating item");

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query_with(&sql, to_arguments(&params)?)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let item = fetch_by_id(&mut tx, id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Delete an item, returning it as it was
    pub async fn remove(&self, id: Uuid) -> Result<Option<ItemRecord>> {
        let mut tx = self.pool.begin().await?;
        let Some(item) = fetch_by_id(&mut tx, id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(item))
    }
}

async fn fetch_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ItemRecord>> {
    let sql = format!("SELECT {} {} WHERE item.id = ?", ITEM_COLUMNS, FROM_ITEMS);
    let row: Option<ItemRow> = sqlx::query_as(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(ItemRecord::try_from).transpose()?)
}
