//! Table definitions
//!
//! Tables are created if missing on startup; there is no migration history.

use sqlx::SqlitePool;
use tracing::info;

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT,
    hashed_password TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

pub const CREATE_ITEMS: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

pub const CREATE_ITEMS_OWNER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_items_owner_id ON items(owner_id)";

/// Create every table and index that does not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in [CREATE_USERS, CREATE_ITEMS, CREATE_ITEMS_OWNER_INDEX] {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(service = "database", "Schema ensured");
    Ok(())
}
