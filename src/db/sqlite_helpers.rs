//! SQLite helper utilities for type conversion
//!
//! SQLite has no native UUID or timestamp types. UUIDs are stored as
//! hyphenated TEXT and timestamps as RFC 3339 TEXT.

use chrono::Utc;
use uuid::Uuid;

// ============================================================================
// UUID Helpers
// ============================================================================

/// Parse a stored TEXT id back into a UUID.
///
/// Surfaces as a decode error since a malformed id means the row itself is bad.
#[inline]
pub fn str_to_uuid(s: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(s).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

// ============================================================================
// Timestamp Helpers
// ============================================================================

/// Current UTC timestamp as an RFC 3339 string
#[inline]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// Build a `?, ?, ?` placeholder list for an IN clause
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
