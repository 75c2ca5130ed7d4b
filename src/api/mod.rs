//! REST API routes
//!
//! Mounted under the configured API prefix, except the health probes which
//! sit at the root.

pub mod error;
pub mod extract;
pub mod health;
pub mod input;
pub mod items;
pub mod login;
pub mod users;

use serde::{Deserialize, Serialize};

use crate::db::query::{DEFAULT_LIMIT, PageWindow};

/// Ordering and pagination query parameters shared by list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Comma separated sort keys, `-` prefix for descending
    pub ordering: Option<String>,
    #[serde(default)]
    pub offset: u32,
    pub limit: Option<u32>,
}

impl ListParams {
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.offset, self.limit.unwrap_or(DEFAULT_LIMIT))
    }

    pub fn ordering(&self) -> Option<&str> {
        self.ordering.as_deref()
    }
}

/// Plain message body
#[derive(Debug, Serialize, Deserialize)]
pub struct Msg {
    pub msg: String,
}

impl Msg {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
