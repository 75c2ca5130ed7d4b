//! Offset pagination for list queries

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not ask for one
pub const DEFAULT_LIMIT: u32 = 100;

/// Offset/limit window applied after filtering and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.offset)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(0, DEFAULT_LIMIT)
    }
}

/// A page of entities plus the number of matches before slicing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    pub count: i64,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(count: i64, data: Vec<T>) -> Self {
        Self { count, data }
    }
}
