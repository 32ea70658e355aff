//! Pagination parameters.

use serde::{Deserialize, Serialize};

/// A page of a listing: `size` items starting at page `number` (zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 0,
            size: Self::DEFAULT_SIZE,
        }
    }
}

impl Page {
    pub const DEFAULT_SIZE: usize = 100;
    pub const MAX_SIZE: usize = 1000;

    pub fn new(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    /// Items per page, capped at [`Page::MAX_SIZE`].
    pub fn limit(&self) -> usize {
        self.size.min(Self::MAX_SIZE)
    }

    /// Items to skip before this page, or `None` when a page that far out
    /// cannot exist.
    pub fn offset(&self) -> Option<usize> {
        self.number.checked_mul(self.limit())
    }
}
