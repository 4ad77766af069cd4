//! Offset/limit pagination.

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not supply one
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    /// Rows per page
    pub limit: u32,
}

impl Pagination {
    /// Normalize raw query values: page below 1 becomes 1, a missing or zero limit
    /// becomes [`DEFAULT_PAGE_LIMIT`], and limits are capped at [`MAX_PAGE_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    /// Number of rows to skip. A page of zero reads as the first page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }

    /// Number of rows to return.
    pub fn limit(&self) -> usize {
        self.limit as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
