//! Page-based pagination.

use serde::{Deserialize, Serialize};

/// A 1-based page request.
///
/// `skip` is the page number and `limit` the page size, so page 3 of size 20
/// starts at row 40. Page 0 is treated as page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Page {
    pub const fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// Rows to skip before this page.
    pub const fn offset(&self) -> u64 {
        self.skip.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 1, limit: 20 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(Page::new(1, 20).offset(), 0);
        assert_eq!(Page::new(3, 20).offset(), 40);
        assert_eq!(Page::new(0, 20).offset(), 0);
        assert_eq!(Page::new(u64::MAX, u64::MAX).offset(), u64::MAX);
    }

    #[test]
    fn test_deserialize_from_query_shape() {
        let page: Page = serde_json::from_str(r#"{"skip": 2, "limit": 5}"#).unwrap();
        assert_eq!(page, Page::new(2, 5));
        assert_eq!(page.offset(), 5);
    }
}
