//! Offset pagination utilities.

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not supply `limit`.
pub const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on `limit`.
pub const MAX_LIMIT: i64 = 100;

/// Raw pagination query parameters as they arrive on the wire.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Normalized pagination window.
///
/// `limit` is always within `1..=MAX_LIMIT` and `offset` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub limit: i64,
    pub offset: i64,
}

impl PageParams {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        let offset = offset.unwrap_or(0).max(0);
        Self { limit, offset }
    }

    /// Applies the window to an already sorted in-memory list.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = (self.offset as usize).min(items.len());
        let end = start.saturating_add(self.limit as usize).min(items.len());
        items[start..end].to_vec()
    }
}

impl From<PageQuery> for PageParams {
    fn from(q: PageQuery) -> Self {
        Self::new(q.limit, q.offset)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata returned in the `meta` block of list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl PageMeta {
    pub fn new(params: PageParams, total: i64) -> Self {
        Self {
            total,
            limit: params.limit,
            offset: params.offset,
            has_more: params.offset + params.limit < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = PageParams::new(None, None);
        assert_eq!(p.limit, 50);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(PageParams::new(Some(500), None).limit, 100);
        assert_eq!(PageParams::new(Some(100), None).limit, 100);
        assert_eq!(PageParams::new(Some(7), None).limit, 7);
    }

    #[test]
    fn test_non_positive_limit_falls_back_to_default() {
        assert_eq!(PageParams::new(Some(0), None).limit, DEFAULT_LIMIT);
        assert_eq!(PageParams::new(Some(-3), None).limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_negative_offset_clamped() {
        assert_eq!(PageParams::new(None, Some(-10)).offset, 0);
    }

    #[test]
    fn test_slice_window() {
        let items: Vec<i32> = (0..10).collect();
        let p = PageParams::new(Some(3), Some(4));
        assert_eq!(p.slice(&items), vec![4, 5, 6]);
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let items: Vec<i32> = (0..5).collect();
        let p = PageParams::new(Some(3), Some(9));
        assert!(p.slice(&items).is_empty());
    }

    #[test]
    fn test_slice_truncates_at_end() {
        let items: Vec<i32> = (0..5).collect();
        let p = PageParams::new(Some(3), Some(3));
        assert_eq!(p.slice(&items), vec![3, 4]);
    }

    #[test]
    fn test_meta_has_more() {
        let p = PageParams::new(Some(10), Some(0));
        assert!(PageMeta::new(p, 11).has_more);
        assert!(!PageMeta::new(p, 10).has_more);
    }

    #[test]
    fn test_from_query() {
        let q = PageQuery {
            limit: Some(20),
            offset: Some(40),
        };
        let p: PageParams = q.into();
        assert_eq!(p, PageParams { limit: 20, offset: 40 });
    }
}
