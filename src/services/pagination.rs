//! Page arithmetic for queue listings.
//!
//! Listings are newest-first, five entries per page. Requests for page 0,
//! negative pages, or pages past the end (other than an empty first page)
//! are reported as not found rather than silently clamped.

use serde::Serialize;

pub const PER_PAGE: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("page {0} out of range")]
pub struct PageOutOfRange(pub i64);

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// Build from the optional `?page=` query parameter. Missing means page 1.
    ///
    /// # Errors
    ///
    /// Returns `PageOutOfRange` for pages below 1.
    pub fn parse(page: Option<i64>) -> Result<Self, PageOutOfRange> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(PageOutOfRange(page));
        }
        Ok(Self { page, per_page: PER_PAGE })
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<i64>,
    pub next_num: Option<i64>,
    /// Page links with `null` marking elided runs.
    pub iter_pages: Vec<Option<i64>>,
}

impl<T> Page<T> {
    /// Assemble a page from a fetched slice and the total row count.
    ///
    /// # Errors
    ///
    /// Returns `PageOutOfRange` when a page beyond the first has no rows.
    pub fn new(request: PageRequest, items: Vec<T>, total: i64) -> Result<Self, PageOutOfRange> {
        if items.is_empty() && request.page != 1 {
            return Err(PageOutOfRange(request.page));
        }
        let pages = page_count(total, request.per_page);
        let has_prev = request.page > 1;
        let has_next = request.page < pages;
        Ok(Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| request.page - 1),
            next_num: has_next.then(|| request.page + 1),
            iter_pages: iter_pages(request.page, pages, 1, 1, 2, 1),
        })
    }
}

#[must_use]
pub fn page_count(total: i64, per_page: i64) -> i64 {
    if total <= 0 || per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

/// Page numbers for a pager widget.
///
/// Shows `left_edge` pages at the start, `left_current` before and
/// `right_current` after the current page (current included in the latter
/// count), and `right_edge` pages at the end. Gaps are `None`.
#[must_use]
pub fn iter_pages(
    current: i64,
    pages: i64,
    left_edge: i64,
    left_current: i64,
    right_current: i64,
    right_edge: i64,
) -> Vec<Option<i64>> {
    let mut out = Vec::new();
    let mut last = 0;
    for num in 1..=pages {
        let visible = num <= left_edge
            || (num >= current - left_current && num < current + right_current)
            || num > pages - right_edge;
        if visible {
            if last + 1 != num {
                out.push(None);
            }
            out.push(Some(num));
            last = num;
        }
    }
    out
}

#[cfg(test)]
#[path = "pagination_test.rs"]
mod tests;
