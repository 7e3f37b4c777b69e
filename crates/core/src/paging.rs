//! List paging and free-text search over read models.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// Requested page of a list. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
        }
    }
}

impl PageRequest {
    /// Build a request from raw query values, clamping out-of-range input
    /// instead of rejecting it (page 0 is page 1, per_page is kept in 1..=100).
    pub fn new(page: Option<u32>, per_page: Option<u32>, search: Option<String>, default_per_page: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);
        Self { page, per_page, search }
    }

    /// Trimmed, lowercased search term; `None` when absent or blank.
    pub fn term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1).saturating_mul(self.per_page.max(1) as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Text fields a list row can be searched by.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    fn matches(&self, term: &str) -> bool {
        self.search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(term))
    }
}

/// Filter `items` by the request's search term, then cut out the requested page.
///
/// Ordering is the caller's responsibility.
pub fn paginate<T: Searchable>(items: Vec<T>, req: &PageRequest) -> Page<T> {
    let per_page = req.per_page.clamp(1, MAX_PER_PAGE);
    let page = req.page.max(1);

    let filtered: Vec<T> = match req.term() {
        Some(term) => items.into_iter().filter(|item| item.matches(&term)).collect(),
        None => items,
    };

    let total = filtered.len() as u64;
    let total_pages = total.div_ceil(per_page as u64);
    let normalized = PageRequest {
        page,
        per_page,
        search: None,
    };

    let items = filtered
        .into_iter()
        .skip(normalized.offset())
        .take(per_page as usize)
        .collect();

    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}
