//! Pagination.
//!
//! Listing endpoints answer with a Spring Data page:
//!
//! ```json
//! {
//!     "content": [...],
//!     "number": 0,
//!     "size": 10,
//!     "totalElements": 42,
//!     "totalPages": 5,
//!     "first": true,
//!     "last": false
//! }
//! ```
//!
//! Other fields the backend adds (`pageable`, `sort`, ...) are ignored.

use serde::{Deserialize, Serialize};
use url::Url;

/// One page of a listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,

    /// Zero-based index of this page
    #[serde(default)]
    pub number: u64,

    /// Requested page size
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub total_elements: u64,

    #[serde(default)]
    pub total_pages: u64,

    #[serde(default)]
    pub first: bool,

    #[serde(default)]
    pub last: bool,
}

impl<T> Page<T> {
    /// The request for the page after this one, unless this is the last.
    #[must_use]
    pub fn next(&self) -> Option<PageRequest> {
        if self.last || self.number.saturating_add(1) >= self.total_pages {
            return None;
        }

        Some(PageRequest {
            page_number: self.number + 1,
            page_size: self.size,
        })
    }
}

/// Query parameters selecting a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_number: u64,
    pub page_size: u64,
}

impl PageRequest {
    #[must_use]
    pub fn new(page_number: u64, page_size: u64) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Appends `pageNumber` and `pageSize` to the query of `url`.
    pub fn apply(&self, url: &mut Url) {
        url.query_pairs_mut()
            .append_pair("pageNumber", &self.page_number.to_string())
            .append_pair("pageSize", &self.page_size.to_string());
    }
}

/// The first page with the backend's default size of 10.
impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_page() {
        let page: Page<u32> = serde_json::from_value(serde_json::json!({
            "content": [1, 2],
            "number": 0,
            "size": 2,
            "totalElements": 3,
            "totalPages": 2,
            "first": true,
            "last": false,
            "pageable": { "pageNumber": 0 },
        }))
        .unwrap();

        assert_eq!(page.content, [1, 2]);
        assert_eq!(page.next(), Some(PageRequest::new(1, 2)));
    }

    #[test]
    fn last_page_has_no_next() {
        let page: Page<u32> = serde_json::from_value(serde_json::json!({
            "content": [3],
            "number": 1,
            "size": 2,
            "totalElements": 3,
            "totalPages": 2,
            "first": false,
            "last": true,
        }))
        .unwrap();

        assert_eq!(page.next(), None);
    }

    #[test]
    fn query_parameters() {
        let mut url: Url = "http://localhost/api/courses".parse().unwrap();
        PageRequest::new(2, 25).apply(&mut url);
        assert_eq!(url.query(), Some("pageNumber=2&pageSize=25"));
    }
}
