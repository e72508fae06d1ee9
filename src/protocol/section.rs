//! Course sections.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "id": "2d9e...",
//!     "title": "Ownership",
//!     "textContent": "Every value has a single owner.",
//!     "orderNumber": 0,
//!     "resources": [{ "id": "...", "name": "The Book", "url": "https://..." }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::Resource;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub text_content: Option<String>,

    /// Position within the course, starting at zero.
    #[serde(default)]
    pub order_number: u32,

    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSection {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    pub order_number: u32,
}

/// Partial section update; absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_default_to_empty() {
        let section: Section = serde_json::from_value(serde_json::json!({
            "id": "2d9e4c1a-7b3f-4e5d-9a8c-1f0e2d3c4b5a",
            "title": "Ownership",
            "orderNumber": 2,
        }))
        .unwrap();

        assert_eq!(section.order_number, 2);
        assert_eq!(section.text_content, None);
        assert!(section.resources.is_empty());
    }
}
