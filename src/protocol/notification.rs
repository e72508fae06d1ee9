//! Notifications.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "id": "5b0c...",
//!     "title": "Enrollment accepted",
//!     "message": "You can now access Rust 101",
//!     "read": false,
//!     "createdAt": "2025-03-01T12:00:00",
//!     "sender": { "id": "...", "username": "mentor" },
//!     "course": { "id": "...", "title": "Rust 101" }
//! }
//! ```

use serde::Deserialize;
use uuid::Uuid;

use super::{course::CoursePreview, user::User};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub read: bool,

    /// Server-local timestamp without offset, passed through as sent.
    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub sender: Option<User>,

    #[serde(default)]
    pub course: Option<CoursePreview>,
}
