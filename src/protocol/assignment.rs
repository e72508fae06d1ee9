//! Assignments and their submissions.
//!
//! Deadlines are server-local timestamps without offset, such as
//! `2025-03-01T23:59:00`. They are passed through as sent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{course::CoursePreview, user::User};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub deadline: Option<String>,

    #[serde(default)]
    pub total_points: f64,

    #[serde(default)]
    pub course: Option<CoursePreview>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateAssignment {
    pub title: String,
    pub description: String,
    pub deadline: String,
}

/// Partial assignment update; absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points: Option<f64>,

    /// Moves the assignment to another course.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Uuid>,
}

/// A student's answer to an assignment.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,

    #[serde(default)]
    pub submission_url: String,

    #[serde(default)]
    pub comment: Option<String>,

    /// Zero until graded.
    #[serde(default)]
    pub grade: f64,

    #[serde(default)]
    pub feedback: Option<String>,

    #[serde(default)]
    pub assignment: Option<Assignment>,

    #[serde(default)]
    pub user: Option<User>,
}

impl Submission {
    /// Whether a grader has responded. The backend reports an ungraded
    /// submission as grade zero without feedback.
    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.feedback.is_some() || self.grade > 0.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmission {
    pub submission_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub user_id: Uuid,
}

/// Partial submission update; absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Grade {
    pub grade: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}
