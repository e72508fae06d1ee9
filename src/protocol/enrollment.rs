//! Enrollments and enrollment requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{course::CoursePreview, user::User};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EnrollmentRequest {
    pub id: Uuid,
    pub user: User,
    pub course: CoursePreview,

    #[serde(default)]
    pub state: EnrollmentState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnrollmentState {
    #[default]
    Pending,
    Approved,
    Rejected,

    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        };
        write!(f, "{state}")
    }
}

/// Membership of a user in a course.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub user: User,
    pub course: CoursePreview,

    #[serde(default)]
    pub enrollment_type: EnrollmentType,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnrollmentType {
    #[default]
    Student,

    /// A type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Direct enrollment, bypassing the request flow. Enrolls as a student.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollment {
    pub user_id: Uuid,
    pub course_id: Uuid,
}
