//! Enrollment: the request and approval flow, and direct enrollments.

use reqwest::Method;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::Result,
    protocol::{
        enrollment::{CreateEnrollment, Enrollment, EnrollmentRequest},
        Page, PageRequest,
    },
};

impl ApiClient {
    /// Asks to be enrolled in a course.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the user id cannot be resolved or the request
    /// is rejected, e.g. with `AlreadyExists` for a pending request.
    pub async fn request_enrollment(&self, course_id: Uuid) -> Result<EnrollmentRequest> {
        let user_id = self.current_user_id().await?;

        let mut request = self.request(
            Method::POST,
            &format!("/api/courses/{course_id}/enrollment-requests"),
        )?;
        request
            .inner_mut()
            .url_mut()
            .query_pairs_mut()
            .append_pair("userId", &user_id.to_string());

        self.fetch(request).await
    }

    /// Enrollment requests made by the signed-in user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the user id cannot be resolved or the request
    /// fails.
    pub async fn user_enrollment_requests(
        &self,
        page: PageRequest,
    ) -> Result<Page<EnrollmentRequest>> {
        let user_id = self.current_user_id().await?;
        self.get_page(&format!("/api/users/{user_id}/enrollment-requests"), page)
            .await
    }

    /// Enrollment requests for a course, for the course owners.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `PermissionDenied`.
    pub async fn course_enrollment_requests(
        &self,
        course_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<EnrollmentRequest>> {
        self.get_page(&format!("/api/courses/{course_id}/enrollment-requests"), page)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn accept_enrollment_request(&self, id: Uuid) -> Result<EnrollmentRequest> {
        let request = self.request(Method::POST, &format!("/api/enrollment-requests/{id}/accept"))?;
        self.fetch(request).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn reject_enrollment_request(&self, id: Uuid) -> Result<EnrollmentRequest> {
        let request = self.request(Method::POST, &format!("/api/enrollment-requests/{id}/reject"))?;
        self.fetch(request).await
    }

    /// Withdraws an enrollment request.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn cancel_enrollment_request(&self, id: Uuid) -> Result<EnrollmentRequest> {
        let request = self.request(Method::DELETE, &format!("/api/enrollment-requests/{id}"))?;
        self.fetch(request).await
    }

    /// Enrolls a user in a course directly, as the course owners do after
    /// accepting a request.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `AlreadyExists`
    /// for a user who is enrolled already.
    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let body = CreateEnrollment { user_id, course_id };
        self.post("/api/enrollments", &body).await
    }

    /// Enrollments, optionally narrowed to one user or one course.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn enrollments(
        &self,
        user_id: Option<Uuid>,
        course_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Enrollment>> {
        let mut request = self.request(Method::GET, "/api/enrollments")?;
        {
            let url = request.inner_mut().url_mut();
            if let Some(user_id) = user_id {
                url.query_pairs_mut()
                    .append_pair("userId", &user_id.to_string());
            }
            if let Some(course_id) = course_id {
                url.query_pairs_mut()
                    .append_pair("courseId", &course_id.to_string());
            }
        }

        self.fetch(request.page(page)).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn enrollment(&self, id: Uuid) -> Result<Enrollment> {
        self.get(&format!("/api/enrollments/{id}")).await
    }

    /// Removes a user from a course.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_enrollment(&self, id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/api/enrollments/{id}"))
            .await
    }
}
