//! Assignments and submissions.

use reqwest::Method;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::Result,
    protocol::{
        assignment::{
            Assignment, CreateAssignment, CreateSubmission, Grade, Submission, UpdateAssignment,
            UpdateSubmission,
        },
        Page, PageRequest,
    },
};

impl ApiClient {
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn assignments(
        &self,
        course_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Assignment>> {
        self.get_page(&format!("/api/courses/{course_id}/assignments"), page)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `InvalidArgument`
    /// for a description shorter than 10 characters.
    pub async fn create_assignment(
        &self,
        course_id: Uuid,
        assignment: &CreateAssignment,
    ) -> Result<Assignment> {
        self.post(&format!("/api/courses/{course_id}/assignments"), assignment)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn update_assignment(
        &self,
        id: Uuid,
        update: &UpdateAssignment,
    ) -> Result<Assignment> {
        self.patch(&format!("/api/assignments/{id}"), update).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_assignment(&self, id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/api/assignments/{id}"))
            .await
    }

    /// Submissions for an assignment, for graders.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn submissions(
        &self,
        assignment_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Submission>> {
        self.get_page(&format!("/api/assignments/{assignment_id}/submissions"), page)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn submission(&self, id: Uuid) -> Result<Submission> {
        self.get(&format!("/api/submissions/{id}")).await
    }

    /// Hands in `submission_url` for an assignment as the signed-in user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the user id cannot be resolved or the request
    /// fails.
    pub async fn submit(
        &self,
        assignment_id: Uuid,
        submission_url: &str,
        comment: Option<&str>,
    ) -> Result<Submission> {
        let body = CreateSubmission {
            submission_url: submission_url.to_owned(),
            comment: comment.map(ToOwned::to_owned),
            user_id: self.current_user_id().await?,
        };

        self.post(&format!("/api/assignments/{assignment_id}/submissions"), &body)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn update_submission(
        &self,
        id: Uuid,
        update: &UpdateSubmission,
    ) -> Result<Submission> {
        self.patch(&format!("/api/submissions/{id}"), update).await
    }

    /// Grades a submission, with optional feedback for the student.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `InvalidArgument`
    /// for a negative grade.
    pub async fn grade_submission(&self, id: Uuid, grade: &Grade) -> Result<Submission> {
        self.patch(&format!("/api/submissions/{id}/grade"), grade)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_submission(&self, id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/api/submissions/{id}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{access_token, client, user, COURSE, USER};
    use super::*;
    use crate::{error::ErrorKind, store::TokenStore};

    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    const ASSIGNMENT: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";
    const SUBMISSION: &str = "7e6d5c4b-3a29-4180-9f8e-7d6c5b4a3928";

    fn assignment() -> serde_json::Value {
        serde_json::json!({
            "id": ASSIGNMENT,
            "title": "Borrow checker",
            "description": "Fix the lifetimes in the linked list.",
            "deadline": "2025-03-01T23:59:00",
            "totalPoints": 10.0,
            "course": { "id": COURSE, "title": "Rust" },
        })
    }

    fn submission(grade: f64, feedback: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "id": SUBMISSION,
            "submissionUrl": "https://git.example/ana/list",
            "comment": "done",
            "grade": grade,
            "feedback": feedback,
            "assignment": assignment(),
            "user": user(),
        })
    }

    #[tokio::test]
    async fn assignments_of_a_course() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/courses/{COURSE}/assignments")))
            .and(query_param("pageNumber", "0"))
            .and(query_param("pageSize", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [assignment()],
                "number": 0,
                "size": 10,
                "totalElements": 1,
                "totalPages": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server);
        store.set_tokens(&access_token(), Some("refresh")).unwrap();

        let page = client
            .assignments(COURSE.parse().unwrap(), PageRequest::default())
            .await
            .unwrap();
        let assignment = &page.content[0];
        assert_eq!(assignment.deadline.as_deref(), Some("2025-03-01T23:59:00"));
        assert!((assignment.total_points - 10.0).abs() < f64::EPSILON);
        assert_eq!(assignment.course.as_ref().map(|c| c.title.as_str()), Some("Rust"));
    }

    #[tokio::test]
    async fn short_description_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/api/courses/{COURSE}/assignments")))
            .and(body_json(serde_json::json!({
                "title": "Borrow checker",
                "description": "short",
                "deadline": "2025-03-01T23:59:00",
            })))
            .respond_with(ResponseTemplate::new(400).set_body_string("Description must be between 10 and 1000 characters long!"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server);
        store.set_tokens(&access_token(), Some("refresh")).unwrap();

        let err = client
            .create_assignment(
                COURSE.parse().unwrap(),
                &CreateAssignment {
                    title: "Borrow checker".to_owned(),
                    description: "short".to_owned(),
                    deadline: "2025-03-01T23:59:00".to_owned(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn submit_as_current_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/api/assignments/{ASSIGNMENT}/submissions")))
            .and(body_json(serde_json::json!({
                "submissionUrl": "https://git.example/ana/list",
                "comment": "done",
                "userId": USER,
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "message": "Submission created successfully!",
                "data": submission(0.0, None),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server);
        store.set_tokens(&access_token(), Some("refresh")).unwrap();
        store.set_user_id(USER).unwrap();

        let submission = client
            .submit(
                ASSIGNMENT.parse().unwrap(),
                "https://git.example/ana/list",
                Some("done"),
            )
            .await
            .unwrap();
        assert!(!submission.is_graded());
        assert_eq!(submission.user.map(|u| u.username).as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn grade_with_feedback() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("/api/submissions/{SUBMISSION}/grade")))
            .and(body_json(serde_json::json!({ "grade": 8.5, "feedback": "Nice" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Submission updated successfully!",
                "data": submission(8.5, Some("Nice")),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server);
        store.set_tokens(&access_token(), Some("refresh")).unwrap();

        let graded = client
            .grade_submission(
                SUBMISSION.parse().unwrap(),
                &Grade {
                    grade: 8.5,
                    feedback: Some("Nice".to_owned()),
                },
            )
            .await
            .unwrap();
        assert!(graded.is_graded());
        assert_eq!(graded.feedback.as_deref(), Some("Nice"));
    }

    #[tokio::test]
    async fn submissions_for_graders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/assignments/{ASSIGNMENT}/submissions")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [submission(0.0, None)],
                "number": 0,
                "size": 10,
                "totalElements": 11,
                "totalPages": 2,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/api/submissions/{SUBMISSION}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message": "deleted" })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server);
        store.set_tokens(&access_token(), Some("refresh")).unwrap();

        let page = client
            .submissions(ASSIGNMENT.parse().unwrap(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.next(), Some(PageRequest::new(1, 10)));

        client.delete_submission(page.content[0].id).await.unwrap();
    }
}
