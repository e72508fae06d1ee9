//! Courses and their content: sections and the resources attached to them.

use reqwest::Method;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::Result,
    protocol::{
        course::{Course, CreateCourse, UpdateCourse},
        resource::{CreateResource, Resource, UpdateResource},
        section::{CreateSection, Section, UpdateSection},
        Page, PageRequest,
    },
};

impl ApiClient {
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn courses(&self, page: PageRequest) -> Result<Page<Course>> {
        self.get_page("/api/courses", page).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `NotFound`.
    pub async fn course(&self, id: Uuid) -> Result<Course> {
        self.get(&format!("/api/courses/{id}")).await
    }

    /// Creates a course owned by the signed-in user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `InvalidArgument`
    /// for a title outside of 2 to 100 characters.
    pub async fn create_course(&self, course: &CreateCourse) -> Result<Course> {
        self.post("/api/courses", course).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn update_course(&self, id: Uuid, update: &UpdateCourse) -> Result<Course> {
        self.patch(&format!("/api/courses/{id}"), update).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_course(&self, id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/api/courses/{id}"))
            .await
    }

    /// Sections of a course, each with its resources.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn sections(&self, course_id: Uuid, page: PageRequest) -> Result<Page<Section>> {
        self.get_page(&format!("/api/courses/{course_id}/sections"), page)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn section(&self, id: Uuid) -> Result<Section> {
        self.get(&format!("/api/sections/{id}")).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn create_section(&self, course_id: Uuid, section: &CreateSection) -> Result<Section> {
        self.post(&format!("/api/courses/{course_id}/sections"), section)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn update_section(&self, id: Uuid, update: &UpdateSection) -> Result<Section> {
        self.patch(&format!("/api/sections/{id}"), update).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_section(&self, id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/api/sections/{id}"))
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn section_resources(
        &self,
        section_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Resource>> {
        self.get_page(&format!("/api/sections/{section_id}/resources"), page)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn resource(&self, id: Uuid) -> Result<Resource> {
        self.get(&format!("/api/resources/{id}")).await
    }

    /// Attaches a link to a section.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, e.g. with `InvalidArgument`
    /// for a URL that is not `http` or `https`.
    pub async fn create_resource(
        &self,
        section_id: Uuid,
        resource: &CreateResource,
    ) -> Result<Resource> {
        self.post(&format!("/api/sections/{section_id}/resources"), resource)
            .await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn update_resource(&self, id: Uuid, update: &UpdateResource) -> Result<Resource> {
        self.patch(&format!("/api/resources/{id}"), update).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_resource(&self, id: Uuid) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/api/resources/{id}"))
            .await
    }
}
