//! Typed Thryve endpoints and the authentication flows.
//!
//! Every helper goes through [`ApiClient::execute`], so expired tokens are
//! refreshed and `401 Unauthorized` answers are retried without the caller
//! noticing.
//!
//! ```rust
//! let client = ApiClient::new(config, store, navigator)?;
//! client.login("ana@thryve.local", "secret").await?;
//!
//! let page = client.courses(PageRequest::default()).await?;
//! for course in page.content {
//!     println!("{}", course.title);
//! }
//! ```

mod assignment;
mod course;
mod enrollment;

use reqwest::Method;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::{Error, Result},
    events::Event,
    protocol::{
        auth::{self, LoginRequest, RegisterRequest, TokenPair},
        notification::Notification,
        user::{UpdateUser, User},
        Page, PageRequest,
    },
    store::USER_ID,
};

/// Page a deleted account is sent to.
const REGISTER_PAGE: &str = "/register";

impl ApiClient {
    /// Signs in with `email` and `password` and stores the returned tokens.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the credentials are rejected (`Unauthenticated`)
    /// - the response carries no access token
    /// - the tokens cannot be stored
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let body = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let pair: TokenPair = self.post(auth::LOGIN, &body).await?;

        let access = pair
            .access_token
            .filter(|access| !access.is_empty())
            .ok_or_else(|| Error::unauthenticated("no access token in login response"))?;

        let store = self.session().store();
        store.remove(USER_ID)?;
        store.set_tokens(&access, pair.refresh_token.as_deref())?;

        info!("signed in as {email}");
        self.session().navigator().notify(Event::LoggedIn);
        Ok(())
    }

    /// Creates an account and signs in with it.
    ///
    /// Returns the id of the new user if the backend reported one; it is
    /// cached as the current user id.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the registration or the subsequent
    /// [`login`](Self::login) fails.
    pub async fn register(&self, registration: &RegisterRequest) -> Result<Option<Uuid>> {
        let created: serde_json::Value = self.post(auth::REGISTER, registration).await?;
        let id = created
            .get("id")
            .and_then(serde_json::Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok());

        self.login(&registration.email, &registration.password)
            .await?;

        if let Some(id) = id {
            self.session().store().set_user_id(&id.to_string())?;
        }
        Ok(id)
    }

    /// Signs out by dropping the session.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the session cannot be removed from storage.
    pub fn logout(&self) -> Result<()> {
        self.session().store().clear_tokens()?;

        info!("signed out");
        self.session().navigator().notify(Event::LoggedOut);
        Ok(())
    }

    /// Id of the signed-in user, from cache or `/api/users/me`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the id is not cached and cannot be fetched.
    pub async fn current_user_id(&self) -> Result<Uuid> {
        if let Some(id) = self.session().store().user_id() {
            match Uuid::parse_str(&id) {
                Ok(id) => return Ok(id),
                Err(e) => warn!("ignoring cached user id {id}: {e}"),
            }
        }

        self.me().await.map(|user| user.id)
    }

    /// Profile of the signed-in user. Caches its id.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn me(&self) -> Result<User> {
        let user: User = self.get("/api/users/me").await?;
        self.session().store().set_user_id(&user.id.to_string())?;
        Ok(user)
    }

    /// Updates the profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the user id cannot be resolved or the update is
    /// rejected.
    pub async fn update_me(&self, update: &UpdateUser) -> Result<User> {
        let id = self.current_user_id().await?;
        self.patch(&format!("/api/users/{id}"), update).await
    }

    /// Deletes the account of the signed-in user and ends the session.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the user id cannot be resolved or the deletion
    /// is rejected. The session is kept in that case.
    pub async fn delete_me(&self) -> Result<()> {
        let id = self.current_user_id().await?;
        self.send_empty(Method::DELETE, &format!("/api/users/{id}"))
            .await?;

        self.logout()?;
        self.session().navigator().navigate(REGISTER_PAGE);
        Ok(())
    }

    /// Notifications of the signed-in user, newest first.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn notifications(&self, page: PageRequest) -> Result<Page<Notification>> {
        self.get_page("/api/notifications/me", page).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn unread_count(&self) -> Result<u64> {
        self.get("/api/notifications/me/unread-count").await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn mark_notification_read(&self, id: Uuid) -> Result<Notification> {
        let request = self.request(Method::POST, &format!("/api/notifications/{id}/read"))?;
        self.fetch(request).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn delete_notification(&self, id: Uuid) -> Result<Notification> {
        let request = self.request(Method::DELETE, &format!("/api/notifications/{id}"))?;
        self.fetch(request).await
    }

    /// Deletes all notifications of the signed-in user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails.
    pub async fn clear_notifications(&self) -> Result<()> {
        self.send_empty(Method::DELETE, "/api/notifications/me")
            .await
    }

}
