//! Events emitted by the session.
//!
//! A front end listens to these to keep its view in step with the session:
//!
//! ```rust
//! use thryve::events::Event;
//!
//! fn handle_event(event: Event) {
//!     match event {
//!         Event::Navigate(path) => router.push(&path),
//!         Event::SessionExpired => banner.show("please sign in again"),
//!         Event::LoggedIn | Event::LoggedOut => menu.refresh(),
//!     }
//! }
//! ```

/// Events that can be emitted by the session and the auth flows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Tokens were stored after a successful login or registration.
    LoggedIn,

    /// Tokens were removed on request of the user.
    LoggedOut,

    /// A token refresh failed irrecoverably and the session was torn down.
    ///
    /// Always followed by a [`Navigate`](Self::Navigate) to the login entry
    /// point, unless the client was already there.
    SessionExpired,

    /// The client should show the page at this path.
    Navigate(String),
}
