//! Protocol types for the Thryve REST API.
//!
//! This module contains the JSON contracts the client consumes, and the
//! parsing logic shared by all of them:
//!
//! # Submodules
//!
//! * [`auth`] - Login, registration and token refresh
//! * [`page`] - Pagination envelope and page requests
//! * [`user`] - User profiles
//! * [`course`] - Courses and course previews
//! * [`section`] - Course sections
//! * [`resource`] - Links attached to sections
//! * [`assignment`] - Assignments and submissions
//! * [`notification`] - Notifications
//! * [`enrollment`] - Enrollments and enrollment requests
//!
//! # Envelopes
//!
//! The backend answers either with the bare resource or wraps it as
//! `{"message": ..., "data": ...}` after a modification. [`Envelope`]
//! accepts both, so callers never sniff for `data` themselves:
//!
//! ```
//! use thryve::protocol;
//!
//! let user: User = protocol::json(&body, "users/me")?;
//! ```

pub mod assignment;
pub mod auth;
pub mod course;
pub mod enrollment;
pub mod notification;
pub mod page;
pub mod resource;
pub mod section;
pub mod user;

pub use page::{Page, PageRequest};

use std::fmt::Debug;

use serde::Deserialize;

use crate::error::{Error, Result};

/// A response body that is either `{"data": T, ...}` or a bare `T`.
#[derive(Clone, PartialEq, Eq, Deserialize, Debug)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// `T` nested under `data`, possibly next to a `message`
    Wrapped {
        data: T,
        #[serde(default)]
        message: Option<String>,
    },

    /// `T` as the whole body
    Bare(T),
}

impl<T> Envelope<T> {
    /// Unwraps the resource, whichever way it was sent.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data, .. } | Self::Bare(data) => data,
        }
    }
}

/// Parses and logs JSON responses from the Thryve API, unwrapping any
/// `data` envelope.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of API endpoint for logging
///
/// # Errors
///
/// Returns error if:
/// * Response body is not valid JSON
/// * JSON structure doesn't match type `T`, bare or wrapped
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
///
/// Bodies from the authentication endpoints carry credentials and are
/// never logged; only the origin and the error are.
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    let redact = redacts_body(origin);
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(result) => {
            if !redact {
                trace!("{origin}: {result:#?}");
            }
            Ok(result.into_inner())
        }
        Err(e) => {
            if redact {
                error!("{origin}: failed parsing response ({e})");
            } else if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Whether responses from `origin` must not be logged.
fn redacts_body(origin: &str) -> bool {
    origin.contains(auth::AUTH_PREFIX)
}

/// Reads a response, mapping error statuses to an [`Error`] and parsing
/// successful bodies with [`json`].
///
/// # Errors
///
/// Returns error if the status is not a success, the body cannot be read,
/// or it does not parse as `T`.
pub async fn parse<T>(response: reqwest::Response, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    let response = check(response).await?;
    let body = response.text().await?;
    json(&body, origin)
}

/// Passes successful responses through and turns the rest into an
/// [`Error`] carrying status and body.
///
/// # Errors
///
/// Returns error if the status is not a success.
pub async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // The body is informational only; failing to read it is not the error
    // to report.
    let body = response.text().await.unwrap_or_default();
    debug!("{status}: {body}");
    Err(Error::from_status(status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq, Eq)]
    struct Tokens {
        #[serde(rename = "accessToken")]
        access_token: String,
    }

    #[test]
    fn auth_bodies_are_not_logged() {
        assert!(redacts_body(auth::REFRESH));
        assert!(redacts_body("/thryve/api/auth/login"));
        assert!(!redacts_body("/api/courses"));
        assert!(!redacts_body(auth::REGISTER));

        let err = json::<Tokens>(r#"{"refreshToken":"secret"}"#, auth::REFRESH).unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn bare_and_wrapped_bodies() {
        let bare: Tokens = json(r#"{"accessToken":"a"}"#, "test").unwrap();
        let wrapped: Tokens = json(r#"{"data":{"accessToken":"a"}}"#, "test").unwrap();
        let with_message: Tokens =
            json(r#"{"message":"ok","data":{"accessToken":"a"}}"#, "test").unwrap();

        assert_eq!(bare, wrapped);
        assert_eq!(wrapped, with_message);
    }

    #[test]
    fn scalar_bodies() {
        let count: u64 = json("7", "unread-count").unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn mismatched_bodies_fail() {
        assert!(json::<Tokens>(r#"{"data":{}}"#, "test").is_err());
        assert!(json::<Tokens>("<html>", "test").is_err());
    }
}
