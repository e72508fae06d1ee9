//! Authentication request and response types.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "accessToken": "eyJhbGciOiJIUzI1NiJ9...",
//!     "refreshToken": "eyJhbGciOiJIUzI1NiJ9..."
//! }
//! ```
//!
//! Either token may be missing from a refresh response; the refresh token
//! is only sent when the backend rotates it.

use serde::{Deserialize, Serialize};
use veil::Redact;

/// Prefix of every authentication endpoint.
pub const AUTH_PREFIX: &str = "/api/auth/";

/// Exchanges credentials for a token pair.
pub const LOGIN: &str = "/api/auth/login";

/// Exchanges a refresh token for a new access token.
pub const REFRESH: &str = "/api/auth/refresh-token";

/// Creates a user account when called with `POST`.
pub const REGISTER: &str = "/api/users";

#[derive(Clone, Eq, PartialEq, Serialize, Redact)]
pub struct LoginRequest {
    pub email: String,

    #[redact]
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Serialize, Redact)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,

    #[redact]
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Serialize, Redact)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[redact]
    pub refresh_token: String,
}

/// Tokens as returned by the login and refresh endpoints.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Redact)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(default)]
    #[redact]
    pub access_token: Option<String>,

    #[serde(default)]
    #[redact]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;

    #[test]
    fn tokens_never_show_in_debug_output() {
        let pair = TokenPair {
            access_token: Some("secret-access".to_owned()),
            refresh_token: Some("secret-refresh".to_owned()),
        };
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn refresh_without_rotation() {
        let pair: TokenPair = protocol::json(r#"{"data":{"accessToken":"a"}}"#, "refresh").unwrap();
        assert_eq!(pair.access_token.as_deref(), Some("a"));
        assert_eq!(pair.refresh_token, None);
    }

    #[test]
    fn request_wire_names() {
        let body = serde_json::to_value(RefreshTokenRequest {
            refresh_token: "r".to_owned(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "refreshToken": "r" }));
    }
}
