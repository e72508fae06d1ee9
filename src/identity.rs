//! Role and identity derivation from the access token.
//!
//! An [`Identity`] is a snapshot computed from one token. Tokens change on
//! refresh, so derive a fresh one per check rather than caching it:
//!
//! ```rust
//! let identity = client.session().identity();
//! if identity.has_any_role(["creator", "admin"]) {
//!     // show course management
//! }
//! ```

use std::{collections::BTreeSet, time::Duration};

use crate::{token, util};

/// Who the current token says the user is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    subject: Option<String>,
    authenticated: bool,
    roles: BTreeSet<String>,
}

/// Normalizes a role name: upper case, without a `ROLE_` prefix.
///
/// Returns `None` for names that are empty after normalization.
#[must_use]
pub fn normalize_role(role: &str) -> Option<String> {
    let upper = role.trim().to_uppercase();
    let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
    (!name.is_empty()).then(|| name.to_owned())
}

impl Identity {
    /// Derives the identity of `token` at `now` (epoch seconds).
    #[must_use]
    pub fn from_token_at(token: Option<&str>, skew: Duration, now: u64) -> Self {
        let authenticated = !token::is_expired_at(token, skew, now);
        let Some(claims) = token.and_then(token::decode) else {
            return Self {
                authenticated,
                ..Self::default()
            };
        };

        Self {
            subject: claims.sub.clone(),
            authenticated,
            roles: claims.grants.names().filter_map(normalize_role).collect(),
        }
    }

    /// Derives the identity of `token` right now.
    #[must_use]
    pub fn from_token(token: Option<&str>, skew: Duration) -> Self {
        Self::from_token_at(token, skew, util::now_from_epoch())
    }

    /// A token is present and not expired.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The `sub` claim, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Normalized role names.
    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Whether any of `wanted` is among the roles, ignoring case and a
    /// `ROLE_` prefix on either side.
    pub fn has_any_role<I, S>(&self, wanted: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        wanted
            .into_iter()
            .filter_map(|role| normalize_role(role.as_ref()))
            .any(|role| self.roles.contains(&role))
    }
}
