//! Compact token inspection.
//!
//! Access and refresh tokens are opaque to this client except for their
//! payload segment: the middle of three dot-separated segments, holding a
//! base64url-encoded JSON object. [`decode`] turns that segment into typed
//! [`Claims`] once, at the boundary. A token that cannot be decoded has no
//! usable claims; that is never an error.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use thryve::token;
//!
//! if let Some(claims) = token::decode(&access_token) {
//!     println!("signed in as {:?}", claims.sub);
//! }
//!
//! let stale = token::is_expired(Some(&access_token), Duration::from_secs(30));
//! ```

use std::time::Duration;

use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::Deserialize;
use serde_with::{serde_as, DefaultOnError, VecSkipError};

use crate::util;

/// Claims relevant to the client, decoded from a token payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Claims {
    /// Subject, the user's email address for Thryve tokens.
    pub sub: Option<String>,

    /// Expiry in seconds since the epoch. Tokens without it do not expire.
    pub exp: Option<i64>,

    /// Authorization claim in whichever shape the issuer used.
    pub grants: Grants,
}

/// The authorization claim of a token.
///
/// Issuers put roles in different places. The first shape present wins, in
/// this order: `roles`, `authorities`, `scope`, `role`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Grants {
    /// `"roles": ["ROLE_ADMIN", ...]`
    Roles(Vec<String>),

    /// `"authorities": ["ROLE_ADMIN", {"authority": "ROLE_CREATOR"}, ...]`
    Authorities(Vec<String>),

    /// `"scope": "admin creator"`
    Scope(String),

    /// `"role": "ADMIN"`
    Role(String),

    #[default]
    None,
}

impl Grants {
    /// Raw grant names, not yet normalized.
    pub fn names(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Roles(names) | Self::Authorities(names) => {
                Box::new(names.iter().map(String::as_str))
            }
            Self::Scope(scope) => Box::new(scope.split_whitespace()),
            Self::Role(role) => Box::new(std::iter::once(role.as_str())),
            Self::None => Box::new(std::iter::empty()),
        }
    }
}

/// List element of a `roles` or `authorities` claim.
///
/// Spring-style issuers serialize granted authorities as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum Grant {
    Name(String),
    Object {
        #[serde(alias = "authority")]
        name: String,
    },
}

impl From<Grant> for String {
    fn from(grant: Grant) -> Self {
        match grant {
            Grant::Name(name) | Grant::Object { name } => name,
        }
    }
}

/// NumericDate of an `exp` claim: integer or fractional seconds, possibly
/// quoted.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

impl NumericDate {
    /// Whole seconds, rounded down. Non-finite values have none.
    fn seconds(&self) -> Option<i64> {
        #[allow(clippy::cast_possible_truncation)]
        let floor = |secs: f64| secs.is_finite().then(|| secs.floor() as i64);

        match self {
            Self::Seconds(secs) => Some(*secs),
            Self::Fractional(secs) => floor(*secs),
            Self::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(floor))
            }
        }
    }
}

/// Payload as it appears on the wire.
///
/// Every field tolerates a wrong type by falling back to "absent", so that
/// one odd claim does not hide the others.
#[serde_as]
#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    sub: Option<String>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    exp: Option<NumericDate>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<VecSkipError<_>>>")]
    roles: Option<Vec<Grant>>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<VecSkipError<_>>>")]
    authorities: Option<Vec<Grant>>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    scope: Option<String>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    role: Option<String>,
}

impl From<Payload> for Claims {
    fn from(payload: Payload) -> Self {
        let Payload {
            sub,
            exp,
            roles,
            authorities,
            scope,
            role,
        } = payload;

        let into_names =
            |grants: Vec<Grant>| -> Vec<String> { grants.into_iter().map(String::from).collect() };

        let grants = match (roles, authorities, scope, role) {
            (Some(roles), ..) => Grants::Roles(into_names(roles)),
            (None, Some(authorities), ..) => Grants::Authorities(into_names(authorities)),
            (None, None, Some(scope), _) => Grants::Scope(scope),
            (None, None, None, Some(role)) => Grants::Role(role),
            (None, None, None, None) => Grants::None,
        };

        Self {
            sub,
            exp: exp.as_ref().and_then(NumericDate::seconds),
            grants,
        }
    }
}

impl Claims {
    /// Whether these claims are expired at `now` (epoch seconds), with
    /// `skew` subtracted from the expiry.
    #[must_use]
    pub fn is_expired_at(&self, skew: Duration, now: u64) -> bool {
        let Some(exp) = self.exp else {
            return false;
        };

        let skew = i64::try_from(skew.as_secs()).unwrap_or(i64::MAX);
        let now = i64::try_from(now).unwrap_or(i64::MAX);
        exp.saturating_sub(skew) <= now
    }
}

/// Decodes the base64 payload segment, accepting either alphabet and
/// optional padding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let segment = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD_NO_PAD.decode(segment))
        .ok()
}

/// Decodes the claims of a compact token.
///
/// Returns `None` if the token does not have a payload segment, or the
/// segment is not base64-encoded JSON.
#[must_use]
pub fn decode(token: &str) -> Option<Claims> {
    let segment = token.split('.').nth(1)?;
    let bytes = decode_segment(segment)?;

    match serde_json::from_slice::<Payload>(&bytes) {
        Ok(payload) => Some(payload.into()),
        Err(e) => {
            trace!("token payload is not a JSON object: {e}");
            None
        }
    }
}

/// Whether `token` is expired at `now` (epoch seconds).
///
/// An absent token is expired. A token without an `exp` claim, or whose
/// claims cannot be decoded, is not.
#[must_use]
pub fn is_expired_at(token: Option<&str>, skew: Duration, now: u64) -> bool {
    let Some(token) = token else {
        return true;
    };

    decode(token).is_some_and(|claims| claims.is_expired_at(skew, now))
}

/// Whether `token` is expired right now. See [`is_expired_at`].
#[must_use]
pub fn is_expired(token: Option<&str>, skew: Duration) -> bool {
    is_expired_at(token, skew, util::now_from_epoch())
}
