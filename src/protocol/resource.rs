//! Learning resources: named links attached to a course section.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Resource {
    pub id: Uuid,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub url: String,
}

/// A new resource. The backend only accepts `http` and `https` URLs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateResource {
    pub name: String,
    pub url: String,
}

/// Partial resource update; absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct UpdateResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
