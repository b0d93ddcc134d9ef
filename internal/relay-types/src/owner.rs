use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the house a task's owner belongs to.
///
/// Selects both the provider catalog (§4.5) and the artifact bucket pair
/// (§4.7); the empty-string/"admin" queue-name prefix in §6 is derived from
/// this, never carried separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    Web,
    Admin,
}

impl UserKind {
    /// Queue-name / artifact-key prefix: `""` for web, `"admin"` for admin.
    pub fn prefix(self) -> &'static str {
        match self {
            UserKind::Web => "",
            UserKind::Admin => "admin",
        }
    }

    /// Artifact bucket partition name (`users` / `admins`), per §6's
    /// object-storage key shape.
    pub fn bucket_partition(self) -> &'static str {
        match self {
            UserKind::Web => "users",
            UserKind::Admin => "admins",
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKind::Web => write!(f, "web"),
            UserKind::Admin => write!(f, "admin"),
        }
    }
}

/// The identity whose credential budget a task spends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub kind: UserKind,
    pub id: String,
}

impl Owner {
    pub fn new(kind: UserKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}
