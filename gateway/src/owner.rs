//! Owner identity resolution at the HTTP boundary.
//!
//! spec.md §1 treats end-user authentication as an external collaborator:
//! "the core receives an already-resolved user identity." The gateway
//! therefore never authenticates anyone — it trusts two headers set by
//! whatever sits in front of it (the web session layer or the admin
//! console), and turns them into the `Owner` every downstream component
//! keys off of.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use relay_types::{Owner, RelayError, UserKind};

const OWNER_KIND_HEADER: &str = "x-relay-owner-kind";
const OWNER_ID_HEADER: &str = "x-relay-owner-id";

pub struct ResolvedOwner(pub Owner);

impl<S> FromRequestParts<S> for ResolvedOwner
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let reject = |message: &str| {
            let err = RelayError::InvalidRequest {
                message: message.to_string(),
            };
            (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({ "error": err.to_string() })),
            )
        };

        let kind_header = parts
            .headers
            .get(OWNER_KIND_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| reject("missing x-relay-owner-kind header"))?;
        let kind = match kind_header {
            "web" => UserKind::Web,
            "admin" => UserKind::Admin,
            other => {
                return Err(reject(&format!(
                    "x-relay-owner-kind must be 'web' or 'admin', got '{other}'"
                )))
            }
        };

        let owner_id = parts
            .headers
            .get(OWNER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| reject("missing x-relay-owner-id header"))?;

        Ok(ResolvedOwner(Owner::new(kind, owner_id)))
    }
}
