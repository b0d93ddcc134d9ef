//! Provider Registry (C2): credential + config lookup for external AI
//! providers, partitioned into user-facing and admin-facing pools (§4.5).
//!
//! Which pool a lookup hits is picked by the *worker's* configured
//! [`UserKind`], never by the job payload, so a mis-routed job cannot spend
//! admin credits by forging `ownerKind` (§4.5).

mod cipher;
mod postgres;

pub use cipher::CredentialCipher;
pub use postgres::PgProviderRegistry;

use async_trait::async_trait;
use relay_types::{ProviderCredentials, RelayResult, UserKind};

#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    /// Resolve usable credentials for `slug` from the catalog selected by
    /// `kind`. Returns [`relay_types::RelayError::ProviderNotFound`] or
    /// [`relay_types::RelayError::ProviderNoApiKey`] — both fatal, never
    /// retried (§4.5) — when the lookup can't produce a usable credential.
    async fn get_credentials(&self, kind: UserKind, slug: &str) -> RelayResult<ProviderCredentials>;
}
