//! Tool Catalog (C3): `toolSlug -> {configJson, priceConfig, active flag}`
//! (§4.6). Catalog edits take effect only for newly intaken tasks — every
//! in-flight job already carries its own `price_config_snapshot` /
//! `steps_snapshot` (§4.2 step 4), so this crate never needs to be
//! consulted again once a job has been enqueued.

mod postgres;
mod validate;

pub use postgres::PgToolCatalog;
pub use validate::validate_against_handlers;

use async_trait::async_trait;
use relay_types::{RelayResult, Tool};

#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Look up an active tool by slug. Inactive or missing tools both
    /// surface as [`relay_types::RelayError::UnknownTool`] to intake (§4.2).
    async fn get(&self, slug: &str) -> RelayResult<Tool>;

    /// All tools, active or not — used by the startup validation check and
    /// by admin listing views.
    async fn list(&self) -> RelayResult<Vec<Tool>>;
}
