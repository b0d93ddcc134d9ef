//! Artifact Store Adapter (C10): places task outputs in private object
//! storage under a user-partitioned key scheme, and signs URLs for
//! external/browser consumption (§4.7).
//!
//! Core components store *unsigned* URLs in Task rows and parent→child
//! chains; signing happens only at the edge (SSE payloads, API responses,
//! outbound provider requests) — see [`ArtifactStore::sign`].

mod content_type;
mod key;
mod sign;
mod store;

pub use content_type::content_type_for_ext;
pub use key::artifact_key;
pub use sign::{sign_url, verify_signature};
pub use store::ObjectStoreArtifactAdapter;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use relay_types::{Owner, RelayResult};
use uuid::Uuid;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload `body` and return its unsigned URL.
    async fn put(
        &self,
        owner: &Owner,
        task_id: Uuid,
        tool_slug: &str,
        step_suffix: Option<&str>,
        ext: &str,
        body: Bytes,
    ) -> RelayResult<String>;

    /// Fetch `source_url` (an expiring provider-issued URL) and persist it
    /// under our own key, returning the unsigned URL.
    async fn fetch_and_put(
        &self,
        owner: &Owner,
        task_id: Uuid,
        tool_slug: &str,
        step_suffix: Option<&str>,
        ext: &str,
        source_url: &str,
    ) -> RelayResult<String>;

    /// Sign a previously-returned unsigned URL with a TTL. No-op for URLs
    /// not rooted at one of this adapter's known CDN origins.
    fn sign(&self, unsigned_url: &str, ttl: Duration) -> RelayResult<String>;
}
