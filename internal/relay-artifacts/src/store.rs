use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as ObjectStorePath;
use object_store::ObjectStore;
use relay_types::{Owner, RelayError, RelayResult, UserKind};
use uuid::Uuid;

use crate::key::artifact_key;
use crate::sign::sign_url;
use crate::ArtifactStore;

/// One (object store, CDN origin) pair per side of the house (§4.7: "two
/// bucket pairs... each associated with a signed-CDN origin").
struct BucketPair {
    store: Arc<dyn ObjectStore>,
    cdn_origin: String,
}

pub struct ObjectStoreArtifactAdapter {
    env: String,
    user: BucketPair,
    admin: BucketPair,
    signing_secret: Vec<u8>,
    http: reqwest::Client,
}

impl ObjectStoreArtifactAdapter {
    pub fn new(
        env: impl Into<String>,
        user_store: Arc<dyn ObjectStore>,
        user_cdn_origin: impl Into<String>,
        admin_store: Arc<dyn ObjectStore>,
        admin_cdn_origin: impl Into<String>,
        signing_secret: Vec<u8>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            env: env.into(),
            user: BucketPair {
                store: user_store,
                cdn_origin: user_cdn_origin.into(),
            },
            admin: BucketPair {
                store: admin_store,
                cdn_origin: admin_cdn_origin.into(),
            },
            signing_secret,
            http,
        }
    }

    fn pair_for(&self, kind: UserKind) -> &BucketPair {
        match kind {
            UserKind::Web => &self.user,
            UserKind::Admin => &self.admin,
        }
    }

    fn known_origins(&self) -> [&str; 2] {
        [self.user.cdn_origin.as_str(), self.admin.cdn_origin.as_str()]
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreArtifactAdapter {
    async fn put(
        &self,
        owner: &Owner,
        task_id: Uuid,
        tool_slug: &str,
        step_suffix: Option<&str>,
        ext: &str,
        body: Bytes,
    ) -> RelayResult<String> {
        let key = artifact_key(&self.env, owner, task_id, tool_slug, step_suffix, ext);
        let pair = self.pair_for(owner.kind);
        pair.store
            .put(&ObjectStorePath::from(key.clone()), body.into())
            .await
            .map_err(|e| RelayError::Artifact {
                message: format!("put failed for {key}: {e}"),
            })?;
        Ok(format!("{}/{key}", pair.cdn_origin))
    }

    async fn fetch_and_put(
        &self,
        owner: &Owner,
        task_id: Uuid,
        tool_slug: &str,
        step_suffix: Option<&str>,
        ext: &str,
        source_url: &str,
    ) -> RelayResult<String> {
        let response = self.http.get(source_url).send().await.map_err(|e| RelayError::Artifact {
            message: format!("fetch failed for {source_url}: {e}"),
        })?;
        let response = response.error_for_status().map_err(|e| RelayError::Artifact {
            message: format!("upstream returned an error fetching {source_url}: {e}"),
        })?;
        let bytes = response.bytes().await.map_err(|e| RelayError::Artifact {
            message: format!("failed reading body for {source_url}: {e}"),
        })?;
        self.put(owner, task_id, tool_slug, step_suffix, ext, bytes).await
    }

    fn sign(&self, unsigned_url: &str, ttl: Duration) -> RelayResult<String> {
        sign_url(&self.signing_secret, &self.known_origins(), unsigned_url, ttl)
    }
}
