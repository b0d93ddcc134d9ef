use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use relay_types::{ProviderCredentials, RelayError, RelayResult, UserKind};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};

use crate::cipher::CredentialCipher;
use crate::ProviderRegistry;

#[derive(FromRow)]
struct ProviderRow {
    encrypted_credential: Vec<u8>,
    is_active: bool,
    status: String,
}

/// Postgres-backed [`ProviderRegistry`] with a read-mostly in-process TTL
/// cache (§4.5, DESIGN.md: "the Provider Registry's credential cache is the
/// only hot shared datum"). Credentials are decrypted once per cache miss
/// and held as plaintext only for the cache's TTL.
pub struct PgProviderRegistry {
    pool: PgPool,
    cipher: CredentialCipher,
    cache: Cache<(UserKind, String), Arc<ProviderCredentials>>,
}

impl PgProviderRegistry {
    pub fn new(pool: PgPool, master_key: [u8; 32], ttl: Duration) -> Self {
        Self {
            pool,
            cipher: CredentialCipher::new(master_key),
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub async fn run_migrations(&self) -> RelayResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Database {
                message: e.to_string(),
            })
    }

    async fn load(&self, kind: UserKind, slug: &str) -> RelayResult<ProviderCredentials> {
        let row: Option<ProviderRow> = sqlx::query_as(
            "SELECT encrypted_credential, is_active, status FROM providers WHERE kind = $1 AND slug = $2",
        )
        .bind(kind.to_string())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayError::Database {
            message: e.to_string(),
        })?;

        let Some(row) = row else {
            return Err(RelayError::ProviderNotFound {
                slug: slug.to_string(),
            });
        };

        if !row.is_active || row.status != "ok" {
            return Err(RelayError::ProviderNoApiKey {
                slug: slug.to_string(),
            });
        }

        let plaintext = self.cipher.open(&row.encrypted_credential)?;
        let json: JsonValue = serde_json::from_slice(&plaintext).map_err(|e| RelayError::Internal {
            message: format!("corrupt credential JSON for {slug}: {e}"),
        })?;
        let creds: ProviderCredentials =
            serde_json::from_value(json).map_err(|e| RelayError::Internal {
                message: format!("malformed credential shape for {slug}: {e}"),
            })?;

        if creds.api_key.is_none() && creds.access_key_id.is_none() {
            return Err(RelayError::ProviderNoApiKey {
                slug: slug.to_string(),
            });
        }
        Ok(creds)
    }
}

#[async_trait]
impl ProviderRegistry for PgProviderRegistry {
    async fn get_credentials(&self, kind: UserKind, slug: &str) -> RelayResult<ProviderCredentials> {
        let cache_key = (kind, slug.to_string());
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok((*cached).clone());
        }
        let creds = self.load(kind, slug).await?;
        self.cache.insert(cache_key, Arc::new(creds.clone()));
        Ok(creds)
    }
}
