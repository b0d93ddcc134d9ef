use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Static catalog row for a third-party AI provider (§3). The credential
/// blob itself never appears here in cleartext — see
/// `relay-providers::ProviderRegistry::get_credentials`, which decrypts it
/// on lookup and returns a [`ProviderCredentials`] the caller is expected to
/// drop as soon as the outbound request is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub slug: String,
    pub encrypted_credential: Vec<u8>,
    pub config_json: JsonValue,
    pub is_active: bool,
    pub status: String,
}

/// Credentials resolved for a single provider call (§4.5). Exactly one of
/// `api_key` or the AWS-style triple is populated, depending on the
/// provider; `base_url` overrides the provider's default endpoint when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub base_url: Option<String>,
}
