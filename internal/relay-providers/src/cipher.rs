use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use relay_types::{RelayError, RelayResult};
use secrecy::{ExposeSecret, SecretBox};

const NONCE_LEN: usize = 12;

/// AES-256-GCM wrapper around the `encrypted_credential` column (§3). The
/// ciphertext format is `nonce (12 bytes) || tag+payload`, matching what
/// [`CredentialCipher::seal`] produces — there is no external key-rotation
/// story here, just a single master key taken from configuration.
pub struct CredentialCipher {
    key: SecretBox<[u8; 32]>,
}

impl CredentialCipher {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self {
            key: SecretBox::new(Box::new(master_key)),
        }
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.expose_secret()))
    }

    pub fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> RelayResult<Vec<u8>> {
        let ciphertext = self
            .aead()
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| RelayError::Internal {
                message: "credential encryption failed".into(),
            })?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn open(&self, blob: &[u8]) -> RelayResult<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(RelayError::Internal {
                message: "corrupt encrypted credential: too short".into(),
            });
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.aead()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| RelayError::Internal {
                message: "credential decryption failed".into(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let cipher = CredentialCipher::new([7u8; 32]);
        let nonce = [1u8; NONCE_LEN];
        let sealed = cipher.seal(&nonce, b"{\"apiKey\":\"sk-test\"}").unwrap();
        let opened = cipher.open(&sealed).unwrap();
        assert_eq!(opened, b"{\"apiKey\":\"sk-test\"}");
    }

    #[test]
    fn rejects_truncated_blob() {
        let cipher = CredentialCipher::new([7u8; 32]);
        assert!(cipher.open(&[1, 2, 3]).is_err());
    }
}
