use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

/// Parse a hex-encoded 32-byte master key (64 hex chars).
pub fn parse_master_key(hex_str: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| anyhow::anyhow!("invalid REDISBOARD_MASTER_KEY hex: {e}"))?;
    let key: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        anyhow::anyhow!("REDISBOARD_MASTER_KEY must be 32 bytes, got {}", v.len())
    })?;
    Ok(key)
}

/// Derive a deterministic dev-mode key (NOT for production).
pub fn dev_master_key() -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"redisboard-dev-master-key-not-for-production");
    let result = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}

/// At-rest encryption of secret columns (database passwords, certificate
/// key material, RDI credentials). Blob layout: `nonce (12) || ciphertext || tag`.
#[derive(Clone)]
pub struct Encryption {
    master_key: [u8; 32],
}

impl Encryption {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self { master_key }
    }

    /// Build from the configured hex key, falling back to the dev key.
    pub fn from_config(master_key: Option<&str>, dev_mode: bool) -> anyhow::Result<Self> {
        match master_key {
            Some(hex_key) => Ok(Self::new(parse_master_key(hex_key)?)),
            None if dev_mode => Ok(Self::new(dev_master_key())),
            None => {
                tracing::warn!("no master key configured, using dev key for secret storage");
                Ok(Self::new(dev_master_key()))
            }
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| anyhow::anyhow!("failed to create cipher: {e}"))?;

        let mut nonce_bytes = [0u8; 12];
        rand::fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    pub fn decrypt(&self, encrypted: &[u8]) -> anyhow::Result<Vec<u8>> {
        if encrypted.len() < 12 {
            anyhow::bail!("encrypted data too short (need at least 12 bytes for nonce)");
        }

        let cipher = Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| anyhow::anyhow!("failed to create cipher: {e}"))?;

        let nonce = Nonce::from_slice(&encrypted[..12]);
        let ciphertext = &encrypted[12..];

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("decryption failed (wrong key or corrupted data): {e}"))
    }

    /// Encrypt an optional secret string into an optional blob column value.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> anyhow::Result<Option<Vec<u8>>> {
        plaintext.map(|p| self.encrypt(p.as_bytes())).transpose()
    }

    /// Decrypt an optional blob column into the secret string.
    pub fn decrypt_opt(&self, encrypted: Option<&[u8]>) -> anyhow::Result<Option<String>> {
        encrypted
            .map(|e| {
                let plaintext = self.decrypt(e)?;
                String::from_utf8(plaintext)
                    .map_err(|e| anyhow::anyhow!("secret value is not valid UTF-8: {e}"))
            })
            .transpose()
    }

    /// Decrypt a required blob column into a string.
    pub fn decrypt_string(&self, encrypted: &[u8]) -> anyhow::Result<String> {
        let plaintext = self.decrypt(encrypted)?;
        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("secret value is not valid UTF-8: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let enc = Encryption::new([42u8; 32]);
        let plaintext = b"s3cret-redis-password";
        let encrypted = enc.encrypt(plaintext).unwrap();

        // nonce (12) + tag (16) overhead
        assert!(encrypted.len() > plaintext.len());

        let decrypted = enc.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        let e1 = Encryption::new([42u8; 32]);
        let e2 = Encryption::new([99u8; 32]);
        let encrypted = e1.encrypt(b"secret").unwrap();
        assert!(e2.decrypt(&encrypted).is_err());
    }

    #[test]
    fn decrypt_corrupted_data_fails() {
        let enc = Encryption::new([42u8; 32]);
        let mut encrypted = enc.encrypt(b"secret").unwrap();
        if let Some(byte) = encrypted.last_mut() {
            *byte ^= 0xFF;
        }
        assert!(enc.decrypt(&encrypted).is_err());
    }

    #[test]
    fn decrypt_too_short_fails() {
        let enc = Encryption::new([42u8; 32]);
        assert!(enc.decrypt(&[0u8; 5]).is_err());
    }

    #[test]
    fn different_encryptions_differ() {
        let enc = Encryption::new([42u8; 32]);
        let e1 = enc.encrypt(b"same").unwrap();
        let e2 = enc.encrypt(b"same").unwrap();
        assert_ne!(e1, e2);
    }

    #[test]
    fn encrypt_opt_none_passthrough() {
        let enc = Encryption::new([42u8; 32]);
        assert!(enc.encrypt_opt(None).unwrap().is_none());
        assert!(enc.decrypt_opt(None).unwrap().is_none());
    }

    #[test]
    fn encrypt_opt_roundtrip() {
        let enc = Encryption::new([42u8; 32]);
        let blob = enc.encrypt_opt(Some("hunter2")).unwrap().unwrap();
        let back = enc.decrypt_opt(Some(&blob)).unwrap().unwrap();
        assert_eq!(back, "hunter2");
    }

    #[test]
    fn parse_master_key_valid() {
        let hex_key = "aa".repeat(32);
        let key = parse_master_key(&hex_key).unwrap();
        assert_eq!(key, [0xaa; 32]);
    }

    #[test]
    fn parse_master_key_wrong_length() {
        assert!(parse_master_key("aabb").is_err());
    }

    #[test]
    fn parse_master_key_invalid_hex() {
        let bad = "zz".repeat(32);
        assert!(parse_master_key(&bad).is_err());
    }

    #[test]
    fn dev_master_key_is_deterministic() {
        assert_eq!(dev_master_key(), dev_master_key());
    }
}
