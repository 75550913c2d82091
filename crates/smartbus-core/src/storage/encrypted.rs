use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

use super::{KeyValueStore, StorageError, StorageKey};

/// Salt for deriving the cipher key from the device secret
const KEY_SALT: &[u8] = b"smartbus-storage-v1";

const NONCE_LEN: usize = 12;

/// Store wrapper that seals every value before handing it to `inner`.
///
/// Values are stored as base64 of `nonce || ciphertext`. The storage key
/// name is bound as associated data, so a value copied under another key
/// fails to open.
pub struct EncryptedStore<S> {
    inner: S,
    cipher: ChaCha20Poly1305,
}

impl<S: KeyValueStore> EncryptedStore<S> {
    pub fn new(inner: S, secret: &[u8]) -> Result<Self, StorageError> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(secret, KEY_SALT, &mut key)
            .map_err(|e| StorageError::Crypto(format!("key derivation failed: {}", e)))?;

        Ok(Self {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn seal(&self, key: StorageKey, plaintext: &str) -> Result<String, StorageError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: key.as_str().as_bytes(),
                },
            )
            .map_err(|e| StorageError::Crypto(format!("encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn open(&self, key: StorageKey, sealed: &str) -> Result<String, StorageError> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|e| StorageError::Crypto(format!("invalid sealed value: {}", e)))?;
        if bytes.len() < NONCE_LEN {
            return Err(StorageError::Crypto("sealed value too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: key.as_str().as_bytes(),
                },
            )
            .map_err(|e| StorageError::Crypto(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| StorageError::Crypto(format!("decrypted value is not UTF-8: {}", e)))
    }
}

impl<S: KeyValueStore> KeyValueStore for EncryptedStore<S> {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        match self.inner.get(key)? {
            Some(sealed) => Ok(Some(self.open(key, &sealed)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        let sealed = self.seal(key, value)?;
        self.inner.set(key, &sealed)
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_values_are_sealed_at_rest() {
        let store = EncryptedStore::new(MemoryStore::new(), SECRET).unwrap();
        store.set(StorageKey::RememberedUsername, "Julissa").unwrap();

        let raw = store.inner().get(StorageKey::RememberedUsername).unwrap().unwrap();
        assert!(!raw.contains("Julissa"));
        assert_eq!(
            store.get(StorageKey::RememberedUsername).unwrap().as_deref(),
            Some("Julissa")
        );
    }

    #[test]
    fn test_value_moved_to_other_key_fails_to_open() {
        let store = EncryptedStore::new(MemoryStore::new(), SECRET).unwrap();
        store.set(StorageKey::Balance, "500").unwrap();

        let raw = store.inner().get(StorageKey::Balance).unwrap().unwrap();
        store.inner().set(StorageKey::DarkMode, &raw).unwrap();
        assert!(matches!(
            store.get(StorageKey::DarkMode),
            Err(StorageError::Crypto(_))
        ));
    }

    #[test]
    fn test_wrong_secret_cannot_read() {
        let inner = std::sync::Arc::new(MemoryStore::new());
        let writer = EncryptedStore::new(inner.clone(), SECRET).unwrap();
        writer.set(StorageKey::Balance, "500").unwrap();

        let reader = EncryptedStore::new(inner, b"another device secret!!").unwrap();
        assert!(reader.get(StorageKey::Balance).is_err());
    }
}
