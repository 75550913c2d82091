use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use keyring::Entry;
use rand::RngCore;
use tracing::info;

const SERVICE_NAME: &str = "smartbus";

/// Keyring account holding the storage secret
const ACCOUNT_NAME: &str = "storage-key";

/// Length of the random device secret in bytes
const SECRET_LEN: usize = 32;

/// Random per-device secret kept in the OS keychain.
///
/// `EncryptedStore` derives its cipher key from this secret, so stored
/// values are unreadable without access to the user's keychain.
pub struct DeviceKey;

impl DeviceKey {
    /// Fetch the device secret, generating and storing one on first use
    pub fn load_or_create() -> Result<Vec<u8>> {
        let entry = Entry::new(SERVICE_NAME, ACCOUNT_NAME)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(encoded) => STANDARD
                .decode(encoded.trim())
                .context("Stored device key is not valid base64"),
            Err(keyring::Error::NoEntry) => {
                let mut secret = vec![0u8; SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut secret);
                entry
                    .set_password(&STANDARD.encode(&secret))
                    .context("Failed to store device key in keychain")?;
                info!("Generated new device storage key");
                Ok(secret)
            }
            Err(e) => Err(e).context("Failed to read device key from keychain"),
        }
    }
}
