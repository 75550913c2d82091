//! UI preferences kept next to the session in the key-value store.
//!
//! Values are stored as the strings "true" / "false"; anything else reads
//! as false.

use tracing::debug;

use crate::storage::{KeyValueStore, StorageError, StorageKey};

pub struct Preferences<S> {
    store: S,
}

impl<S: KeyValueStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn flag(&self, key: StorageKey) -> bool {
        match self.store.get(key) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to read preference");
                false
            }
        }
    }

    fn set_flag(&self, key: StorageKey, value: bool) -> Result<(), StorageError> {
        self.store.set(key, if value { "true" } else { "false" })
    }

    pub fn dark_mode(&self) -> bool {
        self.flag(StorageKey::DarkMode)
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<(), StorageError> {
        self.set_flag(StorageKey::DarkMode, enabled)
    }

    /// Flip dark mode and return the new setting.
    pub fn toggle_dark_mode(&self) -> Result<bool, StorageError> {
        let enabled = !self.dark_mode();
        self.set_dark_mode(enabled)?;
        Ok(enabled)
    }

    pub fn install_prompt_dismissed(&self) -> bool {
        self.flag(StorageKey::InstallPromptDismissed)
    }

    pub fn dismiss_install_prompt(&self) -> Result<(), StorageError> {
        self.set_flag(StorageKey::InstallPromptDismissed, true)
    }

    /// Offer installation only when running in a regular browser tab and
    /// the prompt was never dismissed.
    pub fn should_show_install_prompt(&self, standalone: bool) -> bool {
        !standalone && !self.install_prompt_dismissed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_dark_mode_defaults_off_and_toggles() {
        let prefs = Preferences::new(MemoryStore::new());
        assert!(!prefs.dark_mode());
        assert!(prefs.toggle_dark_mode().unwrap());
        assert!(prefs.dark_mode());
        assert!(!prefs.toggle_dark_mode().unwrap());
    }

    #[test]
    fn test_unrecognized_value_reads_false() {
        let store = MemoryStore::new();
        store.set(StorageKey::DarkMode, "yes").unwrap();
        assert!(!Preferences::new(store).dark_mode());
    }

    #[test]
    fn test_install_prompt_rules() {
        let prefs = Preferences::new(MemoryStore::new());
        assert!(prefs.should_show_install_prompt(false));
        assert!(!prefs.should_show_install_prompt(true));

        prefs.dismiss_install_prompt().unwrap();
        assert!(!prefs.should_show_install_prompt(false));
    }
}
