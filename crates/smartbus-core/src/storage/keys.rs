use std::fmt;
use std::str::FromStr;

use super::StorageError;

/// Prefix shared by every persisted key.
pub const STORAGE_PREFIX: &str = "smartbus_";

/// Typed keys of the local key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Serialized `UserProfile` of the logged-in user.
    User,
    /// Plain username kept across logouts to pre-fill the login form.
    RememberedUsername,
    /// Balance as a stringified number.
    Balance,
    /// Serialized transaction list, newest first.
    Transactions,
    /// Last activity as epoch milliseconds.
    LastActivity,
    DarkMode,
    InstallPromptDismissed,
}

impl StorageKey {
    /// Keys owned by the session; cleared on logout and on expiry.
    pub const SESSION: [StorageKey; 4] = [
        StorageKey::User,
        StorageKey::Balance,
        StorageKey::Transactions,
        StorageKey::LastActivity,
    ];

    pub const ALL: [StorageKey; 7] = [
        StorageKey::User,
        StorageKey::RememberedUsername,
        StorageKey::Balance,
        StorageKey::Transactions,
        StorageKey::LastActivity,
        StorageKey::DarkMode,
        StorageKey::InstallPromptDismissed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::User => "smartbus_user",
            StorageKey::RememberedUsername => "smartbus_remembered_username",
            StorageKey::Balance => "smartbus_balance",
            StorageKey::Transactions => "smartbus_transactions",
            StorageKey::LastActivity => "smartbus_last_activity",
            StorageKey::DarkMode => "smartbus_dark_mode",
            StorageKey::InstallPromptDismissed => "smartbus_install_prompt_dismissed",
        }
    }
}

impl FromStr for StorageKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| StorageError::Unavailable(format!("unknown storage key: {}", s)))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_keys_are_prefixed_and_round_trip() {
        for key in StorageKey::ALL {
            assert!(key.as_str().starts_with(STORAGE_PREFIX));
            assert_eq!(key.as_str().parse::<StorageKey>().unwrap(), key);
        }
        assert!("darkMode".parse::<StorageKey>().is_err());
    }
}
