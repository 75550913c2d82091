use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::directory::UserDirectory;
use super::error::SessionError;
use super::monitor::ActivitySignal;
use crate::clock::{Clock, SystemClock};
use crate::models::{Currency, FundingMethod, Transaction, UserProfile};
use crate::storage::{KeyValueStore, StorageError, StorageKey};

/// Idle time after which the session is force-logged-out.
pub const SESSION_TIMEOUT_MINUTES: i64 = 20;

/// The authenticated session: identity, balance and top-up history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub user: UserProfile,
    pub balance: f64,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub last_activity: DateTime<Utc>,
}

impl SessionData {
    fn new(user: UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            user,
            balance: 0.0,
            transactions: Vec::new(),
            last_activity: now,
        }
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity
    }
}

/// Owns the logged-in identity and the idle-timeout policy.
///
/// State is either logged out (`data == None`) or logged in; every
/// transition writes through to the key-value store.
pub struct SessionManager<S, D, C = SystemClock> {
    store: S,
    directory: D,
    clock: C,
    timeout: Duration,
    data: Option<SessionData>,
    last_transaction_id: i64,
}

impl<S: KeyValueStore, D: UserDirectory, C: Clock> SessionManager<S, D, C> {
    pub fn new(store: S, directory: D, clock: C) -> Self {
        Self {
            store,
            directory,
            clock,
            timeout: Duration::minutes(SESSION_TIMEOUT_MINUTES),
            data: None,
            last_transaction_id: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-establish a persisted session on startup.
    ///
    /// Returns true if a session was restored. A session whose last
    /// activity is older than the timeout is discarded along with its
    /// stored keys, as is any record that cannot be read.
    pub fn restore(&mut self) -> bool {
        let now = self.clock.now();

        let user = match self.store.get_json::<UserProfile>(StorageKey::User) {
            Ok(Some(user)) => user,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored session");
                self.clear_stored_session();
                return false;
            }
        };

        let last_activity = match self.load_last_activity() {
            Ok(Some(at)) => at,
            Ok(None) => {
                debug!(username = %user.username, "Stored session has no activity timestamp");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Discarding stored session with bad activity timestamp");
                self.clear_stored_session();
                return false;
            }
        };

        if now - last_activity >= self.timeout {
            info!(username = %user.username, "Stored session expired, clearing");
            self.clear_stored_session();
            return false;
        }

        let balance = self
            .store
            .get_json::<f64>(StorageKey::Balance)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring unreadable stored balance");
                None
            })
            .filter(|b| b.is_finite() && *b >= 0.0)
            .unwrap_or(0.0);

        let transactions = self
            .store
            .get_json::<Vec<Transaction>>(StorageKey::Transactions)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring unreadable stored transactions");
                None
            })
            .unwrap_or_default();

        self.last_transaction_id = transactions
            .iter()
            .filter_map(|t| t.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        info!(username = %user.username, "Session restored");
        self.data = Some(SessionData {
            user,
            balance,
            transactions,
            last_activity: now,
        });
        self.persist_last_activity(now);
        true
    }

    /// Log in against the user directory.
    ///
    /// `Ok(false)` means the credentials did not match; nothing is stored
    /// in that case. `Err` means the session could not be persisted and no
    /// session was established.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool, SessionError> {
        let Some(user) = self.directory.authenticate(username, password) else {
            debug!(username = %username.trim(), "Login rejected");
            return Ok(false);
        };

        let now = self.clock.now();
        let profile = user.profile();

        if let Err(e) = self.persist_new_session(&profile, now) {
            warn!(error = %e, "Failed to persist session, login aborted");
            self.clear_stored_session();
            return Err(e.into());
        }

        info!(username = %profile.username, "Login successful");
        self.data = Some(SessionData::new(profile, now));
        Ok(true)
    }

    fn persist_new_session(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<(), StorageError> {
        self.store.remove(StorageKey::Balance)?;
        self.store.remove(StorageKey::Transactions)?;
        self.store.set_json(StorageKey::User, profile)?;
        self.store
            .set(StorageKey::LastActivity, &now.timestamp_millis().to_string())?;
        self.store
            .set(StorageKey::RememberedUsername, &profile.username)?;
        Ok(())
    }

    /// End the session. The remembered username is kept.
    pub fn logout(&mut self) {
        if let Some(data) = self.data.take() {
            info!(username = %data.user.username, "Logged out");
        }
        self.clear_stored_session();
    }

    /// Credit the balance with a completed top-up.
    pub fn add_transaction(
        &mut self,
        amount: f64,
        method: FundingMethod,
        currency: Currency,
    ) -> Result<Transaction, SessionError> {
        if self.data.is_none() {
            return Err(SessionError::NotLoggedIn);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SessionError::InvalidAmount(amount));
        }

        let now = self.clock.now();
        let id = self.next_transaction_id(now);
        let data = self.data.as_mut().ok_or(SessionError::NotLoggedIn)?;

        let transaction = Transaction::completed(id, amount, method, currency, now);
        data.transactions.insert(0, transaction.clone());
        data.balance += amount;
        data.last_activity = now;

        info!(
            id = %transaction.id,
            amount,
            method = ?method,
            currency = %currency,
            balance = data.balance,
            "Transaction recorded"
        );

        let balance = data.balance;
        if let Err(e) = self.store.set_json(StorageKey::Balance, &balance) {
            warn!(error = %e, "Failed to persist balance");
        }
        if let Some(ref data) = self.data {
            if let Err(e) = self.store.set_json(StorageKey::Transactions, &data.transactions) {
                warn!(error = %e, "Failed to persist transactions");
            }
        }
        self.persist_last_activity(now);

        Ok(transaction)
    }

    /// Reset the idle timer. Ignored while logged out.
    pub fn record_activity(&mut self, signal: ActivitySignal) -> bool {
        let now = self.clock.now();
        let Some(data) = self.data.as_mut() else {
            return false;
        };
        debug!(?signal, "Activity");
        data.last_activity = now;
        self.persist_last_activity(now);
        true
    }

    /// Force logout if the idle timeout has elapsed.
    ///
    /// Returns true only on the call that ended the session.
    pub fn check_idle(&mut self) -> bool {
        let now = self.clock.now();
        let expired = self
            .data
            .as_ref()
            .map(|d| d.idle_for(now) > self.timeout)
            .unwrap_or(false);

        if expired {
            info!("Session expired after inactivity");
            self.logout();
        }
        expired
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&SessionData> {
        self.data.as_ref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.data.as_ref().map(|d| &d.user)
    }

    /// Current balance; zero while logged out.
    pub fn balance(&self) -> f64 {
        self.data.as_ref().map(|d| d.balance).unwrap_or(0.0)
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.data
            .as_ref()
            .map(|d| d.transactions.as_slice())
            .unwrap_or(&[])
    }

    /// Time left before the idle timeout, if logged in.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.data
            .as_ref()
            .map(|d| (self.timeout - d.idle_for(now)).max(Duration::zero()))
    }

    /// Username from the last successful login, for pre-filling the form.
    pub fn remembered_username(&self) -> Option<String> {
        match self.store.get(StorageKey::RememberedUsername) {
            Ok(name) => name.filter(|n| !n.trim().is_empty()),
            Err(e) => {
                debug!(error = %e, "Failed to read remembered username");
                None
            }
        }
    }

    fn load_last_activity(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let Some(raw) = self.store.get(StorageKey::LastActivity)? else {
            return Ok(None);
        };
        let millis: i64 = serde_json::from_str(raw.trim())?;
        DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| StorageError::Unavailable(format!("timestamp out of range: {}", millis)))
    }

    fn persist_last_activity(&self, at: DateTime<Utc>) {
        if let Err(e) = self
            .store
            .set(StorageKey::LastActivity, &at.timestamp_millis().to_string())
        {
            warn!(error = %e, "Failed to persist last activity");
        }
    }

    fn clear_stored_session(&self) {
        for key in StorageKey::SESSION {
            if let Err(e) = self.store.remove(key) {
                warn!(key = %key, error = %e, "Failed to clear stored session key");
            }
        }
    }

    /// Epoch milliseconds, bumped past the previous id when two top-ups
    /// land in the same millisecond.
    fn next_transaction_id(&mut self, now: DateTime<Utc>) -> String {
        let id = now.timestamp_millis().max(self.last_transaction_id + 1);
        self.last_transaction_id = id;
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::InMemoryUserDirectory;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    type TestManager = SessionManager<Arc<MemoryStore>, InMemoryUserDirectory, ManualClock>;

    fn manager() -> (TestManager, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let manager = SessionManager::new(
            store.clone(),
            InMemoryUserDirectory::with_demo_users(),
            clock.clone(),
        );
        (manager, store, clock)
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: StorageKey) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: StorageKey, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only".to_string()))
        }

        fn remove(&self, _key: StorageKey) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_login_with_valid_credentials() {
        let (mut manager, store, _clock) = manager();
        for (username, password) in [("Julissa", "12345"), ("Admin", " 12345 ")] {
            assert!(manager.login(username, password).await.unwrap());
            assert!(manager.is_authenticated());
            assert_eq!(manager.user().unwrap().username, username);
            manager.logout();
        }
        assert_eq!(
            store.get(StorageKey::RememberedUsername).unwrap().as_deref(),
            Some("Admin")
        );
    }

    #[tokio::test]
    async fn test_login_with_invalid_credentials_touches_nothing() {
        let (mut manager, store, _clock) = manager();
        for (username, password) in [("Julissa", "wrong"), ("nobody", "12345"), ("", "")] {
            assert!(!manager.login(username, password).await.unwrap());
            assert!(!manager.is_authenticated());
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_login_persists_identity_but_not_password() {
        let (mut manager, store, clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();

        let user = store.get(StorageKey::User).unwrap().unwrap();
        assert!(user.contains("Julissa"));
        assert!(!user.contains("12345"));
        assert_eq!(
            store.get(StorageKey::LastActivity).unwrap(),
            Some(clock.now().timestamp_millis().to_string())
        );
    }

    #[tokio::test]
    async fn test_login_storage_failure_is_recoverable() {
        let mut manager = SessionManager::new(
            ReadOnlyStore,
            InMemoryUserDirectory::with_demo_users(),
            ManualClock::default(),
        );
        let result = manager.login("Julissa", "12345").await;
        assert!(matches!(result, Err(SessionError::Storage(_))));
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_keeps_remembered_username() {
        let (mut manager, store, _clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();
        manager
            .add_transaction(100.0, FundingMethod::Mobile, Currency::Dop)
            .unwrap();

        manager.logout();
        assert!(!manager.is_authenticated());
        assert_eq!(manager.balance(), 0.0);
        assert!(manager.transactions().is_empty());
        for key in StorageKey::SESSION {
            assert_eq!(store.get(key).unwrap(), None, "{} should be cleared", key);
        }
        assert_eq!(manager.remembered_username().as_deref(), Some("Julissa"));
    }

    #[tokio::test]
    async fn test_add_transaction_credits_balance_newest_first() {
        let (mut manager, store, clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();

        let first = manager
            .add_transaction(50.0, FundingMethod::Mobile, Currency::Dop)
            .unwrap();
        clock.advance(Duration::seconds(5));
        let before = manager.balance();
        let second = manager
            .add_transaction(25.5, FundingMethod::Paypal, Currency::Usd)
            .unwrap();

        assert_eq!(manager.balance(), before + 25.5);
        assert_eq!(manager.transactions()[0], second);
        assert_eq!(manager.transactions()[1], first);
        assert_ne!(first.id, second.id);
        assert_eq!(store.get_json::<f64>(StorageKey::Balance).unwrap(), Some(75.5));
        let stored: Vec<Transaction> = store.get_json(StorageKey::Transactions).unwrap().unwrap();
        assert_eq!(stored, manager.transactions());
    }

    #[tokio::test]
    async fn test_transaction_ids_unique_within_same_millisecond() {
        let (mut manager, _store, _clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();
        let a = manager.add_transaction(1.0, FundingMethod::Mobile, Currency::Dop).unwrap();
        let b = manager.add_transaction(1.0, FundingMethod::Mobile, Currency::Dop).unwrap();
        assert!(b.id.parse::<i64>().unwrap() > a.id.parse::<i64>().unwrap());
    }

    #[tokio::test]
    async fn test_add_transaction_rejections() {
        let (mut manager, _store, _clock) = manager();
        assert!(matches!(
            manager.add_transaction(10.0, FundingMethod::Mobile, Currency::Dop),
            Err(SessionError::NotLoggedIn)
        ));

        manager.login("Julissa", "12345").await.unwrap();
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                manager.add_transaction(amount, FundingMethod::Mobile, Currency::Dop),
                Err(SessionError::InvalidAmount(_))
            ));
        }
        assert_eq!(manager.balance(), 0.0);
        assert!(manager.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_idle_timeout_clears_session_idempotently() {
        let (mut manager, store, clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();

        clock.advance(Duration::minutes(SESSION_TIMEOUT_MINUTES));
        assert!(!manager.check_idle());
        assert!(manager.is_authenticated());

        clock.advance(Duration::seconds(1));
        assert!(manager.check_idle());
        assert!(!manager.is_authenticated());
        assert_eq!(store.get(StorageKey::User).unwrap(), None);

        assert!(!manager.check_idle());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_activity_and_top_ups_reset_idle_timer() {
        let (mut manager, _store, clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();

        clock.advance(Duration::minutes(15));
        assert!(manager.record_activity(ActivitySignal::KeyPress));
        clock.advance(Duration::minutes(15));
        assert!(!manager.check_idle());

        manager
            .add_transaction(20.0, FundingMethod::Mobile, Currency::Dop)
            .unwrap();
        clock.advance(Duration::minutes(19));
        assert!(!manager.check_idle());
        assert_eq!(manager.time_until_expiry(), Some(Duration::minutes(1)));
    }

    #[test]
    fn test_activity_ignored_when_logged_out() {
        let (mut manager, store, _clock) = manager();
        assert!(!manager.record_activity(ActivitySignal::Click));
        assert_eq!(store.get(StorageKey::LastActivity).unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_within_timeout_returns_identical_session() {
        let (mut manager, store, clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();
        manager
            .add_transaction(80.0, FundingMethod::Mobile, Currency::Dop)
            .unwrap();
        let before = manager.data().cloned().unwrap();

        clock.advance(Duration::minutes(19));
        let mut reloaded = SessionManager::new(
            store.clone(),
            InMemoryUserDirectory::with_demo_users(),
            clock.clone(),
        );
        assert!(reloaded.restore());
        let after = reloaded.data().unwrap();
        assert_eq!(after.user, before.user);
        assert_eq!(after.balance, before.balance);
        assert_eq!(after.transactions, before.transactions);
        assert_eq!(after.last_activity, clock.now());
    }

    #[tokio::test]
    async fn test_restore_after_timeout_clears_keys() {
        let (mut manager, store, clock) = manager();
        manager.login("Julissa", "12345").await.unwrap();
        manager
            .add_transaction(80.0, FundingMethod::Mobile, Currency::Dop)
            .unwrap();

        clock.advance(Duration::minutes(21));
        let mut reloaded = SessionManager::new(
            store.clone(),
            InMemoryUserDirectory::with_demo_users(),
            clock.clone(),
        );
        assert!(!reloaded.restore());
        assert!(!reloaded.is_authenticated());
        for key in StorageKey::SESSION {
            assert_eq!(store.get(key).unwrap(), None);
        }
        assert_eq!(reloaded.remembered_username().as_deref(), Some("Julissa"));
    }

    #[test]
    fn test_restore_discards_corrupt_record() {
        let (mut manager, store, clock) = manager();
        store.set(StorageKey::User, "{not json").unwrap();
        store
            .set(StorageKey::LastActivity, &clock.now().timestamp_millis().to_string())
            .unwrap();

        assert!(!manager.restore());
        assert_eq!(store.get(StorageKey::User).unwrap(), None);

        // a corrupt record must not prevent a fresh login
        let login = futures::executor::block_on(manager.login("Julissa", "12345"));
        assert!(login.unwrap());
    }

    #[tokio::test]
    async fn test_login_succeeds_over_corrupt_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::storage::FileStore::new(dir.path());
        std::fs::write(store.path(), r#"{"smartbus_user": "{trunc"#).unwrap();

        let mut manager = SessionManager::new(
            store,
            InMemoryUserDirectory::with_demo_users(),
            ManualClock::default(),
        );
        assert!(!manager.restore());
        assert!(manager.login("Julissa", "12345").await.unwrap());
        assert!(manager.is_authenticated());

        // the fresh session is what a restart finds
        let mut reloaded = SessionManager::new(
            crate::storage::FileStore::new(dir.path()),
            InMemoryUserDirectory::with_demo_users(),
            ManualClock::default(),
        );
        assert!(reloaded.restore());
        assert_eq!(reloaded.user().unwrap().username, "Julissa");
    }

    #[tokio::test]
    async fn test_login_without_restore_over_corrupt_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::storage::FileStore::new(dir.path());
        std::fs::write(store.path(), "{broken").unwrap();

        let mut manager = SessionManager::new(
            store,
            InMemoryUserDirectory::with_demo_users(),
            ManualClock::default(),
        );
        assert!(manager.login("Admin", "12345").await.unwrap());
        assert_eq!(manager.remembered_username().as_deref(), Some("Admin"));
    }

    #[test]
    fn test_restore_ignores_corrupt_balance() {
        let (mut manager, store, clock) = manager();
        store
            .set_json(StorageKey::User, &crate::models::User::new("Julissa", "x").profile())
            .unwrap();
        store
            .set(StorageKey::LastActivity, &clock.now().timestamp_millis().to_string())
            .unwrap();
        store.set(StorageKey::Balance, "lots").unwrap();

        assert!(manager.restore());
        assert_eq!(manager.balance(), 0.0);
    }
}
