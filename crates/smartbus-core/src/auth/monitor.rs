//! Background idle-timeout enforcement.
//!
//! The UI layer forwards user interaction as `ActivitySignal`s over a
//! channel; `IdleMonitor` applies them to the shared `SessionManager` and
//! runs the periodic idle check, reporting forced logouts as
//! `SessionNotice`s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::directory::UserDirectory;
use super::session::SessionManager;
use crate::clock::Clock;
use crate::storage::KeyValueStore;

/// Default interval between idle checks.
pub const IDLE_CHECK_INTERVAL_SECS: u64 = 60;

/// User interaction that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    Touch,
    Click,
}

/// Notices for the user, sent when the monitor changes session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The session was logged out after the idle timeout.
    Expired { username: String },
}

impl SessionNotice {
    pub fn message(&self) -> String {
        match self {
            SessionNotice::Expired { .. } => {
                "Your session has expired due to inactivity. Please log in again.".to_string()
            }
        }
    }
}

pub struct IdleMonitor<S, D, C> {
    manager: Arc<Mutex<SessionManager<S, D, C>>>,
    check_interval: Duration,
}

impl<S, D, C> IdleMonitor<S, D, C>
where
    S: KeyValueStore + 'static,
    D: UserDirectory + 'static,
    C: Clock + 'static,
{
    pub fn new(manager: Arc<Mutex<SessionManager<S, D, C>>>) -> Self {
        Self {
            manager,
            check_interval: Duration::from_secs(IDLE_CHECK_INTERVAL_SECS),
        }
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Run until the activity channel closes.
    pub async fn run(
        self,
        mut activity: mpsc::Receiver<ActivitySignal>,
        notices: mpsc::Sender<SessionNotice>,
    ) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                signal = activity.recv() => match signal {
                    Some(signal) => {
                        self.manager.lock().await.record_activity(signal);
                    }
                    None => {
                        debug!("Activity source closed, stopping idle monitor");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let expired = {
                        let mut manager = self.manager.lock().await;
                        let username = manager.user().map(|u| u.username.clone());
                        if manager.check_idle() { username } else { None }
                    };

                    if let Some(username) = expired {
                        info!(username = %username, "Idle timeout, session ended");
                        if notices.send(SessionNotice::Expired { username }).await.is_err() {
                            debug!("Notice receiver dropped");
                        }
                    }
                }
            }
        }
    }

    pub fn spawn(
        self,
        activity: mpsc::Receiver<ActivitySignal>,
        notices: mpsc::Sender<SessionNotice>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(activity, notices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryUserDirectory;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    type SharedManager = Arc<Mutex<SessionManager<MemoryStore, InMemoryUserDirectory, ManualClock>>>;

    async fn logged_in() -> (SharedManager, ManualClock) {
        let clock = ManualClock::default();
        let mut manager = SessionManager::new(
            MemoryStore::new(),
            InMemoryUserDirectory::with_demo_users(),
            clock.clone(),
        );
        assert!(manager.login("Julissa", "12345").await.unwrap());
        (Arc::new(Mutex::new(manager)), clock)
    }

    #[tokio::test]
    async fn test_monitor_reports_expiry_once() {
        let (manager, clock) = logged_in().await;
        let (_activity_tx, activity_rx) = mpsc::channel(8);
        let (notice_tx, mut notice_rx) = mpsc::channel(8);

        let handle = IdleMonitor::new(manager.clone())
            .with_check_interval(Duration::from_millis(10))
            .spawn(activity_rx, notice_tx);

        clock.advance(chrono::Duration::minutes(21));
        let notice = tokio::time::timeout(Duration::from_secs(2), notice_rx.recv())
            .await
            .expect("notice in time")
            .expect("channel open");
        assert_eq!(
            notice,
            SessionNotice::Expired {
                username: "Julissa".to_string()
            }
        );
        assert!(!manager.lock().await.is_authenticated());

        // later ticks find nothing to expire
        let again = tokio::time::timeout(Duration::from_millis(100), notice_rx.recv()).await;
        assert!(again.is_err());
        handle.abort();
    }

    #[tokio::test]
    async fn test_monitor_applies_activity_and_stops_on_close() {
        let (manager, clock) = logged_in().await;
        let (activity_tx, activity_rx) = mpsc::channel(8);
        let (notice_tx, _notice_rx) = mpsc::channel(8);

        let handle = IdleMonitor::new(manager.clone()).spawn(activity_rx, notice_tx);

        clock.advance(chrono::Duration::minutes(10));
        activity_tx.send(ActivitySignal::Scroll).await.unwrap();
        drop(activity_tx);
        handle.await.unwrap();

        let manager = manager.lock().await;
        assert_eq!(manager.data().unwrap().last_activity, clock.now());
    }
}
