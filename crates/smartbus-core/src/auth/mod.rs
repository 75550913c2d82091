//! Authentication module for the rider session.
//!
//! This module provides:
//! - `SessionManager`: login/logout, balance top-ups and idle-timeout expiry
//! - `UserDirectory`: account lookup and sign-up, with an in-memory demo directory
//! - `IdleMonitor`: background task applying activity signals and periodic idle checks
//!
//! Sessions are persisted to the key-value store and expire after 20 minutes
//! without activity, both while running and across restarts.

pub mod directory;
pub mod error;
pub mod monitor;
pub mod session;

pub use directory::{InMemoryUserDirectory, Registration, UserDirectory};
pub use error::{RegistrationError, RegistrationField, SessionError};
pub use monitor::{ActivitySignal, IdleMonitor, SessionNotice, IDLE_CHECK_INTERVAL_SECS};
pub use session::{SessionData, SessionManager, SESSION_TIMEOUT_MINUTES};
