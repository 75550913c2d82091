//! SMARTBUS core: rider sessions with idle expiry, offline caching, and the
//! demo route catalog, payments and admin fault board.

pub mod auth;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod faults;
pub mod models;
pub mod offline;
pub mod payments;
pub mod prefs;
pub mod storage;
pub mod validation;

pub use config::Config;
