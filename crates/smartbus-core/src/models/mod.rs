//! Data models for SMARTBUS entities.
//!
//! - `User`, `UserProfile`: accounts and the persisted session identity
//! - `Transaction`: immutable balance top-up records
//! - `Route`, `Bus`: catalog of routes and simulated live buses
//! - `Fault`, `BusPerformance`: admin fault board records
//!
//! With the `ts` feature these types also export TypeScript bindings for
//! the web frontend.

pub mod fault;
pub mod route;
pub mod transaction;
pub mod user;

pub use fault::{BusHealth, BusPerformance, Fault, FaultStatus, FaultType, Priority};
pub use route::{Bus, BusStatus, OccupancyLevel, Route, RouteBus};
pub use transaction::{Currency, FundingMethod, Transaction, TransactionStatus};
pub use user::{User, UserProfile};
