//! Offline support: a cache controller that sits between the app and the
//! network, with pluggable cache storage.

pub mod controller;
pub mod disk;
pub mod error;
pub mod manifest;
pub mod network;
pub mod notification;
pub mod request;
pub mod storage;

pub use controller::{
    route, ControlMessage, FetchOutcome, OfflineController, ResponseSource, Strategy,
    VersionReply, WorkerState, BACKGROUND_SYNC_TAG,
};
pub use disk::{DiskCacheStorage, PartitionInfo};
pub use error::OfflineError;
pub use manifest::{CacheVersion, OfflineManifest, BUILD_TAG, STATIC_ASSETS};
pub use network::{HttpNetwork, Network};
pub use notification::{ClientCommand, Notification, NotificationAction};
pub use request::{Destination, Request, RequestMode, Response};
pub use storage::{CacheStorage, MemoryCacheStorage};
