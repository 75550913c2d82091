//! Offline cache controller.
//!
//! Owns the worker lifecycle (install, then activate) and answers fetches
//! with one of four strategies picked by `route`. Cache misses and storage
//! hiccups during fallback resolve to "no response" rather than errors.

use std::sync::Mutex;

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::OfflineError;
use super::manifest::{is_network_only, CacheVersion, OfflineManifest, OFFLINE_HTML, PLACEHOLDER_SVG};
use super::network::Network;
use super::notification::{notification_click, ClientCommand, Notification};
use super::request::{Destination, Request, RequestMode, Response};
use super::storage::CacheStorage;

/// Sync tag handled by `handle_sync`.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not installed yet, or the last install failed.
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
}

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not handled; the host performs the request itself.
    Passthrough,
    NetworkOnly,
    CacheFirst,
    /// Network first with the document fallback chain.
    NetworkFirstDocument,
    NetworkFirst,
}

/// Pick the strategy for a request. Order matters.
pub fn route(request: &Request, manifest: &OfflineManifest) -> Strategy {
    if !request.is_http() {
        return Strategy::Passthrough;
    }
    if is_network_only(&request.url) || !request.is_get() {
        return Strategy::NetworkOnly;
    }
    if manifest.contains(&request.url)
        || matches!(
            request.destination,
            Destination::Style | Destination::Script | Destination::Image
        )
    {
        return Strategy::CacheFirst;
    }
    if request.mode == RequestMode::Navigate || request.destination == Destination::Document {
        return Strategy::NetworkFirstDocument;
    }
    Strategy::NetworkFirst
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Synthesized image placeholder.
    Placeholder,
    /// Synthesized offline page.
    OfflinePage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The controller did not handle the request.
    Passthrough,
    Served {
        response: Response,
        source: ResponseSource,
    },
    /// Handled, but neither the network nor the cache had an answer.
    Unavailable,
}

impl FetchOutcome {
    fn served(response: Response, source: ResponseSource) -> Self {
        FetchOutcome::Served { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Served { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Served { source, .. } => Some(*source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReply {
    pub version: String,
}

/// Messages posted to the controller by the app.
#[derive(Debug)]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion {
        reply: Option<oneshot::Sender<VersionReply>>,
    },
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(rename = "type")]
    kind: String,
}

impl ControlMessage {
    /// Parse `{"type": "..."}`. A version query parsed this way has no reply
    /// channel until `with_reply` attaches one.
    pub fn from_json(json: &str) -> Result<Self, OfflineError> {
        let envelope: MessageEnvelope = serde_json::from_str(json)?;
        match envelope.kind.as_str() {
            "SKIP_WAITING" => Ok(ControlMessage::SkipWaiting),
            "GET_VERSION" => Ok(ControlMessage::GetVersion { reply: None }),
            other => Err(OfflineError::UnknownMessage(other.to_string())),
        }
    }

    pub fn with_reply(self, reply: oneshot::Sender<VersionReply>) -> Self {
        match self {
            ControlMessage::GetVersion { .. } => ControlMessage::GetVersion { reply: Some(reply) },
            other => other,
        }
    }
}

pub struct OfflineController<S, N> {
    storage: S,
    network: N,
    manifest: OfflineManifest,
    version: CacheVersion,
    state: Mutex<WorkerState>,
}

impl<S: CacheStorage, N: Network> OfflineController<S, N> {
    pub fn new(storage: S, network: N, manifest: OfflineManifest) -> Self {
        Self::with_version(storage, network, manifest, CacheVersion::default())
    }

    pub fn with_version(
        storage: S,
        network: N,
        manifest: OfflineManifest,
        version: CacheVersion,
    ) -> Self {
        Self {
            storage,
            network,
            manifest,
            version,
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn manifest(&self) -> &OfflineManifest {
        &self.manifest
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    fn set_state(&self, next: WorkerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Move from `expected` to `next`, or fail without changing state.
    fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<(), OfflineError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != expected {
            return Err(OfflineError::InvalidState {
                expected,
                actual: *state,
            });
        }
        *state = next;
        Ok(())
    }

    // ===== Lifecycle =====

    /// Cache every manifest asset into the static partition.
    ///
    /// All-or-nothing: nothing is written unless every asset fetched with
    /// status 200. A failed install can be retried.
    pub async fn install(&self) -> Result<(), OfflineError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        let static_name = self.version.static_name();
        info!(partition = %static_name, assets = self.manifest.len(), "Installing offline cache");

        match self.fetch_manifest().await {
            Ok(entries) => {
                if let Err(e) = self.storage.put_all(&static_name, entries).await {
                    self.set_state(WorkerState::Parsed);
                    return Err(e);
                }
                self.set_state(WorkerState::Installed);
                info!(partition = %static_name, "Static assets cached, skipping wait");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Offline cache install failed");
                self.set_state(WorkerState::Parsed);
                Err(e)
            }
        }
    }

    async fn fetch_manifest(&self) -> Result<Vec<(String, Response)>, OfflineError> {
        self.storage.open(&self.version.static_name()).await?;

        let fetches = self.manifest.assets().iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| OfflineError::Install {
                    url: url.clone(),
                    source: Box::new(e),
                })?;
            if !response.is_ok() {
                return Err(OfflineError::Install {
                    url: url.clone(),
                    source: Box::new(OfflineError::from_status(response.status, &response.text())),
                });
            }
            Ok((url.clone(), response))
        });

        try_join_all(fetches).await
    }

    /// Purge partitions from other versions and take over request handling.
    pub async fn activate(&self) -> Result<(), OfflineError> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;

        let result = self.purge_stale_partitions().await;
        match result {
            Ok(removed) => {
                self.set_state(WorkerState::Activated);
                info!(removed, version = %self.version.version_name(), "Offline cache activated");
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Installed);
                Err(e)
            }
        }
    }

    async fn purge_stale_partitions(&self) -> Result<usize, OfflineError> {
        let mut removed = 0;
        for name in self.storage.keys().await? {
            if !self.version.is_current(&name) {
                debug!(partition = %name, "Deleting stale cache partition");
                if self.storage.delete(&name).await? {
                    removed += 1;
                }
            }
        }
        self.storage.open(&self.version.dynamic_name()).await?;
        Ok(removed)
    }

    /// Install then activate immediately.
    pub async fn start(&self) -> Result<(), OfflineError> {
        self.install().await?;
        self.activate().await
    }

    /// Reuse a static partition left by an earlier install of this version.
    ///
    /// Activates without touching the network when every manifest asset is
    /// already cached. Returns false, with the state unchanged, otherwise.
    pub async fn resume(&self) -> Result<bool, OfflineError> {
        let static_name = self.version.static_name();
        for asset in self.manifest.assets() {
            if self.storage.match_in(&static_name, asset).await?.is_none() {
                debug!(missing = %asset, "No complete install to resume");
                return Ok(false);
            }
        }
        self.transition(WorkerState::Parsed, WorkerState::Installed)?;
        self.activate().await?;
        Ok(true)
    }

    // ===== Fetch =====

    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if self.state() != WorkerState::Activated {
            return FetchOutcome::Passthrough;
        }

        let strategy = route(request, &self.manifest);
        debug!(url = %request.url, ?strategy, "Handling fetch");
        match strategy {
            Strategy::Passthrough => FetchOutcome::Passthrough,
            Strategy::NetworkOnly => match self.network.fetch(request).await {
                Ok(response) => FetchOutcome::served(response, ResponseSource::Network),
                Err(e) => {
                    debug!(url = %request.url, error = %e, "Network-only request failed");
                    FetchOutcome::Unavailable
                }
            },
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirstDocument => self.network_first_document(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn cache_first(&self, request: &Request) -> FetchOutcome {
        if let Some(cached) = self.lookup(&request.url).await {
            return FetchOutcome::served(cached, ResponseSource::Cache);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(&self.version.static_name(), request, &response).await;
                }
                FetchOutcome::served(response, ResponseSource::Network)
            }
            Err(e) if request.destination == Destination::Image => {
                debug!(url = %request.url, error = %e, "Image unavailable, serving placeholder");
                FetchOutcome::served(
                    Response::ok("image/svg+xml", PLACEHOLDER_SVG),
                    ResponseSource::Placeholder,
                )
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Asset unavailable offline");
                FetchOutcome::Unavailable
            }
        }
    }

    async fn network_first_document(&self, request: &Request) -> FetchOutcome {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store(&self.version.dynamic_name(), request, &response).await;
                }
                FetchOutcome::served(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Offline navigation, using cache");
                if let Some(cached) = self.lookup(&request.url).await {
                    return FetchOutcome::served(cached, ResponseSource::Cache);
                }
                if let Some(shell) = self.lookup(&self.manifest.root_url()).await {
                    return FetchOutcome::served(shell, ResponseSource::Cache);
                }
                FetchOutcome::served(
                    Response::ok("text/html", OFFLINE_HTML),
                    ResponseSource::OfflinePage,
                )
            }
        }
    }

    async fn network_first(&self, request: &Request) -> FetchOutcome {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(&self.version.dynamic_name(), request, &response).await;
                }
                FetchOutcome::served(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                match self.lookup(&request.url).await {
                    Some(cached) => FetchOutcome::served(cached, ResponseSource::Cache),
                    None => FetchOutcome::Unavailable,
                }
            }
        }
    }

    async fn lookup(&self, url: &str) -> Option<Response> {
        match self.storage.match_any(url).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    async fn store(&self, partition: &str, request: &Request, response: &Response) {
        if let Err(e) = self
            .storage
            .put(partition, &request.url, response.clone())
            .await
        {
            warn!(url = %request.url, partition = %partition, error = %e, "Failed to cache response");
        }
    }

    // ===== Messages and events =====

    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), OfflineError> {
        match message {
            ControlMessage::SkipWaiting => {
                if self.state() == WorkerState::Installed {
                    self.activate().await
                } else {
                    debug!(state = ?self.state(), "Nothing waiting to activate");
                    Ok(())
                }
            }
            ControlMessage::GetVersion { reply } => {
                let version = VersionReply {
                    version: self.version.version_name(),
                };
                match reply {
                    Some(reply) => {
                        if reply.send(version).is_err() {
                            debug!("Version requester went away");
                        }
                    }
                    None => debug!("Version query without a reply channel"),
                }
                Ok(())
            }
        }
    }

    /// Background sync. Returns whether the tag was recognized.
    pub fn handle_sync(&self, tag: &str) -> bool {
        if tag == BACKGROUND_SYNC_TAG {
            info!(tag = %tag, "Running background sync");
            true
        } else {
            debug!(tag = %tag, "Ignoring unknown sync tag");
            false
        }
    }

    pub fn handle_push(&self, payload: Option<&str>) -> Notification {
        info!("Push notification received");
        Notification::from_push(payload, Utc::now().timestamp_millis())
    }

    pub fn handle_notification_click(&self, action: Option<&str>) -> Option<ClientCommand> {
        debug!(action = ?action, "Notification clicked");
        notification_click(action)
    }
}
