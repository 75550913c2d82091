//! Static asset manifest, cache versioning and synthetic fallback bodies.

use reqwest::Url;

use super::error::OfflineError;
use super::request::cache_key;

/// Build tag shared by both cache partitions and the reported version.
pub const BUILD_TAG: &str = env!("CARGO_PKG_VERSION");

/// Assets cached at install. Relative entries resolve against the app origin.
pub const STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.7.1/images/marker-icon-2x.png",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.7.1/images/marker-icon.png",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.7.1/images/marker-shadow.png",
];

/// URL substrings that always go to the network.
pub const NETWORK_ONLY: &[&str] = &["/api/", "https://api.", "chrome-extension://"];

pub const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200">"##,
    r##"<rect width="200" height="200" fill="#f3f4f6"/>"##,
    r##"<text x="100" y="100" text-anchor="middle" dy=".3em" fill="#9ca3af">Offline</text>"##,
    "</svg>"
);

pub const OFFLINE_HTML: &str = concat!(
    "<!DOCTYPE html><html><head><title>SMARTBUS - Offline</title>",
    r#"<meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0">"#,
    "<style>body{font-family:Arial,sans-serif;text-align:center;padding:50px;background:#f3f4f6}",
    "h1{color:#1e40af}p{color:#6b7280}</style></head><body><h1>SMARTBUS</h1>",
    "<p>No internet connection</p><p>Please check your connection and try again</p>",
    "</body></html>"
);

/// Partition and version names for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersion {
    tag: String,
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self::new(BUILD_TAG)
    }
}

impl CacheVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn static_name(&self) -> String {
        format!("smartbus-static-v{}", self.tag)
    }

    pub fn dynamic_name(&self) -> String {
        format!("smartbus-dynamic-v{}", self.tag)
    }

    /// Reported in reply to a version query.
    pub fn version_name(&self) -> String {
        format!("smartbus-v{}", self.tag)
    }

    pub fn is_current(&self, partition: &str) -> bool {
        partition == self.static_name() || partition == self.dynamic_name()
    }
}

/// The static manifest resolved against an origin.
#[derive(Debug, Clone)]
pub struct OfflineManifest {
    origin: Url,
    assets: Vec<String>,
}

impl OfflineManifest {
    /// Manifest of the built-in static assets.
    pub fn new(origin: &str) -> Result<Self, OfflineError> {
        Self::with_assets(origin, STATIC_ASSETS)
    }

    pub fn with_assets(origin: &str, assets: &[&str]) -> Result<Self, OfflineError> {
        let origin = Url::parse(origin)
            .map_err(|e| OfflineError::InvalidResponse(format!("invalid origin {}: {}", origin, e)))?;
        let assets = assets
            .iter()
            .map(|asset| {
                origin
                    .join(asset)
                    .map(|url| cache_key(url.as_str()))
                    .map_err(|e| {
                        OfflineError::InvalidResponse(format!("invalid asset {}: {}", asset, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { origin, assets })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute asset URLs, in manifest order.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Whether the URL names a manifest asset. Query strings count.
    pub fn contains(&self, url: &str) -> bool {
        let key = cache_key(url);
        self.assets.iter().any(|asset| *asset == key)
    }

    /// The app shell URL used as the navigation fallback.
    pub fn root_url(&self) -> String {
        match self.origin.join("/") {
            Ok(url) => url.to_string(),
            Err(_) => self.origin.to_string(),
        }
    }

    /// Resolve a path or URL typed by a user against the origin.
    pub fn resolve(&self, url: &str) -> Result<String, OfflineError> {
        self.origin
            .join(url)
            .map(|u| u.to_string())
            .map_err(|e| OfflineError::InvalidResponse(format!("invalid url {}: {}", url, e)))
    }
}

/// Whether the URL matches the network-only allowlist.
pub fn is_network_only(url: &str) -> bool {
    NETWORK_ONLY.iter().any(|pattern| url.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_names_follow_build_tag() {
        let version = CacheVersion::new("2.1.0");
        assert_eq!(version.static_name(), "smartbus-static-v2.1.0");
        assert_eq!(version.dynamic_name(), "smartbus-dynamic-v2.1.0");
        assert_eq!(version.version_name(), "smartbus-v2.1.0");
        assert!(version.is_current("smartbus-dynamic-v2.1.0"));
        assert!(!version.is_current("smartbus-static-v2.0.0"));
        assert_eq!(CacheVersion::default().tag(), BUILD_TAG);
    }

    #[test]
    fn test_manifest_resolves_relative_assets() {
        let manifest = OfflineManifest::new("http://localhost:5173").unwrap();
        assert_eq!(manifest.len(), STATIC_ASSETS.len());
        assert_eq!(manifest.assets()[0], "http://localhost:5173/");
        assert_eq!(manifest.assets()[1], "http://localhost:5173/index.html");
        assert!(manifest.contains("https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"));
        assert!(manifest.contains("http://localhost:5173/index.html#top"));
        assert!(!manifest.contains("http://localhost:5173/routes"));
        assert_eq!(manifest.root_url(), "http://localhost:5173/");
    }

    #[test]
    fn test_manifest_rejects_bad_origin() {
        assert!(OfflineManifest::new("not a url").is_err());
    }

    #[test]
    fn test_network_only_substrings() {
        assert!(is_network_only("http://localhost:5173/api/buses"));
        assert!(is_network_only("https://api.example.com/v1"));
        assert!(is_network_only("chrome-extension://abcdef/content.js"));
        assert!(!is_network_only("http://localhost:5173/apiary.png"));
    }
}
