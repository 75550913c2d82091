//! Request and response values seen by the offline controller.

use std::borrow::Cow;
use std::collections::BTreeMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
}

impl Destination {
    /// Guess the destination from the URL path's extension.
    pub fn from_path(path: &str) -> Self {
        let ext = path
            .rsplit('/')
            .next()
            .and_then(|file| file.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("css") => Destination::Style,
            Some("js") | Some("mjs") => Destination::Script,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("svg") | Some("webp")
            | Some("ico") => Destination::Image,
            Some("woff") | Some("woff2") | Some("ttf") => Destination::Font,
            Some("webmanifest") => Destination::Manifest,
            Some("html") | Some("htm") => Destination::Document,
            _ => Destination::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    NoCors,
    Cors,
    SameOrigin,
    Navigate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: String,
    pub destination: Destination,
    pub mode: RequestMode,
}

impl Request {
    /// A plain GET with the destination inferred from the URL.
    pub fn get(url: impl Into<String>) -> Self {
        let url = url.into();
        let destination = Url::parse(&url)
            .map(|u| Destination::from_path(u.path()))
            .unwrap_or_default();
        Self {
            url,
            method: "GET".to_string(),
            destination,
            mode: RequestMode::NoCors,
        }
    }

    /// A top-level page navigation.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            destination: Destination::Document,
            mode: RequestMode::Navigate,
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    pub fn is_http(&self) -> bool {
        Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// URL used as the cache key: the request URL without its fragment.
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

/// Normalize a URL for cache lookups. Unparseable input is used verbatim.
pub fn cache_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, content_type, body)
    }

    /// Exactly 200, the only status written by runtime caching.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Bodies are stored as base64 so cached partitions stay valid JSON.
mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
