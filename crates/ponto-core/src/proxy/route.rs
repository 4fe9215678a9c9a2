//! Per-request routing decisions

use std::collections::HashSet;

use super::network::{Destination, ProxyRequest};
use crate::config::Config;

const MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif", "woff", "woff2", "ttf", "otf",
    "eot",
];

/// How a request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted; goes straight to the network
    Passthrough,
    CacheFirst,
    NetworkFirst,
}

/// Classification of an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Non-HTTP request; never cached
    Bypass,
    /// Path listed in the static manifest
    StaticManifest,
    /// Call to the remote authority's API
    Api,
    /// Image or font
    Media,
    Default,
}

impl Route {
    pub fn strategy(&self) -> Strategy {
        match self {
            Route::Bypass => Strategy::Passthrough,
            Route::StaticManifest | Route::Media => Strategy::CacheFirst,
            Route::Api | Route::Default => Strategy::NetworkFirst,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Bypass => "bypass",
            Route::StaticManifest => "static-manifest",
            Route::Api => "api",
            Route::Media => "media",
            Route::Default => "default",
        }
    }
}

/// Classifies requests against the manifest and API location
#[derive(Debug, Clone)]
pub struct Router {
    manifest: HashSet<String>,
    api_prefix: String,
    api_url: String,
}

impl Router {
    pub fn new(
        manifest: impl IntoIterator<Item = String>,
        api_prefix: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            manifest: manifest.into_iter().collect(),
            api_prefix: api_prefix.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.static_manifest.iter().cloned(),
            &config.api_prefix,
            &config.api_url,
        )
    }

    /// Rules are checked in order: scheme, manifest, API, media, default
    pub fn classify(&self, request: &ProxyRequest) -> Route {
        let url = match request.parsed_url() {
            Some(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return Route::Bypass,
        };

        if self.manifest.contains(url.path()) {
            return Route::StaticManifest;
        }

        let is_api = (!self.api_prefix.is_empty() && request.url.contains(&self.api_prefix))
            || (!self.api_url.is_empty() && request.url.starts_with(&self.api_url));
        if is_api {
            return Route::Api;
        }

        if matches!(request.destination, Destination::Image | Destination::Font)
            || has_media_extension(url.path())
        {
            return Route::Media;
        }

        Route::Default
    }
}

fn has_media_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
