//! Appearance metadata for rendered figures.
//!
//! Skin payloads come from an external [`AppearanceSource`] (typically a
//! remote profile service). Fetches run on background tokio tasks and land in
//! a concurrent cache; the tick path only ever reads the cache and falls back
//! to a plain appearance when nothing has arrived yet.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use crate::channel::Appearance;

/// Display name used by phantom figures and fake roster entries.
pub const PHANTOM_DISPLAY_NAME: &str = "Null";

/// Resolves skin payloads by profile name.
#[async_trait]
pub trait AppearanceSource: Send + Sync + Debug {
    /// Fetches the texture payload for `profile_name`, `None` when unknown.
    async fn fetch_textures(&self, profile_name: &str) -> Option<String>;
}

/// Source answering from a fixed table, optionally after a delay.
#[derive(Debug, Default)]
pub struct FixedAppearanceSource {
    textures: HashMap<String, String>,
    delay: Duration,
}

impl FixedAppearanceSource {
    /// Creates a source from `(profile name, payload)` pairs.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            textures: entries.into_iter().collect(),
            delay: Duration::ZERO,
        }
    }

    /// Adds an artificial latency to every fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl AppearanceSource for FixedAppearanceSource {
    async fn fetch_textures(&self, profile_name: &str) -> Option<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.textures.get(profile_name).cloned()
    }
}

/// Non-blocking cache of skin payloads.
pub struct AppearanceCache {
    source: Option<Arc<dyn AppearanceSource>>,
    skin_profile: String,
    textures: DashMap<String, String>,
    in_flight: DashSet<String>,
}

impl AppearanceCache {
    /// Creates a cache that borrows its skin from `skin_profile`.
    #[must_use]
    pub fn new(source: Option<Arc<dyn AppearanceSource>>, skin_profile: impl Into<String>) -> Self {
        Self {
            source,
            skin_profile: skin_profile.into(),
            textures: DashMap::new(),
            in_flight: DashSet::new(),
        }
    }

    /// A cache with no source; every figure gets the plain appearance.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, PHANTOM_DISPLAY_NAME)
    }

    /// Starts a background fetch of the configured skin profile.
    ///
    /// Does nothing without a source, outside a tokio runtime, when the
    /// payload is already cached, or while a fetch is in flight.
    pub fn prefetch(self: &Arc<Self>) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let name = self.skin_profile.clone();
        if self.textures.contains_key(&name) || !self.in_flight.insert(name.clone()) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.in_flight.remove(&name);
            debug!(profile = %name, "no runtime available; skipping appearance prefetch");
            return;
        };
        let cache = Arc::clone(self);
        handle.spawn(async move {
            match source.fetch_textures(&name).await {
                Some(textures) => {
                    debug!(profile = %name, "appearance payload cached");
                    cache.textures.insert(name.clone(), textures);
                }
                None => warn!(profile = %name, "appearance source returned nothing"),
            }
            cache.in_flight.remove(&name);
        });
    }

    /// Appearance for a new figure: fresh identity, cached skin when present.
    #[must_use]
    pub fn appearance_for(&self, display_name: &str) -> Appearance {
        let mut appearance = Appearance::plain(display_name);
        appearance.textures = self
            .textures
            .get(&self.skin_profile)
            .map(|t| t.value().clone());
        appearance
    }

    /// Stores a payload directly.
    pub fn insert(&self, profile_name: &str, textures: String) {
        self.textures.insert(profile_name.to_string(), textures);
    }

    /// Whether the configured skin has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.textures.contains_key(&self.skin_profile)
    }
}

impl Debug for AppearanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppearanceCache")
            .field("skin_profile", &self.skin_profile)
            .field("cached", &self.textures.len())
            .finish_non_exhaustive()
    }
}
