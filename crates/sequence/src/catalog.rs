use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::FrameNumber;
use crate::ConfigError;

pub const FRAME_PLACEHOLDER: &str = "{frame}";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewName(String);

impl ViewName {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for ViewName {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// Resolution class of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Low,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::High => f.write_str("high-res"),
            Tier::Low => f.write_str("low-res"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTemplates {
    pub high: String,
    pub low: String,
}

impl ViewTemplates {
    pub fn new(high: impl Into<String>, low: impl Into<String>) -> Self {
        Self { high: high.into(), low: low.into() }
    }

    fn template(&self, tier: Tier) -> &str {
        match tier {
            Tier::High => &self.high,
            Tier::Low => &self.low,
        }
    }
}

/// Concrete, immutable address of one (view, frame, tier) asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    view: ViewName,
    frame: FrameNumber,
    tier: Tier,
    path: String,
}

impl ResourceId {
    pub fn view(&self) -> &ViewName { &self.view }

    pub fn frame(&self) -> FrameNumber { self.frame }

    pub fn tier(&self) -> Tier { self.tier }

    pub fn path(&self) -> &str { &self.path }

    /// Fetch path that bypasses intermediate HTTP caches. Never used as a cache key.
    pub fn cache_busted(&self, nonce: impl fmt::Display) -> String {
        let sep = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{}retry={}", self.path, sep, nonce)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.path) }
}

/// Path templates for every known view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewCatalog(BTreeMap<ViewName, ViewTemplates>);

impl Default for ViewCatalog {
    fn default() -> Self {
        let mut views = BTreeMap::new();
        views.insert(
            ViewName::from("aerienne"),
            ViewTemplates::new(
                "/assets/sequences/aerial/aerial/{frame}.webp",
                "/assets/sequences/aerial/aerial/low/{frame}.webp",
            ),
        );
        views.insert(
            ViewName::from("villas"),
            ViewTemplates::new(
                "/assets/sequences/villas/villas/{frame}.webp",
                "/assets/sequences/villas/villas/low/{frame}.webp",
            ),
        );
        views.insert(
            ViewName::from("parcelles"),
            ViewTemplates::new(
                "/assets/sequences/Parcelles/{frame}.webp",
                "/assets/sequences/Parcelles/low/{frame}.webp",
            ),
        );
        Self(views)
    }
}

impl ViewCatalog {
    pub fn new() -> Self { Self(BTreeMap::new()) }

    pub fn insert(&mut self, view: ViewName, templates: ViewTemplates) {
        self.0.insert(view, templates);
    }

    pub fn contains(&self, view: &ViewName) -> bool { self.0.contains_key(view) }

    pub fn views(&self) -> impl Iterator<Item = &ViewName> { self.0.keys() }

    /// Looks a view up by name, failing on names outside the catalog.
    pub fn view(&self, name: &str) -> Result<ViewName, ConfigError> {
        let view = ViewName::from(name);
        if self.contains(&view) {
            Ok(view)
        } else {
            Err(ConfigError::UnknownView(name.to_string()))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::NoViews);
        }
        for (view, templates) in &self.0 {
            for tier in [Tier::High, Tier::Low] {
                if !templates.template(tier).contains(FRAME_PLACEHOLDER) {
                    return Err(ConfigError::MissingPlaceholder { view: view.to_string(), tier });
                }
            }
        }
        Ok(())
    }

    pub fn resolve(&self, view: &ViewName, frame: FrameNumber, tier: Tier) -> Result<ResourceId, ConfigError> {
        let templates = self
            .0
            .get(view)
            .ok_or_else(|| ConfigError::UnknownView(view.to_string()))?;
        let padded = format!("{:04}", frame.get());
        let path = templates.template(tier).replace(FRAME_PLACEHOLDER, &padded);
        Ok(ResourceId { view: view.clone(), frame, tier, path })
    }
}
