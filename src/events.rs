use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One entry of the photo listing.
///
/// Only `url` is interpreted; any other fields the listing carries are kept
/// in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PhotoDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Immutable, ordered set of photos as returned by one successful fetch.
///
/// Cloning is cheap; a refresh replaces the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoCollection(Arc<[PhotoDescriptor]>);

impl PhotoCollection {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<Vec<PhotoDescriptor>> for PhotoCollection {
    fn from(photos: Vec<PhotoDescriptor>) -> Self {
        Self(photos.into())
    }
}

impl FromIterator<PhotoDescriptor> for PhotoCollection {
    fn from_iter<I: IntoIterator<Item = PhotoDescriptor>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for PhotoCollection {
    type Target = [PhotoDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Single bounded layer inside the host layout.
    Contained,
    /// Layers placed against the full viewport, with an optional backdrop.
    Fullscreen,
}

impl DisplayMode {
    /// Classifies a host layout position (`fullscreen_below`, `top_left`, ...).
    pub fn from_position(position: &str) -> Self {
        if position.to_ascii_lowercase().starts_with("fullscreen") {
            Self::Fullscreen
        } else {
            Self::Contained
        }
    }
}

/// Fetch task -> slideshow task.
#[derive(Debug, Clone)]
pub struct PhotosUpdated(pub PhotoCollection);

/// Host -> fetch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    /// The photo listing for `id` is ready to be requested.
    Ready(String),
}

/// Host -> slideshow task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Suspend,
    Resume,
    Render(DisplayMode),
}
