use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::events::DisplayMode;
use crate::processing::layout::FitMode;
use crate::surface::Viewport;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Identifier sent to the photo listing service.
    pub client_id: String,
    /// Listing endpoint; the client id is appended as the last path segment.
    pub photos_endpoint: String,
    /// Base for relative photo URLs. Defaults to `photos-endpoint`.
    pub image_base_url: Option<String>,
    /// Host layout position; `fullscreen*` selects fullscreen mode.
    pub position: Option<String>,
    /// Opacity of the visible photo, 0.0..=1.0.
    pub opacity: f32,
    /// Cross-fade stage duration in milliseconds.
    pub animation_speed_ms: u64,
    /// Time between photo changes in milliseconds.
    pub update_interval_ms: u64,
    /// Time between listing refreshes in milliseconds.
    pub get_interval_ms: u64,
    /// Retry delay for a failed listing before the first success, in ms.
    pub retry_delay_ms: u64,
    /// CSS-style bound of a contained layer.
    pub max_width: String,
    pub max_height: String,
    /// Fill the fullscreen backdrop with a blurred copy of the photo.
    pub fill: bool,
    /// Backdrop blur radius in pixels when `fill` is set.
    pub blur_px: u32,
    /// Solid backdrop in fullscreen mode when `fill` is off.
    pub background_color: Option<String>,
    /// Walk the listing in order instead of picking at random.
    pub sequential: bool,
    /// Optional deterministic seed for random picks.
    pub random_seed: Option<u64>,
    /// Fullscreen sizing against the viewport.
    pub fit: FitMode,
    /// Geometry reported by the headless surface.
    pub viewport: Viewport,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            client_id: "slideshow".to_string(),
            photos_endpoint: "http://127.0.0.1:8080/MMM-ImagesPhotos/photos".to_string(),
            image_base_url: None,
            position: None,
            opacity: 0.9,
            animation_speed_ms: 500,
            update_interval_ms: 5000,
            get_interval_ms: 60_000,
            retry_delay_ms: 2500,
            max_width: "100%".to_string(),
            max_height: "100%".to_string(),
            fill: false,
            blur_px: 8,
            background_color: None,
            sequential: false,
            random_seed: None,
            fit: FitMode::default(),
            viewport: Viewport::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&self.opacity),
            "opacity must be within 0.0..=1.0"
        );
        ensure!(
            self.update_interval_ms > 0,
            "update-interval-ms must be greater than zero"
        );
        ensure!(
            self.get_interval_ms > 0,
            "get-interval-ms must be greater than zero"
        );
        ensure!(!self.client_id.trim().is_empty(), "client-id must not be empty");
        reqwest::Url::parse(&self.photos_endpoint).context("invalid photos-endpoint")?;
        if let Some(base) = &self.image_base_url {
            reqwest::Url::parse(base).context("invalid image-base-url")?;
        }
        Ok(self)
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.position
            .as_deref()
            .map_or(DisplayMode::Contained, DisplayMode::from_position)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn transition(&self) -> TransitionConfig {
        TransitionConfig {
            opacity: self.opacity,
            animation_speed: Duration::from_millis(self.animation_speed_ms),
            fill: self.fill,
            blur_px: self.blur_px,
            background_color: self.background_color.clone(),
            max_width: self.max_width.clone(),
            max_height: self.max_height.clone(),
            fit: self.fit,
        }
    }

    pub fn fetch_timing(&self) -> FetchTiming {
        FetchTiming {
            get_interval: Duration::from_millis(self.get_interval_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Everything the transition engine needs to lay out and fade a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionConfig {
    pub opacity: f32,
    pub animation_speed: Duration,
    pub fill: bool,
    pub blur_px: u32,
    pub background_color: Option<String>,
    pub max_width: String,
    pub max_height: String,
    pub fit: FitMode,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Configuration::default().transition()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTiming {
    /// Cadence of refreshes after a success (and after failures once loaded).
    pub get_interval: Duration,
    /// Delay before retrying while nothing has been loaded yet.
    pub retry_delay: Duration,
}

impl Default for FetchTiming {
    fn default() -> Self {
        Configuration::default().fetch_timing()
    }
}
