//! Abstract rendering surface and an in-memory implementation.
//!
//! The slideshow never draws pixels itself. It emits layer operations against
//! a [`Surface`]; whatever sits behind it (a browser DOM, a GPU compositor,
//! a log) decides how opacity changes are interpolated on screen.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::processing::layout::FitRect;

pub type LayerId = u64;

/// Visible area as reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Viewport {
    pub width: i64,
    pub height: i64,
    /// Computed outer margin; fullscreen layers extend over it on every side.
    pub margin: i64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            margin: 0,
        }
    }
}

impl Viewport {
    /// Box a fullscreen photo is fitted into.
    pub fn target(&self) -> (i64, i64) {
        (
            self.width + self.margin * 2,
            self.height + self.margin * 2,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerGeometry {
    /// Absolutely placed, computed by [`crate::processing::layout::fit`].
    Placed(FitRect),
    /// Laid out by the host within CSS-style maximum bounds.
    Bounded { max_width: String, max_height: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub image_url: String,
    pub geometry: LayerGeometry,
    pub opacity: f32,
    /// Duration over which the surface interpolates opacity changes.
    pub fade: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backdrop {
    Blurred { radius_px: u32 },
    Color(Option<String>),
}

pub trait Surface {
    fn create_layer(&mut self, spec: LayerSpec) -> LayerId;
    /// Puts a created layer at the front of the stack.
    fn insert_front(&mut self, layer: LayerId);
    fn set_opacity(&mut self, layer: LayerId, opacity: f32);
    fn remove_layer(&mut self, layer: LayerId);
    fn viewport(&self) -> Viewport;
    fn configure_backdrop(&mut self, backdrop: Backdrop);
    fn set_backdrop_image(&mut self, url: &str);
}

/// Lets a surface be shared between the slideshow task and an observer.
impl<T: Surface> Surface for Arc<Mutex<T>> {
    fn create_layer(&mut self, spec: LayerSpec) -> LayerId {
        self.lock().unwrap_or_else(PoisonError::into_inner).create_layer(spec)
    }

    fn insert_front(&mut self, layer: LayerId) {
        self.lock().unwrap_or_else(PoisonError::into_inner).insert_front(layer)
    }

    fn set_opacity(&mut self, layer: LayerId, opacity: f32) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_opacity(layer, opacity)
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.lock().unwrap_or_else(PoisonError::into_inner).remove_layer(layer)
    }

    fn viewport(&self) -> Viewport {
        self.lock().unwrap_or_else(PoisonError::into_inner).viewport()
    }

    fn configure_backdrop(&mut self, backdrop: Backdrop) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .configure_backdrop(backdrop)
    }

    fn set_backdrop_image(&mut self, url: &str) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_backdrop_image(url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessLayer {
    pub spec: LayerSpec,
    pub opacity: f32,
}

/// In-memory surface: keeps the layer stack and logs every operation.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    viewport: Viewport,
    next_id: LayerId,
    layers: BTreeMap<LayerId, HeadlessLayer>,
    /// Front first.
    stack: Vec<LayerId>,
    backdrop: Option<Backdrop>,
    backdrop_image: Option<String>,
}

impl HeadlessSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn shared(viewport: Viewport) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(viewport)))
    }

    /// Inserted layers, front first.
    pub fn stack(&self) -> &[LayerId] {
        &self.stack
    }

    pub fn layer(&self, id: LayerId) -> Option<&HeadlessLayer> {
        self.layers.get(&id)
    }

    /// The front layer's image, i.e. what is becoming or is visible.
    pub fn front_url(&self) -> Option<&str> {
        self.stack
            .first()
            .and_then(|id| self.layers.get(id))
            .map(|layer| layer.spec.image_url.as_str())
    }

    pub fn backdrop(&self) -> Option<&Backdrop> {
        self.backdrop.as_ref()
    }

    pub fn backdrop_image(&self) -> Option<&str> {
        self.backdrop_image.as_deref()
    }
}

impl Surface for HeadlessSurface {
    fn create_layer(&mut self, spec: LayerSpec) -> LayerId {
        self.next_id += 1;
        let id = self.next_id;
        debug!(layer = id, url = %spec.image_url, geometry = ?spec.geometry, "surface: create layer");
        let opacity = spec.opacity;
        self.layers.insert(id, HeadlessLayer { spec, opacity });
        id
    }

    fn insert_front(&mut self, layer: LayerId) {
        if !self.layers.contains_key(&layer) {
            warn!(layer, "surface: insert of unknown layer");
            return;
        }
        self.stack.retain(|id| *id != layer);
        self.stack.insert(0, layer);
        debug!(layer, depth = self.stack.len(), "surface: insert front");
    }

    fn set_opacity(&mut self, layer: LayerId, opacity: f32) {
        match self.layers.get_mut(&layer) {
            Some(entry) => {
                debug!(layer, opacity, "surface: set opacity");
                entry.opacity = opacity;
            }
            None => warn!(layer, "surface: opacity for unknown layer"),
        }
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.stack.retain(|id| *id != layer);
        if self.layers.remove(&layer).is_some() {
            debug!(layer, depth = self.stack.len(), "surface: remove layer");
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn configure_backdrop(&mut self, backdrop: Backdrop) {
        debug!(?backdrop, "surface: configure backdrop");
        self.backdrop = Some(backdrop);
    }

    fn set_backdrop_image(&mut self, url: &str) {
        debug!(url, "surface: backdrop image");
        self.backdrop_image = Some(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(url: &str) -> LayerSpec {
        LayerSpec {
            image_url: url.to_string(),
            geometry: LayerGeometry::Bounded {
                max_width: "100%".into(),
                max_height: "100%".into(),
            },
            opacity: 0.0,
            fade: Duration::from_millis(500),
        }
    }

    #[test]
    fn insert_front_orders_newest_first() {
        let mut surface = HeadlessSurface::new(Viewport::default());
        let a = surface.create_layer(spec("a"));
        let b = surface.create_layer(spec("b"));
        assert!(surface.stack().is_empty());
        surface.insert_front(a);
        surface.insert_front(b);
        assert_eq!(surface.stack(), &[b, a]);
        assert_eq!(surface.front_url(), Some("b"));

        surface.remove_layer(a);
        assert_eq!(surface.stack(), &[b]);
        assert!(surface.layer(a).is_none());
    }

    #[test]
    fn viewport_target_includes_margins() {
        let vp = Viewport {
            width: 1000,
            height: 600,
            margin: 8,
        };
        assert_eq!(vp.target(), (1016, 616));
    }
}
