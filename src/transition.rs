//! Crossfade state machine over the layer stack.
//!
//! One cycle per photo swap:
//!
//! ```text
//! Idle -> Preloading -> Inserted -> FadingIn -> [HoldBeforeFadeOut -> FadingOut] -> Pruned -> Idle
//! ```
//!
//! The engine owns no timers. Every handler returns a [`Step`]; `Wait(d)`
//! asks the caller to deliver [`EngineEvent::TimerFired`] after `d`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TransitionConfig;
use crate::error::EngineBusy;
use crate::events::{DisplayMode, PhotoDescriptor};
use crate::processing::layout::fit;
use crate::surface::{LayerGeometry, LayerId, LayerSpec, Surface};
use crate::tasks::loader::ImageSize;

/// Pause between inserting a layer and starting its fade-in.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);
/// Pause before the next advance after an image failed to load.
pub const LOAD_RETRY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Idle,
    Preloading {
        photo: PhotoDescriptor,
        mode: DisplayMode,
    },
    Inserted {
        layer: LayerId,
    },
    FadingIn {
        layer: LayerId,
    },
    HoldBeforeFadeOut {
        layer: LayerId,
    },
    FadingOut {
        layer: LayerId,
    },
    Pruned {
        layer: LayerId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Loaded(ImageSize),
    LoadFailed,
    TimerFired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Deliver `TimerFired` after this delay.
    Wait(Duration),
    /// The cycle finished; exactly one layer is left.
    Settled,
    /// The image failed to load; try another advance after this delay.
    Retry(Duration),
    /// The event did not apply to the current stage.
    Ignored,
}

#[derive(Debug)]
pub struct TransitionEngine {
    config: TransitionConfig,
    stage: Stage,
    /// Inserted layers, newest first.
    stack: Vec<LayerId>,
}

impl TransitionEngine {
    pub fn new(config: TransitionConfig) -> Self {
        Self {
            config,
            stage: Stage::Idle,
            stack: Vec::new(),
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn layers(&self) -> &[LayerId] {
        &self.stack
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Starts a cycle for `photo`. The caller loads the image and reports
    /// the outcome with `Loaded` or `LoadFailed`.
    pub fn begin(&mut self, photo: PhotoDescriptor, mode: DisplayMode) -> Result<(), EngineBusy> {
        if !self.is_idle() {
            return Err(EngineBusy);
        }
        debug!(url = %photo.url, ?mode, "transition: preloading");
        self.stage = Stage::Preloading { photo, mode };
        Ok(())
    }

    pub fn handle(&mut self, event: EngineEvent, surface: &mut impl Surface) -> Step {
        let stage = std::mem::replace(&mut self.stage, Stage::Idle);
        match (stage, event) {
            (Stage::Preloading { photo, .. }, EngineEvent::LoadFailed) => {
                warn!(url = %photo.url, "image load failed; retrying another photo");
                Step::Retry(LOAD_RETRY_DELAY)
            }
            (Stage::Preloading { photo, mode }, EngineEvent::Loaded(size)) => {
                self.insert(&photo, mode, size, surface)
            }
            (Stage::Inserted { layer }, EngineEvent::TimerFired) => {
                self.enter(Stage::FadingIn { layer }, surface)
            }
            (Stage::HoldBeforeFadeOut { layer }, EngineEvent::TimerFired) => {
                self.enter(Stage::FadingOut { layer }, surface)
            }
            (Stage::FadingOut { layer }, EngineEvent::TimerFired) => {
                self.enter(Stage::Pruned { layer }, surface)
            }
            (stage, event) => {
                debug!(?stage, ?event, "transition: event ignored");
                self.stage = stage;
                Step::Ignored
            }
        }
    }

    /// Drops every layer. Only valid between cycles.
    pub fn clear(&mut self, surface: &mut impl Surface) -> Result<(), EngineBusy> {
        if !self.is_idle() {
            return Err(EngineBusy);
        }
        for layer in self.stack.drain(..) {
            surface.remove_layer(layer);
        }
        Ok(())
    }

    fn insert(
        &mut self,
        photo: &PhotoDescriptor,
        mode: DisplayMode,
        size: ImageSize,
        surface: &mut impl Surface,
    ) -> Step {
        let fade = self.config.animation_speed;
        let spec = match mode {
            DisplayMode::Fullscreen => {
                let (tw, th) = surface.viewport().target();
                let rect = fit(
                    i64::from(size.width),
                    i64::from(size.height),
                    tw,
                    th,
                    self.config.fit.letterbox(),
                );
                LayerSpec {
                    image_url: photo.url.clone(),
                    geometry: LayerGeometry::Placed(rect),
                    opacity: 0.0,
                    fade,
                }
            }
            DisplayMode::Contained => LayerSpec {
                image_url: photo.url.clone(),
                geometry: LayerGeometry::Bounded {
                    max_width: self.config.max_width.clone(),
                    max_height: self.config.max_height.clone(),
                },
                opacity: self.config.opacity,
                fade,
            },
        };

        let layer = surface.create_layer(spec);
        surface.insert_front(layer);
        self.stack.insert(0, layer);
        info!(url = %photo.url, layer, depth = self.stack.len(), "showing photo");

        match mode {
            DisplayMode::Fullscreen => {
                if self.config.fill {
                    surface.set_backdrop_image(&photo.url);
                }
                self.enter(Stage::Inserted { layer }, surface)
            }
            DisplayMode::Contained => self.enter(Stage::Pruned { layer }, surface),
        }
    }

    /// Performs the entry action of `stage` and follows immediate
    /// transitions until a stage needs to wait or the cycle ends.
    fn enter(&mut self, mut stage: Stage, surface: &mut impl Surface) -> Step {
        loop {
            match stage {
                Stage::Inserted { .. } => {
                    self.stage = stage;
                    return Step::Wait(SETTLE_DELAY);
                }
                Stage::FadingIn { layer } => {
                    surface.set_opacity(layer, self.config.opacity);
                    stage = if self.stack.len() > 1 {
                        Stage::HoldBeforeFadeOut { layer }
                    } else {
                        Stage::Pruned { layer }
                    };
                }
                Stage::HoldBeforeFadeOut { .. } => {
                    self.stage = stage;
                    return Step::Wait(self.config.animation_speed);
                }
                Stage::FadingOut { layer } => {
                    for older in self.stack.iter().filter(|id| **id != layer) {
                        surface.set_opacity(*older, 0.0);
                    }
                    self.stage = stage;
                    return Step::Wait(self.config.animation_speed);
                }
                Stage::Pruned { layer } => {
                    for older in self.stack.iter().filter(|id| **id != layer) {
                        surface.remove_layer(*older);
                    }
                    self.stack.retain(|id| *id == layer);
                    stage = Stage::Idle;
                }
                Stage::Idle => {
                    self.stage = Stage::Idle;
                    debug!(depth = self.stack.len(), "transition settled");
                    return Step::Settled;
                }
                Stage::Preloading { .. } => {
                    self.stage = stage;
                    return Step::Ignored;
                }
            }
        }
    }
}
