use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::{EngineBusy, ImageLoadError};
use crate::events::{DisplayMode, PhotoCollection, PhotoDescriptor};
use crate::sequencer::Sequencer;
use crate::surface::{Backdrop, Surface};
use crate::tasks::loader::ImageSize;
use crate::transition::{EngineEvent, Stage, Step, TransitionEngine};

/// Composes the sequencer and the transition engine and owns the advance
/// timer.
///
/// The controller does no I/O. Methods that start a photo swap return the
/// photo whose image must be loaded; the driver reports the outcome through
/// [`SlideshowController::on_image_loaded`] and delivers engine timers
/// through [`SlideshowController::on_transition_timer`]. Deadlines use
/// `tokio::time::Instant`, so a paused runtime clock drives them in tests.
#[derive(Debug)]
pub struct SlideshowController<S> {
    surface: S,
    mode: DisplayMode,
    update_interval: Duration,
    photos: PhotoCollection,
    loaded: bool,
    suspended: bool,
    sequencer: Sequencer,
    engine: TransitionEngine,
    advance_at: Option<Instant>,
    transition_at: Option<Instant>,
    /// A mode switch arrived mid-cycle; clear and re-render once it settles.
    stale_layers: bool,
}

impl<S: Surface> SlideshowController<S> {
    pub fn new(cfg: &Configuration, mode: DisplayMode, surface: S) -> Self {
        Self {
            surface,
            mode,
            update_interval: cfg.update_interval(),
            photos: PhotoCollection::empty(),
            loaded: false,
            suspended: false,
            sequencer: Sequencer::new(cfg.sequential, cfg.random_seed),
            engine: TransitionEngine::new(cfg.transition()),
            advance_at: None,
            transition_at: None,
            stale_layers: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn photos(&self) -> &PhotoCollection {
        &self.photos
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn last_index(&self) -> Option<usize> {
        self.sequencer.last_index()
    }

    pub fn stage(&self) -> &Stage {
        self.engine.stage()
    }

    pub fn next_advance_at(&self) -> Option<Instant> {
        self.advance_at
    }

    pub fn next_transition_at(&self) -> Option<Instant> {
        self.transition_at
    }

    /// Stops scheduling new photos. A swap already in flight still finishes.
    pub fn suspend(&mut self) {
        debug!("slideshow suspended");
        self.suspended = true;
        self.advance_at = None;
    }

    pub fn resume(&mut self) {
        debug!("slideshow resumed");
        self.suspended = false;
        if self.advance_at.is_none() {
            self.arm_advance(self.update_interval);
        }
    }

    /// Picks the next photo and starts a swap to it.
    pub fn advance(&mut self) -> Option<PhotoDescriptor> {
        self.advance_at = None;
        if self.suspended {
            return None;
        }
        if self.photos.is_empty() {
            // keep ticking so a later refresh gets picked up
            self.arm_advance(self.update_interval);
            return None;
        }
        if !self.engine.is_idle() {
            debug!(stage = ?self.engine.stage(), "advance skipped; transition in flight");
            return None;
        }
        let index = self.sequencer.next(&self.photos)?;
        let photo = self.photos[index].clone();
        self.engine.begin(photo.clone(), self.mode).ok()?;
        debug!(index, url = %photo.url, "advancing");
        Some(photo)
    }

    pub fn on_image_loaded(&mut self, result: Result<ImageSize, ImageLoadError>) {
        let event = match result {
            Ok(size) => EngineEvent::Loaded(size),
            Err(err) => {
                debug!(error = %err, "image load error");
                EngineEvent::LoadFailed
            }
        };
        let step = self.engine.handle(event, &mut self.surface);
        self.apply(step);
    }

    pub fn on_transition_timer(&mut self) {
        self.transition_at = None;
        let step = self.engine.handle(EngineEvent::TimerFired, &mut self.surface);
        self.apply(step);
    }

    /// Replaces the photo pool. Only the first load forces a render.
    pub fn on_photos_updated(&mut self, photos: PhotoCollection) -> Option<PhotoDescriptor> {
        info!(count = photos.len(), "photo collection updated");
        self.photos = photos;
        let first = !self.loaded;
        self.loaded = true;
        if first && !self.suspended {
            self.render(self.mode)
        } else {
            None
        }
    }

    /// Applies `mode` and shows a photo right away.
    pub fn render(&mut self, mode: DisplayMode) -> Option<PhotoDescriptor> {
        if mode != self.mode {
            match self.engine.clear(&mut self.surface) {
                Ok(()) => debug!(?mode, "display mode changed; stale layers cleared"),
                Err(EngineBusy) => {
                    debug!(?mode, "display mode changed mid-transition; clearing once settled");
                    self.stale_layers = true;
                }
            }
        }
        self.mode = mode;
        if mode == DisplayMode::Fullscreen {
            let transition = self.engine.config();
            let backdrop = if transition.fill {
                Backdrop::Blurred {
                    radius_px: transition.blur_px,
                }
            } else {
                Backdrop::Color(transition.background_color.clone())
            };
            self.surface.configure_backdrop(backdrop);
        }
        self.advance()
    }

    fn apply(&mut self, step: Step) {
        if matches!(step, Step::Settled | Step::Retry(_)) && std::mem::take(&mut self.stale_layers) {
            if self.engine.clear(&mut self.surface).is_ok() {
                debug!(mode = ?self.mode, "stale layers cleared after transition");
            }
            if !self.suspended {
                self.arm_advance(Duration::ZERO);
            }
            return;
        }
        match step {
            Step::Wait(delay) => self.transition_at = Some(Instant::now() + delay),
            Step::Settled => {
                if !self.suspended && self.advance_at.is_none() {
                    self.arm_advance(self.update_interval);
                }
            }
            Step::Retry(delay) => {
                if !self.suspended {
                    self.arm_advance(delay);
                }
            }
            Step::Ignored => {}
        }
    }

    fn arm_advance(&mut self, delay: Duration) {
        self.advance_at = Some(Instant::now() + delay);
    }
}
