pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod processing {
    pub mod layout;
}
pub mod sequencer;
pub mod source;
pub mod surface;
pub mod transition;
pub mod tasks {
    pub mod fetch;
    pub mod loader;
    pub mod slideshow;

    use tokio::time::{Instant, sleep_until};

    /// Sleeps until `due`, or forever when nothing is scheduled.
    pub(crate) async fn sleep_until_due(due: Option<Instant>) {
        match due {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use config::Configuration;
use controller::SlideshowController;
use events::{ControlCommand, DisplayMode, HostSignal, PhotosUpdated};
use source::PhotoSource;
use surface::Surface;
use tasks::fetch::FetchScheduler;
use tasks::loader::ImageLoader;

/// Starts one slideshow instance and runs it until `cancel` fires.
///
/// Spawns the fetch task (waiting for the host's `Ready` on `host_rx`) and
/// the slideshow task (taking `ControlCommand`s from `control_rx`). `mode`
/// governs the first render; `ControlCommand::Render` switches it later.
/// Each call owns its own sequencer, engine and scheduler.
pub async fn run_slideshow<P, L, S>(
    cfg: &Configuration,
    mode: DisplayMode,
    source: P,
    loader: L,
    surface: S,
    host_rx: Receiver<HostSignal>,
    control_rx: Receiver<ControlCommand>,
    cancel: CancellationToken,
) -> Result<()>
where
    P: PhotoSource + 'static,
    L: ImageLoader,
    S: Surface + Send + 'static,
{
    let (photos_tx, photos_rx) = mpsc::channel::<PhotosUpdated>(4); // Fetch -> Slideshow
    let scheduler = FetchScheduler::new(source, cfg.client_id.clone(), cfg.fetch_timing());
    let controller = SlideshowController::new(cfg, mode, surface);

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            tasks::fetch::run(scheduler, host_rx, photos_tx, cancel)
                .await
                .context("fetch task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        let loader = Arc::new(loader);
        async move {
            tasks::slideshow::run(controller, loader, photos_rx, control_rx, cancel)
                .await
                .context("slideshow task failed")
        }
    });

    let mut first_error = None;
    while let Some(res) = tasks.join_next().await {
        // one task ending takes the other down with it
        cancel.cancel();
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("task error: {e:?}");
                first_error.get_or_insert(e);
            }
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
