use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::controller::SlideshowController;
use crate::error::ImageLoadError;
use crate::events::{ControlCommand, PhotoDescriptor, PhotosUpdated};
use crate::surface::Surface;
use crate::tasks::loader::{ImageLoader, ImageSize};
use crate::tasks::sleep_until_due;

/// Drives a [`SlideshowController`]: advance and transition timers, image
/// loads, photo updates and host commands, all on this one task.
#[instrument(skip_all, name = "slideshow")]
pub async fn run<L, S>(
    mut controller: SlideshowController<S>,
    loader: Arc<L>,
    mut photos_rx: Receiver<PhotosUpdated>,
    mut control_rx: Receiver<ControlCommand>,
    cancel: CancellationToken,
) -> Result<()>
where
    L: ImageLoader,
    S: Surface,
{
    let mut loads: JoinSet<Result<ImageSize, ImageLoadError>> = JoinSet::new();

    loop {
        let advance_at = controller.next_advance_at();
        let transition_at = controller.next_transition_at();
        let mut pending: Option<PhotoDescriptor> = None;

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting slideshow task");
                break;
            }

            _ = sleep_until_due(advance_at) => {
                pending = controller.advance();
            }

            _ = sleep_until_due(transition_at) => {
                controller.on_transition_timer();
            }

            Some(joined) = loads.join_next() => {
                let result = joined.unwrap_or_else(|err| {
                    warn!("image load task failed: {err}");
                    Err(ImageLoadError::Aborted)
                });
                controller.on_image_loaded(result);
            }

            Some(PhotosUpdated(photos)) = photos_rx.recv() => {
                pending = controller.on_photos_updated(photos);
            }

            Some(command) = control_rx.recv() => {
                debug!(?command, "control command");
                match command {
                    ControlCommand::Suspend => controller.suspend(),
                    ControlCommand::Resume => controller.resume(),
                    ControlCommand::Render(mode) => pending = controller.render(mode),
                }
            }
        }

        if let Some(photo) = pending {
            let loader = loader.clone();
            loads.spawn(async move { loader.load(&photo.url).await });
        }
    }

    loads.abort_all();
    Ok(())
}
