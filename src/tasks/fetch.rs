use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::FetchTiming;
use crate::error::FetchError;
use crate::events::{HostSignal, PhotoCollection, PhotosUpdated};
use crate::source::PhotoSource;
use crate::tasks::sleep_until_due;

/// Refresh policy and the single pending "next refresh" deadline.
#[derive(Debug)]
pub struct FetchScheduler<P> {
    source: P,
    client_id: String,
    timing: FetchTiming,
    loaded: bool,
    halted: bool,
    next_refresh: Option<Instant>,
}

impl<P: PhotoSource> FetchScheduler<P> {
    pub fn new(source: P, client_id: impl Into<String>, timing: FetchTiming) -> Self {
        Self {
            source,
            client_id: client_id.into(),
            timing,
            loaded: false,
            halted: false,
            next_refresh: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// At least one fetch has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// An unauthorized response stopped the loop for good.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn next_refresh(&self) -> Option<Instant> {
        self.next_refresh
    }

    /// Arms the next refresh, replacing any pending one. `None` uses the
    /// regular `get_interval` cadence.
    pub fn schedule_next(&mut self, delay: Option<Duration>) {
        if self.halted {
            return;
        }
        let delay = delay.unwrap_or(self.timing.get_interval);
        debug!(delay_ms = delay.as_millis() as u64, "next photo refresh scheduled");
        self.next_refresh = Some(Instant::now() + delay);
    }

    /// Fetches the listing once and schedules the follow-up.
    ///
    /// Returns the new collection on success. Failures are logged and
    /// handled here; they never reach the caller.
    pub async fn refresh(&mut self) -> Option<PhotoCollection> {
        self.next_refresh = None;
        if self.halted {
            return None;
        }
        let outcome = self.source.fetch(&self.client_id).await;
        self.complete(outcome)
    }

    fn complete(&mut self, outcome: Result<PhotoCollection, FetchError>) -> Option<PhotoCollection> {
        match outcome {
            Ok(photos) => {
                info!(count = photos.len(), "photo listing refreshed");
                self.loaded = true;
                self.schedule_next(None);
                Some(photos)
            }
            Err(err) if err.is_fatal() => {
                error!(client_id = %self.client_id, error = %err, "photo listing refused; refresh stopped");
                self.halted = true;
                None
            }
            Err(err) => {
                warn!(client_id = %self.client_id, error = %err, "could not load photos");
                let delay = if self.loaded {
                    None
                } else {
                    Some(self.timing.retry_delay)
                };
                self.schedule_next(delay);
                None
            }
        }
    }
}

/// Keeps the photo collection fresh.
///
/// Nothing is fetched until the host signals `Ready` for our client id. Each
/// new collection is forwarded to the slideshow task.
#[instrument(skip_all, fields(client_id = %scheduler.client_id()))]
pub async fn run<P: PhotoSource>(
    mut scheduler: FetchScheduler<P>,
    mut host_rx: Receiver<HostSignal>,
    to_slideshow: Sender<PhotosUpdated>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let due = scheduler.next_refresh();
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting fetch task");
                break;
            }

            Some(HostSignal::Ready(id)) = host_rx.recv() => {
                if id != scheduler.client_id() {
                    debug!(%id, "ready signal for another client; ignored");
                    continue;
                }
                if scheduler.is_halted() {
                    debug!("ready signal ignored; refresh loop halted");
                    continue;
                }
                scheduler.schedule_next(Some(Duration::ZERO));
            }

            _ = sleep_until_due(due) => {
                let refreshed = tokio::select! {
                    _ = cancel.cancelled() => break,
                    refreshed = scheduler.refresh() => refreshed,
                };
                if let Some(photos) = refreshed {
                    if to_slideshow.send(PhotosUpdated(photos)).await.is_err() {
                        warn!("slideshow channel closed");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}
