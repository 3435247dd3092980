use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_photo_slideshow::config::Configuration;
use rust_photo_slideshow::error::{FetchError, ImageLoadError};
use rust_photo_slideshow::events::{
    ControlCommand, DisplayMode, HostSignal, PhotoCollection, PhotoDescriptor,
};
use rust_photo_slideshow::run_slideshow;
use rust_photo_slideshow::source::PhotoSource;
use rust_photo_slideshow::surface::{HeadlessSurface, LayerGeometry, Viewport};
use rust_photo_slideshow::tasks::loader::{ImageLoader, ImageSize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct ScriptedSource {
    replies: Arc<Mutex<VecDeque<Result<PhotoCollection, FetchError>>>>,
    fallback: Arc<Mutex<Option<PhotoCollection>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedSource {
    /// Every fetch succeeds with `urls`.
    fn always(urls: &[&str]) -> Self {
        let source = Self::default();
        *source.fallback.lock().unwrap() = Some(collection(urls));
        source
    }

    fn then(self, reply: Result<PhotoCollection, FetchError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl PhotoSource for ScriptedSource {
    async fn fetch(&self, _client_id: &str) -> Result<PhotoCollection, FetchError> {
        *self.calls.lock().unwrap() += 1;
        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply,
            None => match self.fallback.lock().unwrap().clone() {
                Some(photos) => Ok(photos),
                None => Err(FetchError::Status(503)),
            },
        }
    }
}

#[derive(Clone, Default)]
struct StaticLoader {
    broken: HashSet<String>,
}

impl ImageLoader for StaticLoader {
    async fn load(&self, url: &str) -> Result<ImageSize, ImageLoadError> {
        if self.broken.contains(url) {
            Err(ImageLoadError::Status(404))
        } else {
            Ok(ImageSize::new(1600, 900))
        }
    }
}

fn collection(urls: &[&str]) -> PhotoCollection {
    urls.iter().map(|u| PhotoDescriptor::new(*u)).collect()
}

fn cfg() -> Configuration {
    Configuration {
        client_id: "frame".to_string(),
        sequential: true,
        viewport: Viewport {
            width: 1000,
            height: 1000,
            margin: 0,
        },
        ..Configuration::default()
    }
}

struct Harness {
    surface: Arc<Mutex<HeadlessSurface>>,
    host_tx: mpsc::Sender<HostSignal>,
    control_tx: mpsc::Sender<ControlCommand>,
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    async fn start(
        cfg: Configuration,
        mode: DisplayMode,
        source: ScriptedSource,
        loader: StaticLoader,
    ) -> Self {
        let surface = HeadlessSurface::shared(cfg.viewport);
        let (host_tx, host_rx) = mpsc::channel(4);
        let (control_tx, control_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let surface = surface.clone();
            let cancel = cancel.clone();
            async move {
                run_slideshow(&cfg, mode, source, loader, surface, host_rx, control_rx, cancel)
                    .await
            }
        });
        Self {
            surface,
            host_tx,
            control_tx,
            cancel,
            handle,
        }
    }

    async fn ready(&self, id: &str) {
        self.host_tx
            .send(HostSignal::Ready(id.to_string()))
            .await
            .unwrap();
    }

    async fn command(&self, command: ControlCommand) {
        self.control_tx.send(command).await.unwrap();
    }

    /// (front url, number of layers, opacities front first)
    fn snapshot(&self) -> (Option<String>, usize, Vec<f32>) {
        let surface = self.surface.lock().unwrap();
        let opacities = surface
            .stack()
            .iter()
            .map(|id| surface.layer(*id).unwrap().opacity)
            .collect();
        (
            surface.front_url().map(str::to_string),
            surface.stack().len(),
            opacities,
        )
    }

    fn front_geometry(&self) -> Option<LayerGeometry> {
        let surface = self.surface.lock().unwrap();
        let front = *surface.stack().first()?;
        Some(surface.layer(front)?.spec.geometry.clone())
    }

    async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

#[tokio::test(start_paused = true)]
async fn fullscreen_crossfade_converges_to_one_layer() {
    let source = ScriptedSource::always(&["a.jpg", "b.jpg"]);
    let h = Harness::start(cfg(), DisplayMode::Fullscreen, source, StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(25)).await;
    assert_eq!(h.snapshot(), (Some("a.jpg".into()), 1, vec![0.0]));

    sleep(Duration::from_millis(75)).await; // t = 100
    assert_eq!(h.snapshot(), (Some("a.jpg".into()), 1, vec![0.9]));

    // next advance at 50 + 5000, new layer fades in at 5100
    sleep(Duration::from_millis(5200)).await; // t = 5300
    assert_eq!(h.snapshot(), (Some("b.jpg".into()), 2, vec![0.9, 0.9]));

    sleep(Duration::from_millis(500)).await; // t = 5800
    assert_eq!(h.snapshot(), (Some("b.jpg".into()), 2, vec![0.9, 0.0]));

    sleep(Duration::from_millis(400)).await; // t = 6200
    assert_eq!(h.snapshot(), (Some("b.jpg".into()), 1, vec![0.9]));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn contained_mode_replaces_layer_directly() {
    let source = ScriptedSource::always(&["a.jpg", "b.jpg"]);
    let h = Harness::start(cfg(), DisplayMode::Contained, source, StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.snapshot(), (Some("a.jpg".into()), 1, vec![0.9]));

    sleep(Duration::from_millis(5000)).await;
    assert_eq!(h.snapshot(), (Some("b.jpg".into()), 1, vec![0.9]));

    sleep(Duration::from_millis(5000)).await;
    assert_eq!(h.snapshot(), (Some("a.jpg".into()), 1, vec![0.9]));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unauthorized_listing_is_never_polled_again() {
    let source = ScriptedSource::always(&["a.jpg"]).then(Err(FetchError::Unauthorized));
    let h = Harness::start(cfg(), DisplayMode::Contained, source.clone(), StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(h.snapshot().1, 0);

    // a new ready signal does not revive a halted loop
    h.ready("frame").await;
    sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failure_before_first_load_retries_after_retry_delay() {
    let source = ScriptedSource::always(&["a.jpg"]).then(Err(FetchError::Status(500)));
    let h = Harness::start(cfg(), DisplayMode::Contained, source.clone(), StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(2400)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(h.snapshot().1, 0);

    sleep(Duration::from_millis(200)).await; // t = 2600
    assert_eq!(source.calls(), 2);
    assert_eq!(h.snapshot().0.as_deref(), Some("a.jpg"));

    // regular cadence afterwards
    sleep(Duration::from_millis(60_000)).await;
    assert_eq!(source.calls(), 3);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failure_after_load_keeps_regular_cadence() {
    let source = ScriptedSource::always(&["a.jpg"])
        .then(Ok(collection(&["a.jpg"])))
        .then(Err(FetchError::Status(502)));
    let h = Harness::start(cfg(), DisplayMode::Contained, source.clone(), StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(60_100)).await;
    assert_eq!(source.calls(), 2);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(source.calls(), 2, "no retry-delay backoff once loaded");

    sleep(Duration::from_millis(57_500)).await; // t = 120_100
    assert_eq!(source.calls(), 3);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn ready_for_another_client_is_ignored() {
    let source = ScriptedSource::always(&["a.jpg"]);
    let h = Harness::start(cfg(), DisplayMode::Contained, source.clone(), StaticLoader::default()).await;
    h.ready("someone-else").await;

    sleep(Duration::from_secs(120)).await;
    assert_eq!(source.calls(), 0);

    h.ready("frame").await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(source.calls(), 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn broken_image_is_skipped_after_a_second() {
    let source = ScriptedSource::always(&["broken.jpg", "ok.jpg"]);
    let loader = StaticLoader {
        broken: HashSet::from(["broken.jpg".to_string()]),
    };
    let h = Harness::start(cfg(), DisplayMode::Contained, source, loader).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(500)).await;
    assert_eq!(h.snapshot().1, 0);

    sleep(Duration::from_millis(600)).await; // t = 1100
    assert_eq!(h.snapshot(), (Some("ok.jpg".into()), 1, vec![0.9]));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn suspend_holds_the_current_photo_until_resume() {
    let source = ScriptedSource::always(&["a.jpg", "b.jpg"]);
    let h = Harness::start(cfg(), DisplayMode::Contained, source, StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(100)).await;
    h.command(ControlCommand::Suspend).await;

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.snapshot(), (Some("a.jpg".into()), 1, vec![0.9]));

    h.command(ControlCommand::Resume).await;
    sleep(Duration::from_millis(4900)).await;
    assert_eq!(h.snapshot().0.as_deref(), Some("a.jpg"));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(h.snapshot().0.as_deref(), Some("b.jpg"));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn refreshed_pool_is_used_by_later_advances_only() {
    let source = ScriptedSource::always(&["new.jpg"]).then(Ok(collection(&["old.jpg"])));
    let cfg = Configuration {
        get_interval_ms: 1000,
        ..cfg()
    };
    let h = Harness::start(cfg, DisplayMode::Contained, source.clone(), StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(h.snapshot().0.as_deref(), Some("old.jpg"));

    sleep(Duration::from_millis(4000)).await; // t = 5500, after the advance at 5000
    assert_eq!(h.snapshot().0.as_deref(), Some("new.jpg"));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn first_render_uses_the_mode_given_at_start() {
    let source = ScriptedSource::always(&["a.jpg"]);
    let h = Harness::start(cfg(), DisplayMode::Fullscreen, source, StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(25)).await;
    assert!(
        matches!(h.front_geometry(), Some(LayerGeometry::Placed(rect)) if rect.width == 1000 && rect.height == 562),
        "{:?}",
        h.front_geometry()
    );

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn render_command_switches_mode_for_the_next_photo() {
    let source = ScriptedSource::always(&["a.jpg", "b.jpg"]);
    let h = Harness::start(cfg(), DisplayMode::Contained, source, StaticLoader::default()).await;
    h.ready("frame").await;

    sleep(Duration::from_millis(100)).await;
    assert!(matches!(h.front_geometry(), Some(LayerGeometry::Bounded { .. })));

    h.command(ControlCommand::Render(DisplayMode::Fullscreen)).await;
    sleep(Duration::from_millis(25)).await;
    assert_eq!(h.snapshot(), (Some("b.jpg".into()), 1, vec![0.0]));
    assert!(matches!(h.front_geometry(), Some(LayerGeometry::Placed(_))));

    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.snapshot(), (Some("b.jpg".into()), 1, vec![0.9]));

    h.stop().await;
}
