use std::future::Future;
use std::io::Cursor;

use reqwest::{Client, Url};
use tracing::debug;

use crate::error::ImageLoadError;

/// Pixel size of a loaded image, after EXIF orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Confirms that a photo's image resource is available before it is shown.
pub trait ImageLoader: Send + Sync + 'static {
    fn load(&self, url: &str) -> impl Future<Output = Result<ImageSize, ImageLoadError>> + Send;
}

/// Downloads the image over HTTP and probes its header for dimensions.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    client: Client,
    base: Url,
}

impl HttpImageLoader {
    /// `base` resolves relative photo URLs such as `/photos/a.jpg`.
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn resolve(&self, url: &str) -> Result<Url, ImageLoadError> {
        self.base
            .join(url)
            .map_err(|_| ImageLoadError::BadUrl(url.to_string()))
    }
}

impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<ImageSize, ImageLoadError> {
        let resolved = self.resolve(url)?;
        let response = self.client.get(resolved).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        let size = tokio::task::spawn_blocking(move || probe_dimensions(&bytes))
            .await
            .map_err(|_| ImageLoadError::Aborted)??;
        debug!(url, width = size.width, height = size.height, "image loaded");
        Ok(size)
    }
}

/// Reads the image header and swaps axes for EXIF orientations 5-8.
pub fn probe_dimensions(bytes: &[u8]) -> Result<ImageSize, ImageLoadError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_dimensions()?;
    let orientation = read_orientation(bytes).unwrap_or(1);
    Ok(match orientation {
        // transpose, rotate 90, transverse, rotate 270
        5..=8 => ImageSize::new(height, width),
        _ => ImageSize::new(width, height),
    })
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!("exif orientation {}", o);
    Some(o)
}
