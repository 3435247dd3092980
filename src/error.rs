use thiserror::Error;

/// Failure of one photo-listing request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The listing service rejected our identifier. Not retried.
    #[error("photo listing rejected the client (401 unauthorized)")]
    Unauthorized,

    /// Any other non-success HTTP status.
    #[error("photo listing returned status {0}")]
    Status(u16),

    /// Connection, timeout or body transfer failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The body was not a JSON array of photo descriptors.
    #[error("malformed photo listing: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    /// Fail-stop errors halt the refresh loop instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Failure to load the image resource behind one photo URL.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("invalid image url {0}")]
    BadUrl(String),

    #[error("image request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("image request returned status {0}")]
    Status(u16),

    #[error("image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image load task aborted")]
    Aborted,
}

/// A transition cycle is still running.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("transition already in progress")]
pub struct EngineBusy;
