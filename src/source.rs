use std::future::Future;

use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::error::FetchError;
use crate::events::PhotoCollection;

/// The photo listing service.
pub trait PhotoSource: Send + Sync {
    fn fetch(&self, client_id: &str) -> impl Future<Output = Result<PhotoCollection, FetchError>> + Send;
}

/// `GET {endpoint}/{client_id}` returning a JSON array of photo descriptors.
#[derive(Debug, Clone)]
pub struct HttpPhotoSource {
    client: Client,
    endpoint: Url,
}

impl HttpPhotoSource {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn listing_url(&self, client_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(client_id);
        }
        url
    }
}

impl PhotoSource for HttpPhotoSource {
    async fn fetch(&self, client_id: &str) -> Result<PhotoCollection, FetchError> {
        let url = self.listing_url(client_id);
        debug!(%url, "requesting photo listing");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
