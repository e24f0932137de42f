use super::{FetchError, ImageSource, http};
use async_trait::async_trait;
use image::RgbaImage;
use image::imageops::FilterType;

/// Downloads a single remote image
///
/// Stateless apart from the HTTP client; supersession and cancellation are
/// handled one level up by [`crate::engine::images::ImageLoader`].
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch the raw image bytes
    ///
    /// # Errors
    ///
    /// [`FetchError`] on transport failure, timeout or non-success status.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        http::get_bytes(&self.client, url).await
    }
}

#[async_trait]
impl ImageSource for ImageFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch(url).await
    }
}

/// Decode image bytes and scale them down to fit `max_width` x `max_height`
///
/// Aspect ratio is preserved; images already inside the box are not scaled up.
pub fn decode_to_fit(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
    url: &str,
) -> Result<RgbaImage, FetchError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| FetchError::parse("image", url, e))?;

    let fitted = if decoded.width() > max_width || decoded.height() > max_height {
        decoded.resize(max_width, max_height, FilterType::Triangle)
    } else {
        decoded
    };

    Ok(fitted.to_rgba8())
}
