use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use qrcode::QrCode;
use thiserror::Error;

/// Errors from QR code generation
#[derive(Error, Debug)]
pub enum QrError {
    #[error("Cannot encode an empty URL")]
    EmptyUrl,

    #[error("Cannot encode {len} bytes as a QR code: {source}")]
    Encode {
        len: usize,
        #[source]
        source: qrcode::types::QrError,
    },
}

/// Render `url` as a square black-on-white QR code of `size` x `size` pixels
///
/// The quiet zone is included. The code is rendered at the smallest module
/// size covering `size` and then scaled down with nearest-neighbour
/// sampling so modules stay crisp.
pub fn encode_url(url: &str, size: u32) -> Result<GrayImage, QrError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(QrError::EmptyUrl);
    }

    let code = QrCode::new(url.as_bytes()).map_err(|source| QrError::Encode {
        len: url.len(),
        source,
    })?;

    let rendered = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(size, size)
        .build();

    if rendered.dimensions() == (size, size) {
        Ok(rendered)
    } else {
        Ok(imageops::resize(&rendered, size, size, FilterType::Nearest))
    }
}
