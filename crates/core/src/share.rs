//! QR codes pointing at a published image.

use crate::error::{AppError, Result};
use crate::raster::RasterImage;
use url::Url;

pub const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const QR_SIZE: u32 = 150;

/// URL of a `QR_SIZE`-square PNG encoding `public_url`.
pub fn qr_code_url(public_url: &str) -> Result<Url> {
    let size = format!("{0}x{0}", QR_SIZE);
    Url::parse_with_params(QR_SERVICE_URL, &[("size", size.as_str()), ("data", public_url)])
        .map_err(|e| AppError::config(format!("Invalid QR service URL: {}", e)))
}

/// Downloads the QR code image for `public_url`.
pub async fn fetch_qr_code(http: &reqwest::Client, public_url: &str) -> Result<RasterImage> {
    let response = http.get(qr_code_url(public_url)?).send().await?.error_for_status()?;
    let bytes = response.bytes().await?.to_vec();
    Ok(RasterImage::from_bytes(bytes))
}
