//! Publishing finished images to ImgBB.

use crate::error::{AppError, Result};
use crate::raster::RasterImage;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::{info, instrument};

pub const IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: Option<String>,
}

/// Interprets an ImgBB response body, returning the public URL.
///
/// # Errors
///
/// [`AppError::UploadFailed`] carrying the host's message when it gives one.
pub fn parse_upload_response(body: &str) -> Result<String> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .map_err(|e| AppError::upload(format!("unreadable response: {}", e)))?;

    match parsed {
        UploadResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data.url),
        UploadResponse { error, .. } => Err(AppError::upload(
            error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Upload failed".to_string()),
        )),
    }
}

/// Uploads images to an ImgBB-compatible endpoint.
#[derive(Clone, Debug)]
pub struct Uploader {
    http: reqwest::Client,
    endpoint: String,
}

impl Uploader {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoint(http, IMGBB_UPLOAD_URL)
    }

    pub fn with_endpoint(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Uploads `image` and returns its public URL.
    ///
    /// The payload is sent as headerless base64 in the `image` form field;
    /// the key travels as the `key` query parameter.
    #[instrument(skip_all, fields(len = image.len()))]
    pub async fn upload(&self, image: &RasterImage, api_key: &str) -> Result<String> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::config("an ImgBB API key is required for sharing"));
        }

        let form = Form::new().text("image", image.to_base64());
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .multipart(form)
            .send()
            .await?;

        // ImgBB reports failures in the JSON body, also on non-2xx statuses
        let body = response.text().await?;
        let url = parse_upload_response(&body)?;
        info!(%url, "uploaded image");
        Ok(url)
    }
}
