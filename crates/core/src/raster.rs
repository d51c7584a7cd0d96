//! Encoded image values exchanged between pipeline stages.
//!
//! A [`RasterImage`] is always an *encoded* image (JPEG, PNG, ...) together
//! with its MIME type. Pixel work decodes it on demand; every boundary
//! (Gemini parts, ImgBB upload, data URLs, files) uses the encoded bytes.

use crate::error::{AppError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::io::Cursor;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";

/// An encoded image with its declared MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl RasterImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Wraps raw file bytes, sniffing the MIME type from the content.
    ///
    /// Unrecognized content is tagged `application/octet-stream`; decoding it
    /// later fails with a descriptive error instead of here.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self { mime_type, bytes }
    }

    /// Decodes a base64 payload with a known MIME type.
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| AppError::InvalidImagePayload(format!("bad base64: {}", e)))?;
        Ok(Self::new(mime_type, bytes))
    }

    /// Parses a `data:<mime>;base64,<payload>` URL.
    ///
    /// A bare base64 string without the header is accepted as well; its MIME
    /// type is then sniffed from the decoded bytes.
    pub fn from_data_url(input: &str) -> Result<Self> {
        let input = input.trim();
        match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| AppError::InvalidImagePayload("data URL has no payload".into()))?;
                let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
                    AppError::InvalidImagePayload(format!("unsupported data URL encoding: {}", header))
                })?;
                Self::from_base64(mime_type, payload)
            }
            None => {
                let bytes = BASE64
                    .decode(input)
                    .map_err(|e| AppError::InvalidImagePayload(format!("bad base64: {}", e)))?;
                Ok(Self::from_bytes(bytes))
            }
        }
    }

    /// Encodes pixels as JPEG at `quality` (1-100).
    ///
    /// JPEG has no alpha channel, so the pixels are flattened to RGB first.
    pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Self> {
        let rgb = image.to_rgb8();
        let mut buffer: Vec<u8> = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(&rgb)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;
        Ok(Self::new(MIME_JPEG, buffer))
    }

    /// Encodes pixels as PNG.
    pub fn encode_png(image: &DynamicImage) -> Result<Self> {
        let mut buffer: Vec<u8> = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;
        Ok(Self::new(MIME_PNG, buffer))
    }

    /// Decodes the payload into pixels.
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes)
            .map_err(|e| AppError::image(format!("Failed to decode {}: {}", self.mime_type, e)))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The payload as standard base64, without any header.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Suggested file extension for the MIME type.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

// Payloads run to megabytes; keep Debug output to the metadata.
impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
