//! Pixel pipeline shared by live capture and uploaded photos.
//!
//! Both paths end in the same place: a 1080x1920 portrait JPEG. Live frames
//! are mirrored so the result matches the selfie preview the subject saw;
//! uploaded files are left as-is.
//!
//! # Geometry
//!
//! The source is cropped with [`crop_rect`] to the target ratio first and
//! only then resampled, so no part of the output is stretched or padded.
//! Mirroring happens last, about the vertical center of the output.

use crate::error::Result;
use crate::geometry::{CropRectangle, Ratio, crop_rect};
use crate::raster::RasterImage;
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::debug;

pub const OUTPUT_WIDTH: u32 = 1080;
pub const OUTPUT_HEIGHT: u32 = 1920;

/// JPEG quality for live captures.
pub const CAPTURE_QUALITY: u8 = 92;
/// JPEG quality for uploaded photos.
pub const UPLOAD_QUALITY: u8 = 95;

/// Output shape and orientation of a render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSpec {
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
    pub quality: u8,
}

impl RenderSpec {
    /// Mirrored 1080x1920 at capture quality.
    pub const CAPTURE: RenderSpec = RenderSpec {
        width: OUTPUT_WIDTH,
        height: OUTPUT_HEIGHT,
        mirror: true,
        quality: CAPTURE_QUALITY,
    };

    /// Unmirrored 1080x1920 at upload quality.
    pub const UPLOAD: RenderSpec = RenderSpec {
        width: OUTPUT_WIDTH,
        height: OUTPUT_HEIGHT,
        mirror: false,
        quality: UPLOAD_QUALITY,
    };

    pub fn ratio(&self) -> Ratio {
        Ratio::new(self.width, self.height)
    }
}

/// Image processing utilities for the capture workflow.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Crops, scales and optionally mirrors `source` into `spec`'s frame,
    /// returning the pixels without encoding them.
    pub fn render(source: &DynamicImage, spec: RenderSpec) -> Result<DynamicImage> {
        let rect = crop_rect(source.width(), source.height(), spec.ratio())?;
        let cropped = Self::crop(source, rect);

        let scaled = if cropped.width() == spec.width && cropped.height() == spec.height {
            cropped
        } else {
            cropped.resize_exact(spec.width, spec.height, FilterType::Triangle)
        };

        debug!(?rect, width = spec.width, height = spec.height, mirror = spec.mirror, "rendered frame");

        Ok(if spec.mirror { scaled.fliph() } else { scaled })
    }

    /// [`render`](Self::render) followed by JPEG encoding at `spec.quality`.
    pub fn render_jpeg(source: &DynamicImage, spec: RenderSpec) -> Result<RasterImage> {
        let rendered = Self::render(source, spec)?;
        RasterImage::encode_jpeg(&rendered, spec.quality)
    }

    /// Decodes an arbitrary user-supplied photo and fits it to the portrait
    /// frame without mirroring.
    pub fn crop_to_portrait(image: &RasterImage) -> Result<RasterImage> {
        let decoded = image.decode()?;
        Self::render_jpeg(&decoded, RenderSpec::UPLOAD)
    }

    fn crop(source: &DynamicImage, rect: CropRectangle) -> DynamicImage {
        if rect.is_full(source.width(), source.height()) {
            source.clone()
        } else {
            source.crop_imm(rect.x, rect.y, rect.width, rect.height)
        }
    }
}
