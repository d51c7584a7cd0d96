//! Aspect-ratio cropping.
//!
//! Computes the centered source rectangle that turns an image of any shape
//! into the booth's target shape without letterboxing or pillarboxing.
//!
//! All arithmetic is done on integers: the ratio comparison is a
//! cross-multiplication and crop extents are truncated, so the same input
//! always produces the same rectangle regardless of platform float behavior.

use crate::error::{AppError, Result};
use tracing::debug;

/// A width:height ratio expressed as two positive integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ratio {
    pub width: u32,
    pub height: u32,
}

impl Ratio {
    /// The portrait ratio every booth output uses.
    pub const PORTRAIT_9_16: Ratio = Ratio::new(9, 16);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_f64(self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Source region to sample from, in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRectangle {
    /// Whether the rectangle covers the whole `width`x`height` source.
    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// Computes the largest centered crop of a `source_width`x`source_height`
/// image whose shape matches `target`.
///
/// A source wider than the target keeps its full height and loses columns on
/// both sides; otherwise it keeps its full width and loses rows top and
/// bottom. A source already in the target shape comes back uncropped.
///
/// # Errors
///
/// Returns [`AppError::InvalidDimensions`] if either source dimension or
/// either ratio term is zero.
pub fn crop_rect(source_width: u32, source_height: u32, target: Ratio) -> Result<CropRectangle> {
    if source_width == 0 || source_height == 0 {
        return Err(AppError::InvalidDimensions {
            width: source_width,
            height: source_height,
        });
    }
    if target.width == 0 || target.height == 0 {
        return Err(AppError::InvalidDimensions {
            width: target.width,
            height: target.height,
        });
    }

    let (sw, sh) = (source_width as u64, source_height as u64);
    let (tw, th) = (target.width as u64, target.height as u64);

    // sw/sh > tw/th without leaving integer space
    let rect = if sw * th > sh * tw {
        let width = ((sh * tw / th) as u32).max(1);
        CropRectangle {
            x: (source_width - width) / 2,
            y: 0,
            width,
            height: source_height,
        }
    } else {
        let height = ((sw * th / tw) as u32).max(1);
        CropRectangle {
            x: 0,
            y: (source_height - height) / 2,
            width: source_width,
            height,
        }
    };

    debug!(source_width, source_height, ?rect, "computed crop");
    Ok(rect)
}
