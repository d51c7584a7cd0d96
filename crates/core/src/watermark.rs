//! Branded watermark bar stamped onto finished images.
//!
//! Layout is proportional to the image's own height so 1K, 2K and 4K
//! outputs look the same:
//!
//! - bar: bottom 8% of the height, slate at 85% opacity
//! - divider: gold, 0.5% of the height, on the bar's top edge
//! - text: white, 3% of the height, centered in the bar
//!
//! The text uses a bundled DejaVu Serif Bold face unless another font is
//! configured. Stamping never fails the pipeline: an image that cannot be
//! decoded or re-encoded is returned untouched.

use crate::error::Result;
use crate::raster::RasterImage;
use image::{DynamicImage, Rgba, RgbaImage};
use rusttype::{Font, Scale, point};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const WATERMARK_TEXT: &str = "HKAPA Film & TV Library 2026";
pub const WATERMARK_QUALITY: u8 = 95;

const BAR_COLOR: [u8; 3] = [15, 23, 42];
const BAR_OPACITY: f32 = 0.85;
const LINE_COLOR: [u8; 3] = [0xC0, 0xA0, 0x62];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSerif-Bold.ttf");

/// Pixel rows occupied by the watermark for a given image height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarGeometry {
    /// First row of the bar.
    pub top: u32,
    pub height: u32,
    pub line_height: u32,
    pub font_px: f32,
}

impl BarGeometry {
    pub fn for_height(image_height: u32) -> Self {
        let height = (image_height * 8 / 100).clamp(1, image_height.max(1));
        let line_height = (image_height * 5 / 1000).clamp(1, height);
        Self {
            top: image_height.saturating_sub(height),
            height,
            line_height,
            font_px: image_height as f32 * 0.03,
        }
    }

    /// Vertical center of the bar.
    pub fn center_y(&self) -> f32 {
        self.top as f32 + self.height as f32 / 2.0
    }
}

/// Stamps [`WATERMARK_TEXT`] in a translucent bar.
pub struct Watermark {
    text: String,
    font: Option<Font<'static>>,
}

impl Default for Watermark {
    fn default() -> Self {
        Self::load(None)
    }
}

impl Watermark {
    /// A watermark with explicit text and font. Without a font only the bar
    /// and divider are drawn.
    pub fn new(text: impl Into<String>, font: Option<Font<'static>>) -> Self {
        Self {
            text: text.into(),
            font,
        }
    }

    /// Uses the font at `font_path` if it loads, otherwise the bundled face.
    pub fn load(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(load_font_file).or_else(bundled_font);
        if font.is_none() {
            warn!("no usable watermark font, text will be omitted");
        }
        Self::new(WATERMARK_TEXT, font)
    }

    /// Stamps `image` and re-encodes it as JPEG.
    ///
    /// Returns the input unchanged if it cannot be decoded or encoded.
    pub fn apply(&self, image: &RasterImage) -> RasterImage {
        match self.try_apply(image) {
            Ok(stamped) => stamped,
            Err(e) => {
                warn!(error = %e, "watermark skipped");
                image.clone()
            }
        }
    }

    fn try_apply(&self, image: &RasterImage) -> Result<RasterImage> {
        let mut pixels = image.decode()?.to_rgba8();
        self.stamp(&mut pixels);
        RasterImage::encode_jpeg(&DynamicImage::ImageRgba8(pixels), WATERMARK_QUALITY)
    }

    /// Draws the bar, divider and text in place.
    pub fn stamp(&self, pixels: &mut RgbaImage) {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let bar = BarGeometry::for_height(height);

        fill_rows(pixels, bar.top, bar.height, BAR_COLOR, BAR_OPACITY);
        fill_rows(pixels, bar.top, bar.line_height, LINE_COLOR, 1.0);

        if let Some(font) = &self.font {
            draw_centered_text(pixels, font, &self.text, bar.font_px, width as f32 / 2.0, bar.center_y());
        }
    }
}

/// The serif bold face compiled into the crate.
pub fn bundled_font() -> Option<Font<'static>> {
    Font::try_from_bytes(BUNDLED_FONT)
}

fn load_font_file(path: &Path) -> Option<Font<'static>> {
    let font = fs::read(path).ok().and_then(Font::try_from_vec);
    match &font {
        Some(_) => debug!(path = %path.display(), "loaded watermark font"),
        None => warn!(path = %path.display(), "unreadable watermark font, using bundled face"),
    }
    font
}

fn blend(dst: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let inv = 1.0 - alpha;
    for c in 0..3 {
        dst.0[c] = (color[c] as f32 * alpha + dst.0[c] as f32 * inv).round() as u8;
    }
    dst.0[3] = 255;
}

fn fill_rows(pixels: &mut RgbaImage, top: u32, rows: u32, color: [u8; 3], alpha: f32) {
    let bottom = (top + rows).min(pixels.height());
    for y in top..bottom {
        for x in 0..pixels.width() {
            blend(pixels.get_pixel_mut(x, y), color, alpha);
        }
    }
}

fn text_width(font: &Font<'static>, scale: Scale, text: &str) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

fn draw_centered_text(pixels: &mut RgbaImage, font: &Font<'static>, text: &str, px: f32, cx: f32, cy: f32) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let x = cx - text_width(font, scale, text) / 2.0;
    // middle of the em box on cy; descent is negative
    let baseline = cy + (v_metrics.ascent + v_metrics.descent) / 2.0;

    let (width, height) = (pixels.width() as i32, pixels.height() as i32);
    for glyph in font.layout(text, scale, point(x, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, v| {
            let px = gx as i32 + bb.min.x;
            let py = gy as i32 + bb.min.y;
            if px < 0 || py < 0 || px >= width || py >= height || v <= 0.0 {
                return;
            }
            blend(pixels.get_pixel_mut(px as u32, py as u32), TEXT_COLOR, v.min(1.0));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white_jpeg(width: u32, height: u32) -> RasterImage {
        let img = image::RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        RasterImage::encode_jpeg(&DynamicImage::ImageRgb8(img), 95).unwrap()
    }

    fn close(a: u8, b: u8, tolerance: u8) -> bool {
        a.abs_diff(b) <= tolerance
    }

    #[test]
    fn geometry_scales_with_height() {
        let g = BarGeometry::for_height(1920);
        assert_eq!(g.height, 153);
        assert_eq!(g.top, 1920 - 153);
        assert_eq!(g.line_height, 9);
        assert!((g.font_px - 57.6).abs() < 1e-3);

        let g4k = BarGeometry::for_height(3840);
        assert_eq!(g4k.height, 307);
        assert_eq!(g4k.line_height, 19);
    }

    #[test]
    fn tiny_images_still_get_a_bar() {
        let g = BarGeometry::for_height(5);
        assert_eq!(g.height, 1);
        assert_eq!(g.top, 4);
        assert_eq!(g.line_height, 1);
    }

    #[test]
    fn stamp_darkens_bar_and_keeps_rest() {
        let mut pixels = RgbaImage::from_pixel(100, 200, Rgba([255, 255, 255, 255]));
        Watermark::new(WATERMARK_TEXT, None).stamp(&mut pixels);

        let bar = BarGeometry::for_height(200);
        // 255 * 0.15 + 15 * 0.85
        assert_eq!(pixels.get_pixel(0, 199).0[..3], [51, 58, 74]);
        assert_eq!(pixels.get_pixel(50, bar.top).0[..3], LINE_COLOR);
        assert_eq!(pixels.get_pixel(50, bar.top - 1).0[..3], [255, 255, 255]);
    }

    #[test]
    fn undecodable_input_is_returned_unchanged() {
        let garbage = RasterImage::new("image/jpeg", b"definitely not a jpeg".to_vec());
        let out = Watermark::new(WATERMARK_TEXT, None).apply(&garbage);
        assert_eq!(out, garbage);
        assert!(!out.is_empty());
    }

    #[test]
    fn output_keeps_dimensions() {
        let out = Watermark::new(WATERMARK_TEXT, None).apply(&white_jpeg(120, 240));
        assert_eq!(out.mime_type(), "image/jpeg");
        let decoded = out.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 240));
    }

    #[test]
    fn bundled_font_loads_without_configuration() {
        assert!(bundled_font().is_some());
        assert!(Watermark::load(None).font.is_some());
        assert!(Watermark::load(Some(Path::new("/nonexistent/font.ttf"))).font.is_some());
    }

    #[test]
    fn text_is_centered_inside_the_bar() {
        let (width, height) = (1080, 1920);
        let mut pixels = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        Watermark::load(None).stamp(&mut pixels);
        let bar = BarGeometry::for_height(height);

        // nothing above the bar is touched
        for y in 0..bar.top {
            for x in (0..width).step_by(7) {
                assert_eq!(pixels.get_pixel(x, y).0[..3], [0, 0, 0], "pixel ({}, {})", x, y);
            }
        }

        // bar over black is [13, 20, 36]; anything much brighter is text
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (u32::MAX, 0, u32::MAX, 0);
        for y in bar.top + bar.line_height..height {
            for x in 0..width {
                if pixels.get_pixel(x, y).0[0] > 60 {
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
            }
        }
        assert!(min_x <= max_x, "no text drawn");
        assert!(min_y >= bar.top + bar.line_height);
        assert!(max_y < height);

        let (left, right) = (min_x, width - 1 - max_x);
        assert!(left.abs_diff(right) <= 2, "margins {} / {}", left, right);
        assert!(left > 0 && right > 0);

        let text_center = (min_y + max_y) as f32 / 2.0;
        assert!(
            (text_center - bar.center_y()).abs() < bar.font_px / 4.0,
            "text rows {}..{} vs bar center {}",
            min_y,
            max_y,
            bar.center_y()
        );
    }

    #[test]
    fn repeated_stamping_does_not_grow_the_bar() {
        let watermark = Watermark::new(WATERMARK_TEXT, None);
        let once = watermark.apply(&white_jpeg(200, 400));
        let twice = watermark.apply(&once);

        let bar = BarGeometry::for_height(400);
        let once_px = once.decode().unwrap().to_rgb8();
        let twice_px = twice.decode().unwrap().to_rgb8();

        let above = bar.top - 12;
        assert!(close(once_px.get_pixel(100, above)[0], 255, 6));
        assert!(close(twice_px.get_pixel(100, above)[0], 255, 6));

        let inside = bar.top + bar.line_height + 8;
        assert!(once_px.get_pixel(2, inside)[0] < 80);
        assert!(twice_px.get_pixel(2, inside)[0] < 80);
    }
}
