//! Capture devices and the still-frame renderer.
//!
//! A [`CaptureDevice`] is only readable through a [`CaptureSession`], which
//! starts the device on open and stops it when dropped. The session holds the
//! device by mutable borrow, so a second session on the same device cannot
//! exist while the first is alive.
//!
//! # Example
//!
//! ```ignore
//! use photobooth_core::capture::{CaptureRenderer, CaptureSession, ScreenDevice};
//!
//! let mut device = ScreenDevice::by_index(0)?;
//! let mut session = CaptureSession::open(&mut device)?;
//! if let Some(still) = CaptureRenderer::default().capture(&mut session)? {
//!     std::fs::write("capture.jpg", still.bytes())?;
//! }
//! // device stopped here
//! ```

use crate::error::{AppError, Result};
use crate::image_processing::{ImageProcessor, RenderSpec};
use crate::raster::RasterImage;
use image::DynamicImage;
use screenshots::Screen;
use tracing::{debug, info};

/// Anything that can hand out the frame currently being shown.
pub trait FrameSource {
    /// The latest frame, or `None` when nothing is available yet.
    fn current_frame(&mut self) -> Result<Option<DynamicImage>>;
}

/// A live image source that must be explicitly started and stopped.
pub trait CaptureDevice {
    fn name(&self) -> String;
    fn start(&mut self) -> Result<()>;
    fn frame(&mut self) -> Result<Option<DynamicImage>>;
    /// Releases the device. Must be safe to call on a stopped device.
    fn stop(&mut self);
}

/// Exclusive, scoped use of a [`CaptureDevice`].
pub struct CaptureSession<'d, D: CaptureDevice + ?Sized> {
    device: &'d mut D,
}

impl<'d, D: CaptureDevice + ?Sized> CaptureSession<'d, D> {
    /// Starts `device`. If starting fails the device is stopped again before
    /// the error is returned.
    pub fn open(device: &'d mut D) -> Result<Self> {
        if let Err(e) = device.start() {
            device.stop();
            return Err(e);
        }
        info!(device = %device.name(), "capture session started");
        Ok(Self { device })
    }

    pub fn device(&self) -> &D {
        &*self.device
    }
}

impl<D: CaptureDevice + ?Sized> FrameSource for CaptureSession<'_, D> {
    fn current_frame(&mut self) -> Result<Option<DynamicImage>> {
        self.device.frame()
    }
}

impl<D: CaptureDevice + ?Sized> Drop for CaptureSession<'_, D> {
    fn drop(&mut self) {
        self.device.stop();
        info!(device = %self.device.name(), "capture session stopped");
    }
}

/// Turns the current frame of a source into a portrait still.
#[derive(Clone, Copy, Debug)]
pub struct CaptureRenderer {
    spec: RenderSpec,
}

impl Default for CaptureRenderer {
    fn default() -> Self {
        Self {
            spec: RenderSpec::CAPTURE,
        }
    }
}

impl CaptureRenderer {
    /// Renders the source's current frame: crop to the target ratio, scale,
    /// mirror, encode.
    ///
    /// `Ok(None)` means no frame was available; callers should treat it as
    /// "try again later", not as a failure.
    pub fn capture<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<Option<RasterImage>> {
        let Some(frame) = source.current_frame()? else {
            debug!("no frame available");
            return Ok(None);
        };
        ImageProcessor::render_jpeg(&frame, self.spec).map(Some)
    }
}

/// A monitor used as a live frame source, e.g. a kiosk display showing a
/// camera preview.
pub struct ScreenDevice {
    index: usize,
    screen: Screen,
    active: bool,
}

impl ScreenDevice {
    /// Detects all monitors.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Capture`] if enumeration fails or no monitor exists.
    pub fn all() -> Result<Vec<ScreenDevice>> {
        let screens = Screen::all()
            .map_err(|e| AppError::capture(format!("Failed to enumerate screens: {}", e)))?;

        if screens.is_empty() {
            return Err(AppError::capture("No screens detected"));
        }

        Ok(screens
            .into_iter()
            .enumerate()
            .map(|(index, screen)| ScreenDevice {
                index,
                screen,
                active: false,
            })
            .collect())
    }

    /// Opens the monitor at zero-based `index`.
    pub fn by_index(index: usize) -> Result<ScreenDevice> {
        Self::all()?
            .into_iter()
            .nth(index)
            .ok_or(AppError::DeviceNotFound(index))
    }

    /// Human-readable description including resolution and scale factor.
    pub fn describe(&self) -> String {
        let info = &self.screen.display_info;
        format!(
            "Monitor {}: {}x{} (scale: {})",
            self.index, info.width, info.height, info.scale_factor
        )
    }
}

impl CaptureDevice for ScreenDevice {
    fn name(&self) -> String {
        format!("monitor-{}", self.index)
    }

    fn start(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn frame(&mut self) -> Result<Option<DynamicImage>> {
        if !self.active {
            return Ok(None);
        }

        let captured = self
            .screen
            .capture()
            .map_err(|e| AppError::capture(format!("Failed to capture screen: {}", e)))?;

        let width = captured.width();
        let height = captured.height();
        let rgba_data = captured.into_raw();

        let img_buffer = image::ImageBuffer::from_raw(width, height, rgba_data)
            .ok_or_else(|| AppError::capture("Failed to create image buffer"))?;

        Ok(Some(DynamicImage::ImageRgba8(img_buffer)))
    }

    fn stop(&mut self) {
        self.active = false;
    }
}

/// A device that always shows the same picture, or nothing at all.
///
/// Backs file-based capture and stands in for a camera in tests.
#[derive(Clone, Debug, Default)]
pub struct StillDevice {
    image: Option<DynamicImage>,
    active: bool,
    starts: usize,
    stops: usize,
}

impl StillDevice {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }

    /// A device with no picture attached; every frame read yields `None`.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// How many times the device has been started and stopped.
    pub fn cycles(&self) -> (usize, usize) {
        (self.starts, self.stops)
    }
}

impl CaptureDevice for StillDevice {
    fn name(&self) -> String {
        "still".to_string()
    }

    fn start(&mut self) -> Result<()> {
        self.starts += 1;
        self.active = true;
        Ok(())
    }

    fn frame(&mut self) -> Result<Option<DynamicImage>> {
        Ok(if self.active { self.image.clone() } else { None })
    }

    fn stop(&mut self) {
        if self.active {
            self.stops += 1;
        }
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct FailingDevice {
        stopped: bool,
    }

    impl CaptureDevice for FailingDevice {
        fn name(&self) -> String {
            "failing".into()
        }
        fn start(&mut self) -> Result<()> {
            Err(AppError::capture("permission denied"))
        }
        fn frame(&mut self) -> Result<Option<DynamicImage>> {
            Ok(None)
        }
        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    fn landscape() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 180, Rgb([40, 80, 120])))
    }

    #[test]
    fn session_stops_device_on_drop() {
        let mut device = StillDevice::new(landscape());
        {
            let session = CaptureSession::open(&mut device).unwrap();
            assert!(session.device().is_active());
        }
        assert!(!device.is_active());
        assert_eq!(device.cycles(), (1, 1));
    }

    #[test]
    fn session_stops_device_on_error_path() {
        fn capture_then_fail(device: &mut StillDevice) -> Result<()> {
            let mut session = CaptureSession::open(device)?;
            let _ = session.current_frame()?;
            Err(AppError::capture("upstream failure"))
        }

        let mut device = StillDevice::new(landscape());
        assert!(capture_then_fail(&mut device).is_err());
        assert!(!device.is_active());
    }

    #[test]
    fn failed_start_is_released() {
        let mut device = FailingDevice { stopped: false };
        assert!(CaptureSession::open(&mut device).is_err());
        assert!(device.stopped);
    }

    #[test]
    fn capture_without_frame_is_none() {
        let mut device = StillDevice::detached();
        let mut session = CaptureSession::open(&mut device).unwrap();
        assert!(CaptureRenderer::default().capture(&mut session).unwrap().is_none());
    }

    #[test]
    fn stopped_device_yields_nothing() {
        let mut device = StillDevice::new(landscape());
        assert!(device.frame().unwrap().is_none());
    }

    #[test]
    fn capture_renders_portrait_jpeg() {
        let mut device = StillDevice::new(landscape());
        let mut session = CaptureSession::open(&mut device).unwrap();
        let still = CaptureRenderer::default().capture(&mut session).unwrap().unwrap();
        let decoded = still.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
    }
}
