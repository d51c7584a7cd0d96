//! Booth workflow: capture, configure, process, result.
//!
//! The controller follows a simple state machine:
//! `Live` -> `Configure` (photo captured or loaded) -> `Processing` ->
//! `Result` (composite ready) and back to `Configure` on failure.
//! `Result` can be edited in place, shared, sent back to `Configure` for
//! another attempt, or discarded with `retake`.
//!
//! Failures never discard the captured photo, so the user can retry the same
//! action without capturing again. Every action takes `&mut self`, so at most
//! one generation or edit is in flight per booth.

use crate::capture::{CaptureRenderer, FrameSource};
use crate::composite::{build_composite, parse_composite};
use crate::config::ProcessingConfig;
use crate::edit::{build_edit, parse_edit};
use crate::error::{AppError, Result};
use crate::gemini::{GeminiClient, GenerationRequest, GenerationResponse};
use crate::image_processing::ImageProcessor;
use crate::raster::RasterImage;
use crate::scenes::ImageFetcher;
use crate::upload::Uploader;
use crate::watermark::Watermark;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Backend that turns a request into a response.
pub trait ImageGenerator {
    fn generate(&self, request: &GenerationRequest) -> impl Future<Output = Result<GenerationResponse>> + Send;
}

impl ImageGenerator for GeminiClient {
    fn generate(&self, request: &GenerationRequest) -> impl Future<Output = Result<GenerationResponse>> + Send {
        GeminiClient::generate(self, request)
    }
}

/// Backend that publishes an image and returns its public URL.
pub trait ImageHost {
    fn publish(&self, image: &RasterImage, api_key: &str) -> impl Future<Output = Result<String>> + Send;
}

impl ImageHost for Uploader {
    fn publish(&self, image: &RasterImage, api_key: &str) -> impl Future<Output = Result<String>> + Send {
        self.upload(image, api_key)
    }
}

/// Fetches the scene, generates the composite and returns the raw result.
pub async fn generate_composite<G: ImageGenerator, F: ImageFetcher>(
    generator: &G,
    fetcher: &F,
    subject: &RasterImage,
    config: &ProcessingConfig,
) -> Result<RasterImage> {
    let request = build_composite(subject, config, fetcher).await?;
    let response = generator.generate(&request).await?;
    parse_composite(&response)
}

/// Applies one natural-language edit and returns the raw result.
pub async fn edit_image<G: ImageGenerator>(generator: &G, image: &RasterImage, instruction: &str) -> Result<RasterImage> {
    let request = build_edit(image, instruction)?;
    let response = generator.generate(&request).await?;
    parse_edit(&response)
}

/// Stamps off the async executor; 4K images take a while.
async fn watermark_blocking(watermark: Arc<Watermark>, image: RasterImage) -> RasterImage {
    let fallback = image.clone();
    tokio::task::spawn_blocking(move || watermark.apply(&image))
        .await
        .unwrap_or(fallback)
}

/// A busy marker that writes `settle` back into its slot when dropped, so
/// an action cancelled mid-await does not leave the booth locked.
struct Marker<'a, T: Copy> {
    slot: &'a mut T,
    settle: T,
}

impl<'a, T: Copy> Marker<'a, T> {
    fn set(slot: &'a mut T, busy: T, settle: T) -> Self {
        *slot = busy;
        Self { slot, settle }
    }
}

impl<T: Copy> Drop for Marker<'_, T> {
    fn drop(&mut self) {
        *self.slot = self.settle;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoothState {
    /// Waiting for a photo.
    Live,
    /// Photo captured, choosing options.
    Configure,
    /// Composite request in flight.
    Processing,
    /// Composite ready.
    Result,
}

impl BoothState {
    fn name(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Configure => "configuring",
            Self::Processing => "processing",
            Self::Result => "showing a result",
        }
    }
}

/// The booth controller. Owns all per-session image state.
pub struct Booth<G, F, H> {
    generator: G,
    fetcher: F,
    host: H,
    watermark: Arc<Watermark>,
    renderer: CaptureRenderer,
    state: BoothState,
    editing: bool,
    captured: Option<RasterImage>,
    processed: Option<RasterImage>,
    public_url: Option<String>,
    last_error: Option<String>,
}

impl<G: ImageGenerator, F: ImageFetcher, H: ImageHost> Booth<G, F, H> {
    pub fn new(generator: G, fetcher: F, host: H, watermark: Watermark) -> Self {
        Self {
            generator,
            fetcher,
            host,
            watermark: Arc::new(watermark),
            renderer: CaptureRenderer::default(),
            state: BoothState::Live,
            editing: false,
            captured: None,
            processed: None,
            public_url: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> BoothState {
        self.state
    }

    /// Whether the process/edit controls should be disabled.
    pub fn is_busy(&self) -> bool {
        self.state == BoothState::Processing || self.editing
    }

    pub fn captured(&self) -> Option<&RasterImage> {
        self.captured.as_ref()
    }

    pub fn processed(&self) -> Option<&RasterImage> {
        self.processed.as_ref()
    }

    /// The image currently on screen: the result if any, else the capture.
    pub fn preview(&self) -> Option<&RasterImage> {
        self.processed.as_ref().or(self.captured.as_ref())
    }

    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    /// Message of the last failed process attempt, cleared on the next action.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn require(&self, action: &'static str, allowed: &[BoothState]) -> Result<()> {
        if self.is_busy() {
            return Err(AppError::Busy);
        }
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AppError::InvalidState {
                action,
                state: self.state.name(),
            })
        }
    }

    /// Takes a still from `source`. Returns `false`, staying live, when no
    /// frame was available yet.
    pub fn capture<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<bool> {
        self.require("capture", &[BoothState::Live])?;
        match self.renderer.capture(source)? {
            Some(still) => {
                self.captured = Some(still);
                self.state = BoothState::Configure;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Uses a user-supplied photo instead of a live capture.
    pub fn load_photo(&mut self, photo: &RasterImage) -> Result<()> {
        self.require(
            "load photo",
            &[BoothState::Live, BoothState::Configure, BoothState::Result],
        )?;
        let portrait = ImageProcessor::crop_to_portrait(photo)?;
        self.captured = Some(portrait);
        self.processed = None;
        self.public_url = None;
        self.last_error = None;
        self.state = BoothState::Configure;
        Ok(())
    }

    /// Generates and watermarks the composite.
    ///
    /// On failure, or if the returned future is dropped early, the booth
    /// returns to `Configure` with the captured photo kept.
    pub async fn process(&mut self, config: &ProcessingConfig) -> Result<()> {
        self.require("process", &[BoothState::Configure])?;
        let Some(subject) = self.captured.clone() else {
            return Err(AppError::InvalidState {
                action: "process",
                state: "without a photo",
            });
        };

        let mut busy = Marker::set(&mut self.state, BoothState::Processing, BoothState::Configure);
        self.last_error = None;

        match generate_composite(&self.generator, &self.fetcher, &subject, config).await {
            Ok(composite) => {
                let stamped = watermark_blocking(Arc::clone(&self.watermark), composite).await;
                info!(len = stamped.len(), "composite ready");
                self.processed = Some(stamped);
                self.public_url = None;
                busy.settle = BoothState::Result;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "processing failed");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Applies a natural-language edit to the current result.
    ///
    /// On failure or cancellation the previous result stays in place.
    pub async fn edit(&mut self, instruction: &str) -> Result<()> {
        self.require("edit", &[BoothState::Result])?;
        if instruction.trim().is_empty() {
            return Err(AppError::EmptyInstruction);
        }
        let Some(current) = self.processed.clone() else {
            return Err(AppError::InvalidState {
                action: "edit",
                state: "without a result",
            });
        };

        let _busy = Marker::set(&mut self.editing, true, false);
        let edited = edit_image(&self.generator, &current, instruction)
            .await
            .inspect_err(|e| warn!(error = %e, "edit failed"))?;
        let stamped = watermark_blocking(Arc::clone(&self.watermark), edited).await;
        self.processed = Some(stamped);
        self.public_url = None;
        Ok(())
    }

    /// Publishes the current result once and returns its public URL.
    ///
    /// Repeated calls return the same URL until the result changes.
    pub async fn share(&mut self, api_key: &str) -> Result<String> {
        self.require("share", &[BoothState::Result])?;
        if let Some(url) = &self.public_url {
            return Ok(url.clone());
        }
        if api_key.trim().is_empty() {
            return Err(AppError::config("Please enter an ImgBB API key in settings"));
        }
        let Some(image) = &self.processed else {
            return Err(AppError::InvalidState {
                action: "share",
                state: "without a result",
            });
        };

        let url = self.host.publish(image, api_key).await?;
        self.public_url = Some(url.clone());
        Ok(url)
    }

    /// Drops the result but keeps the photo for another attempt.
    pub fn back_to_configure(&mut self) -> Result<()> {
        self.require("adjust", &[BoothState::Result])?;
        self.processed = None;
        self.public_url = None;
        self.last_error = None;
        self.state = BoothState::Configure;
        Ok(())
    }

    /// Discards everything and goes back to the live view.
    pub fn retake(&mut self) {
        self.captured = None;
        self.processed = None;
        self.public_url = None;
        self.last_error = None;
        self.editing = false;
        self.state = BoothState::Live;
    }
}
