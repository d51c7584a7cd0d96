//! Photobooth Core Library
//!
//! This library provides the core functionality for the virtual photo booth:
//! portrait capture, compositing the subject into a library scene with
//! Gemini, natural-language edits, watermarking, and publishing the result
//! behind a QR code.
//!
//! # Overview
//!
//! - **Geometry**: centered aspect-ratio cropping via [`geometry`]
//! - **Capture**: scoped capture devices and mirrored stills via [`capture`]
//! - **Image Processing**: crop/scale/mirror pipeline via [`image_processing`]
//! - **Watermark**: branded bar compositing via [`watermark`]
//! - **Generation**: request building in [`composite`] and [`edit`], transport in [`gemini`]
//! - **Publishing**: ImgBB upload via [`upload`] and QR links via [`share`]
//! - **Workflow**: the booth state machine in [`workflow`]
//!
//! # Quick Start
//!
//! ```ignore
//! use photobooth_core::{PhotoBooth, RasterImage};
//!
//! let app = PhotoBooth::new()?;
//! let mut booth = app.booth()?;
//! booth.load_photo(&RasterImage::from_bytes(std::fs::read("me.jpg")?))?;
//! booth.process(&app.processing_config()).await?;
//! std::fs::write("booth.jpg", booth.processed().unwrap().bytes())?;
//! ```

pub mod capture;
pub mod composite;
pub mod config;
pub mod edit;
pub mod error;
pub mod gemini;
pub mod geometry;
pub mod image_processing;
pub mod raster;
pub mod scenes;
pub mod settings;
pub mod share;
pub mod upload;
pub mod watermark;
pub mod workflow;

// Re-export primary types for convenience
pub use config::{Config, ProcessingConfig};
pub use error::{AppError, Result};
pub use gemini::GeminiClient;
pub use raster::RasterImage;
pub use settings::Settings;
pub use watermark::Watermark;
pub use workflow::{Booth, BoothState};

use scenes::HttpImageFetcher;
use upload::Uploader;

/// A booth wired to the real Gemini, scene and ImgBB endpoints.
pub type LiveBooth = Booth<GeminiClient, HttpImageFetcher, Uploader>;

/// Main entry point for the photo booth.
///
/// Holds the environment configuration and the persisted settings, and
/// builds fully wired [`LiveBooth`] controllers from them.
pub struct PhotoBooth {
    config: Config,
    settings: Settings,
}

impl PhotoBooth {
    /// Loads configuration from the environment (including `.env` files)
    /// and settings from the user's config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is not set.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::with_config(config, Settings::load()))
    }

    /// Creates an instance with explicit configuration and settings.
    pub fn with_config(config: Config, settings: Settings) -> Self {
        Self { config, settings }
    }

    /// Builds a booth controller with fresh HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the Gemini base URL is invalid.
    pub fn booth(&self) -> Result<LiveBooth> {
        let gemini = GeminiClient::new(&self.config)?;
        let http = gemini.http().clone();
        Ok(Booth::new(
            gemini,
            HttpImageFetcher::new(http.clone()),
            Uploader::new(http),
            self.watermark(),
        ))
    }

    /// The watermark, using the configured font if any.
    pub fn watermark(&self) -> Watermark {
        Watermark::load(self.config.font_path.as_deref())
    }

    /// A processing snapshot from the current settings.
    pub fn processing_config(&self) -> ProcessingConfig {
        self.settings.processing_config(self.config.imgbb_api_key.as_deref())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Allows changing defaults (tier, scene, ...) after initialization.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup. This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
