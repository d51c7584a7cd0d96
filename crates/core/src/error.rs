//! Error types for the photobooth-core library.
//!
//! The variants follow the failure classes of the booth pipeline: bad
//! geometry input, transient network failures, upstream responses without a
//! usable image, and upload rejections. Workflow misuse (acting in the wrong
//! state, double submission) gets its own variants so callers can tell a
//! disabled control apart from a real failure.

use thiserror::Error;

/// Errors that can occur within the photobooth-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source or target dimensions were zero or otherwise unusable.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// The requested scene identifier is not in the catalog.
    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    /// Downloading the scene's reference image failed.
    #[error("Failed to fetch scene image: {0}")]
    SceneFetchFailed(String),

    /// The generation API answered but returned no inline image.
    #[error("No image in response")]
    NoImageInResponse,

    /// Edit instructions must contain at least one non-whitespace character.
    #[error("Edit instruction is empty")]
    EmptyInstruction,

    /// Image decoding, resampling or encoding failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// A data URL or base64 payload could not be parsed.
    #[error("Invalid image payload: {0}")]
    InvalidImagePayload(String),

    /// The Gemini API answered with a non-success status.
    #[error("Gemini API error (HTTP {status}): {message}")]
    GeminiApi { status: u16, message: String },

    /// Rate limited by the Gemini API.
    #[error("Rate limited by Gemini API, please retry later")]
    RateLimited,

    /// The image host rejected the upload.
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Transport-level HTTP failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Capture device failure.
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Requested capture device index was not found.
    #[error("Capture device not found: index {0}")]
    DeviceNotFound(usize),

    /// The action is not available in the current workflow state.
    #[error("Action '{action}' not allowed while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// A generation or edit request is already in flight.
    #[error("A request is already in progress")]
    Busy,

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a capture error with the given message.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates a Gemini API error for an HTTP status and message.
    pub fn gemini(status: u16, msg: impl Into<String>) -> Self {
        Self::GeminiApi {
            status,
            message: msg.into(),
        }
    }

    /// Creates an upload error with the given message.
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Whether retrying the same action may succeed without changing input.
    ///
    /// Gemini errors count only when the server side failed (5xx); a
    /// rejected request or key fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SceneFetchFailed(_) | Self::Network(_) | Self::RateLimited => true,
            Self::GeminiApi { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
