//! Environment configuration and per-request processing options.

use crate::error::{AppError, Result};
use crate::scenes::SceneId;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Process-wide settings read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub imgbb_api_key: Option<String>,
    pub font_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| AppError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let gemini_base_url =
            env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string());

        let imgbb_api_key = env::var("IMGBB_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let font_path = env::var_os("PHOTOBOOTH_FONT").map(PathBuf::from);

        Ok(Self {
            gemini_api_key,
            gemini_base_url,
            imgbb_api_key,
            font_path,
        })
    }
}

/// Quality/speed profile of the image model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTier {
    #[default]
    Fast,
    HighFidelity,
}

impl GenerationTier {
    pub fn model_id(self) -> &'static str {
        match self {
            Self::Fast => "gemini-2.5-flash-image",
            Self::HighFidelity => "gemini-3-pro-image-preview",
        }
    }

    /// Only the high-fidelity model accepts an explicit output size.
    pub fn supports_image_size(self) -> bool {
        matches!(self, Self::HighFidelity)
    }

    pub fn supports_aspect_ratio(self) -> bool {
        true
    }
}

impl FromStr for GenerationTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "flash" => Ok(Self::Fast),
            "high_fidelity" | "high-fidelity" | "pro" => Ok(Self::HighFidelity),
            other => Err(AppError::config(format!("unknown generation tier '{}'", other))),
        }
    }
}

/// Who is in the photo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectMode {
    #[default]
    Single,
    Group,
    Family,
}

impl SubjectMode {
    pub const ALL: [SubjectMode; 3] = [Self::Single, Self::Group, Self::Family];

    /// Text substituted into the prompt template.
    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "Single Person",
            Self::Group => "Group Photo",
            Self::Family => "Family Mode (Children/Strollers)",
        }
    }
}

impl fmt::Display for SubjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SubjectMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "group" => Ok(Self::Group),
            "family" => Ok(Self::Family),
            other => Err(AppError::config(format!("unknown subject mode '{}'", other))),
        }
    }
}

/// Posture/expression instruction applied during generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseMode {
    #[default]
    Natural,
    VSign,
    Heart,
    Candid,
    Free,
}

impl PoseMode {
    pub const ALL: [PoseMode; 5] = [Self::Natural, Self::VSign, Self::Heart, Self::Candid, Self::Free];

    pub fn label(self) -> &'static str {
        match self {
            Self::Natural => "Natural",
            Self::VSign => "V-Sign",
            Self::Heart => "Heart Shape",
            Self::Candid => "Candid Profile",
            Self::Free => "Free Expression (Keep Original Pose)",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Self::Natural => "Adjust the subject to stand naturally, looking confident.",
            Self::VSign => "Have the subject make a V-sign gesture if possible, or look cheerful.",
            Self::Heart => "Have the subject make a Heart gesture or look loving.",
            Self::Candid => "Make the subject look like they are candidly reading or looking away.",
            Self::Free => {
                "STRICTLY KEEP the user's exact original pose and expression. Do not alter their body language."
            }
        }
    }
}

impl fmt::Display for PoseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PoseMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(Self::Natural),
            "v-sign" | "vsign" | "v_sign" => Ok(Self::VSign),
            "heart" => Ok(Self::Heart),
            "candid" => Ok(Self::Candid),
            "free" => Ok(Self::Free),
            other => Err(AppError::config(format!("unknown pose mode '{}'", other))),
        }
    }
}

/// Output resolution class requested from the high-fidelity tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    Size1K,
    #[serde(rename = "2K")]
    Size2K,
    #[serde(rename = "4K")]
    Size4K,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Size1K => "1K",
            Self::Size2K => "2K",
            Self::Size4K => "4K",
        }
    }
}

impl FromStr for ImageSize {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Self::Size1K),
            "2K" => Ok(Self::Size2K),
            "4K" => Ok(Self::Size4K),
            other => Err(AppError::config(format!("unknown image size '{}'", other))),
        }
    }
}

/// Aspect ratios understood by the generation API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "2:3")]
    R2x3,
    #[serde(rename = "3:2")]
    R3x2,
    #[serde(rename = "3:4")]
    R3x4,
    #[serde(rename = "4:3")]
    R4x3,
    #[default]
    #[serde(rename = "9:16")]
    R9x16,
    #[serde(rename = "16:9")]
    R16x9,
    #[serde(rename = "21:9")]
    R21x9,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::R2x3 => "2:3",
            Self::R3x2 => "3:2",
            Self::R3x4 => "3:4",
            Self::R4x3 => "4:3",
            Self::R9x16 => "9:16",
            Self::R16x9 => "16:9",
            Self::R21x9 => "21:9",
        }
    }
}

/// Snapshot of user choices for one generation request.
///
/// Built by the workflow from settings and user input; request builders only
/// ever read it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingConfig {
    pub tier: GenerationTier,
    pub scene: SceneId,
    pub subject_mode: SubjectMode,
    pub pose_mode: PoseMode,
    pub image_size: Option<ImageSize>,
    /// Fixed to 9:16 in this deployment.
    pub aspect_ratio: Option<AspectRatio>,
    pub upload_key: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            tier: GenerationTier::Fast,
            scene: SceneId::BookCollection,
            subject_mode: SubjectMode::Single,
            pose_mode: PoseMode::Natural,
            image_size: Some(ImageSize::Size1K),
            aspect_ratio: Some(AspectRatio::R9x16),
            upload_key: String::new(),
        }
    }
}
