//! Background scene catalog and reference-image fetching.

use crate::error::{AppError, Result};
use crate::raster::RasterImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneId {
    #[default]
    BookCollection,
    LearningResources,
}

impl SceneId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookCollection => "BOOK_COLLECTION",
            Self::LearningResources => "LEARNING_RESOURCES",
        }
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        SCENES
            .iter()
            .map(|scene| scene.id)
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| AppError::UnknownScene(s.to_string()))
    }
}

/// A catalog entry: one selectable background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneDescriptor {
    pub id: SceneId,
    pub name: &'static str,
    pub url: &'static str,
    pub description: &'static str,
}

/// Every background the booth offers, in display order.
pub static SCENES: &[SceneDescriptor] = &[
    SceneDescriptor {
        id: SceneId::BookCollection,
        name: "Book Collection Area",
        url: "https://raw.githubusercontent.com/hkapalibraries/bethaniepuzzle/main/Book%20Collection%20Area.jpg",
        description: "Classic deep-aisle library setting.",
    },
    SceneDescriptor {
        id: SceneId::LearningResources,
        name: "Learning Resources",
        url: "https://raw.githubusercontent.com/hkapalibraries/bethaniepuzzle/main/Learning%20Resources%20Area%20.jpg",
        description: "Modern, open-space study environment.",
    },
];

/// Looks up a scene in the static catalog.
pub fn scene(id: SceneId) -> &'static SceneDescriptor {
    SCENES
        .iter()
        .find(|scene| scene.id == id)
        .unwrap_or(&SCENES[0])
}

/// Source of reference images by URL.
///
/// The composite builder goes through this seam so tests can supply scene
/// bytes without a network.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<RasterImage>> + Send;
}

/// Fetches images over HTTP(S). Nothing is cached.
#[derive(Clone, Debug, Default)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<RasterImage> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::SceneFetchFailed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SceneFetchFailed(format!("{}: HTTP {}", url, status)));
        }

        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::SceneFetchFailed(format!("{}: {}", url, e)))?
            .to_vec();

        info!(url, len = bytes.len(), "fetched scene image");

        // raw.githubusercontent.com serves images as application/octet-stream
        Ok(match declared.filter(|m| m.starts_with("image/")) {
            Some(mime) => RasterImage::new(mime, bytes),
            None => RasterImage::from_bytes(bytes),
        })
    }
}
