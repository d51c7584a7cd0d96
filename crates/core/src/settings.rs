//! User settings persisted between sessions.
//!
//! Settings are stored as JSON in the user's config directory
//! (e.g., `~/.config/photobooth/settings.json` on Linux).

use crate::config::{GenerationTier, ImageSize, PoseMode, ProcessingConfig, SubjectMode};
use crate::error::Result;
use crate::scenes::SceneId;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Booth defaults remembered across runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tier: GenerationTier,
    pub scene: SceneId,
    pub subject_mode: SubjectMode,
    pub pose_mode: PoseMode,
    pub image_size: ImageSize,
    /// ImgBB key override (takes precedence over environment).
    pub imgbb_api_key: String,
}

impl Settings {
    /// Returns the path to the settings file, creating its directory.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "hkapa", "photobooth").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to defaults if missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Persists settings to the default location.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Picks the upload key: this override if set, else `env_key`.
    pub fn upload_key(&self, env_key: Option<&str>) -> String {
        if self.imgbb_api_key.trim().is_empty() {
            env_key.unwrap_or_default().to_string()
        } else {
            self.imgbb_api_key.clone()
        }
    }

    /// A processing snapshot seeded from these defaults.
    pub fn processing_config(&self, env_upload_key: Option<&str>) -> ProcessingConfig {
        ProcessingConfig {
            tier: self.tier,
            scene: self.scene,
            subject_mode: self.subject_mode,
            pose_mode: self.pose_mode,
            image_size: Some(self.image_size),
            upload_key: self.upload_key(env_upload_key),
            ..ProcessingConfig::default()
        }
    }
}
