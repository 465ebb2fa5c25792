use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::combine::{check_extensions, check_output_name};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// External tool settings
    pub tools: ToolsConfig,

    /// Combine run settings
    pub combine: CombineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// ffmpeg binary name or path
    pub ffmpeg: PathBuf,

    /// ffprobe binary name or path
    pub ffprobe: PathBuf,

    /// LAME VBR quality passed as `-q:a` (0 = best, 9 = smallest)
    pub audio_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    /// Video file extensions picked up from the input folder
    pub extensions: Vec<String>,

    /// File name of the combined audio inside the output folder
    pub output_name: String,

    /// Keep the per-clip MP3 files next to the combined one
    pub keep_clips: bool,

    /// Sort inputs by name instead of keeping directory-listing order
    pub sort_by_name: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            audio_quality: 0,
        }
    }
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["mp4".to_string()],
            output_name: "combined_audio.mp3".to_string(),
            keep_clips: true,
            sort_by_name: false,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // Current directory wins so a folder can carry its own settings
        let local_config = PathBuf::from("clipjoin.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("clipjoin").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        check_extensions(&self.combine.extensions).map_err(anyhow::Error::msg)?;
        check_output_name(&self.combine.output_name).map_err(anyhow::Error::msg)?;

        if self.tools.audio_quality > 9 {
            anyhow::bail!(
                "Audio quality must be between 0 and 9, got {}",
                self.tools.audio_quality
            );
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  ffmpeg: {}", self.tools.ffmpeg.display());
        println!("  ffprobe: {}", self.tools.ffprobe.display());
        println!("  Audio Quality: {}", self.tools.audio_quality);
        println!("  Extensions: {}", self.combine.extensions.join(", "));
        println!("  Output Name: {}", self.combine.output_name);
        println!("  Keep Clips: {}", self.combine.keep_clips);
        println!("  Sort By Name: {}", self.combine.sort_by_name);
    }
}
