use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top level runtime configuration. Every field has a default, so a
/// partial JSON document only overrides what it names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicConfig {
    pub recorder: RecorderConfig,
    pub particles: ParticleConfig,
    pub live: LiveConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Point budget shared by every committed stroke
    pub max_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Upper bound of particles per spawn; at least one is always spawned
    pub max_spawn: usize,
    /// Velocity components are drawn from `-velocity_range..=velocity_range`
    /// pixels per reference tick
    pub velocity_range: i32,
    /// Inclusive alpha bands, one is picked at random per particle
    pub alpha_bands: Vec<(u8, u8)>,
    /// Inclusive radius bands in pixels
    pub size_bands: Vec<(f32, f32)>,
    pub min_lifetime_ms: u64,
    pub max_lifetime_ms: u64,
    /// Duration one unit of velocity covers
    pub reference_tick_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub tick_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output raster size in pixels
    pub width: u32,
    pub height: u32,
    pub frame_interval_ms: u64,
    /// Quantizer speed handed to the GIF encoder, 1 (best) to 30 (fastest)
    pub gif_speed: i32,
    pub repeat_forever: bool,
    /// Seed of the particle generator used during export
    pub seed: u64,
    pub display_name_prefix: String,
    /// Where the live app writes finished GIFs
    pub output_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { max_points: 500 }
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            max_spawn: 6,
            velocity_range: 3,
            alpha_bands: vec![(110, 160), (200, 255)],
            size_bands: vec![(2.0, 4.0), (5.0, 8.0)],
            min_lifetime_ms: 300,
            max_lifetime_ms: 1000,
            reference_tick_ms: 16,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { tick_ms: 16 }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            frame_interval_ms: 33,
            gif_speed: 10,
            repeat_forever: true,
            seed: 0x6d61_6769_63,
            display_name_prefix: "magic_message".to_string(),
            output_dir: PathBuf::from("exports"),
        }
    }
}

impl MagicConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => {
                log::warn!("Ignoring config {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
