use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub canvas: CanvasConfig,
    pub render: RenderConfig,
    pub analysis: AnalysisConfig,
    pub spectrum: SpectrumConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections and fields fall back
    /// to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }
}

/// Initial size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Tunables for the per-tick render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target refresh rate of the tick chain.
    pub fps: u32,
    /// Opacity the grain layer is composited with.
    pub grain_opacity: f32,
    /// Wipe the surface to transparent before the background is painted.
    pub clear_each_tick: bool,
    /// Optional ceiling on the live particle set. Oldest particles are
    /// recycled once it is exceeded; `None` leaves the set unbounded.
    pub max_particles: Option<usize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            grain_opacity: 0.18,
            clear_each_tick: false,
            max_particles: None,
        }
    }
}

/// Location of the external audio-analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub endpoint: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
        }
    }
}

/// Settings for the live frequency-bar variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}
