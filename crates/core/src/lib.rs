//! Core library for the audio-synchronised particle visualiser.
//!
//! A precomputed stream of per-slice audio features drives short-lived
//! shapes drawn over an animated gradient and a grain overlay. Each module
//! owns one stage of the per-tick pipeline: frame lookup ([`timeline`]),
//! spawning ([`spawn`]), physics ([`particles`]), background layers
//! ([`scene`]), shape drawing ([`render`]) and the chain that runs them in
//! order ([`driver`]). The live frequency-bar variant lives in [`spectrum`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod driver;
pub mod error;
pub mod particles;
pub mod record;
pub mod render;
pub mod scene;
pub mod spawn;
pub mod spectrum;
pub mod timeline;

pub use analysis::{AnalysisResponse, FeatureFrame, FeatureStream};
pub use audio::{AudioMode, PlaybackTransport, SimulatedPlayback, SteppedPlayback};
pub use config::{AnalysisConfig, AppConfig, CanvasConfig, RenderConfig, SpectrumConfig};
pub use driver::{AnimationDriver, DriverState, TickReport};
pub use error::{Result, VisualiserError};
pub use particles::{Particle, ParticleSimulator, ShapeKind};
pub use record::{FrameRecorder, RecordingSettings};
pub use render::{BarRenderer, Canvas, Hsl, ShapeRenderer, Surface};
pub use scene::SceneCompositor;
pub use spawn::ParticleSpawner;
pub use spectrum::SpectrumAnalyser;
pub use timeline::{FeatureFrameIndex, FramePacer};
