use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use clap::{Parser, Subcommand};
use particle_visualiser_core::{
    AnimationDriver, AppConfig, FeatureStream, FramePacer, FrameRecorder, PlaybackTransport,
    RecordingSettings, SimulatedPlayback, SpectrumAnalyser, SteppedPlayback,
};
use tracing_subscriber::EnvFilter;

mod upload;

fn main() -> particle_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    cli.surface.apply(&mut config);

    let result = match cli.command {
        Commands::Render {
            analysis,
            audio,
            out,
            frames,
            realtime,
        } => {
            let stream = match (analysis, audio) {
                (Some(path), _) => FeatureStream::load(path),
                (None, Some(audio)) => upload::analyse(&config.analysis.endpoint, &audio),
                (None, None) => Err("either --analysis or --audio is required".into()),
            };
            stream.and_then(|stream| {
                if realtime {
                    run_realtime(&config, stream, out.as_deref(), frames)
                } else {
                    run_offline(&config, stream, out.as_deref(), frames)
                }
            })
        }
        Commands::Upload { audio, output } => run_upload(&config, &audio, &output),
        Commands::Bars {
            pcm,
            sample_rate,
            out,
        } => run_bars(&config, &pcm, sample_rate, out.as_deref()),
    };

    if let Err(err) = &result {
        tracing::error!(%err, "nothing to show");
    }
    result
}

/// Renders the whole track with a stepped clock, one frame per tick.
fn run_offline(
    config: &AppConfig,
    stream: FeatureStream,
    out: Option<&Path>,
    frames: Option<u64>,
) -> particle_visualiser_core::Result<()> {
    let fps = config.render.fps.max(1);
    let frames = frames.unwrap_or_else(|| frames_for(&stream, fps));
    let frame_ms = 1000.0 / f64::from(fps);
    tracing::info!(frames, fps, "rendering offline");

    let mut recorder = recorder(out)?;
    let mut driver = AnimationDriver::new(config);
    driver.load_track(stream);
    driver.start(SteppedPlayback::new(1.0 / f64::from(fps)));

    for index in 0..frames {
        if let Some(report) = driver.tick(index as f64 * frame_ms) {
            tracing::debug!(?report, "tick");
        }
        capture(&mut recorder, &driver)?;
        if let Some(transport) = driver.transport_mut() {
            transport.advance();
        }
    }

    driver.teardown();
    finish(recorder)
}

/// Runs the chain against the wall clock at the configured refresh rate.
fn run_realtime(
    config: &AppConfig,
    stream: FeatureStream,
    out: Option<&Path>,
    frames: Option<u64>,
) -> particle_visualiser_core::Result<()> {
    let fps = config.render.fps.max(1);
    let duration = stream.duration().unwrap_or(0.0);
    let frames = frames.unwrap_or(u64::MAX);
    tracing::info!(duration, fps, "rendering in real time");

    let mut recorder = recorder(out)?;
    let mut pacer = FramePacer::new(fps);
    let mut driver = AnimationDriver::new(config);
    driver.load_track(stream);
    driver.start(SimulatedPlayback::new());

    let origin = Instant::now();
    for _ in 0..frames {
        let finished = driver
            .transport()
            .map(|transport| transport.current_time() > duration)
            .unwrap_or(true);
        if finished {
            break;
        }

        pacer.wait();
        if let Some(report) = driver.tick(origin.elapsed().as_secs_f64() * 1000.0) {
            tracing::debug!(?report, "tick");
        }
        capture(&mut recorder, &driver)?;
    }

    driver.teardown();
    finish(recorder)
}

fn run_upload(
    config: &AppConfig,
    audio: &Path,
    output: &Path,
) -> particle_visualiser_core::Result<()> {
    let body = upload::upload_audio(&config.analysis.endpoint, audio)?;
    let stream = FeatureStream::from_json(&body)?;
    std::fs::write(output, body)?;
    tracing::info!(frames = stream.len(), ?output, "analysis saved");
    Ok(())
}

/// Drives the frequency-bar variant from raw mono little-endian `f32` PCM.
fn run_bars(
    config: &AppConfig,
    pcm: &Path,
    sample_rate: u32,
    out: Option<&Path>,
) -> particle_visualiser_core::Result<()> {
    let fps = config.render.fps.max(1);
    let bytes = std::fs::read(pcm)?;
    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let per_tick = (sample_rate / fps).max(1) as usize;
    let frame_ms = 1000.0 / f64::from(fps);
    tracing::info!(samples = samples.len(), per_tick, "rendering spectrum bars");

    let mut recorder = recorder(out)?;
    let mut driver = AnimationDriver::new(config);
    driver.load_spectrum(SpectrumAnalyser::new(&config.spectrum)?);
    driver.start(SteppedPlayback::new(1.0 / f64::from(fps)));

    for (index, block) in samples.chunks(per_tick).enumerate() {
        if let Some(analyser) = driver.spectrum_mut() {
            analyser.push_samples(block);
        }
        driver.tick(index as f64 * frame_ms);
        capture(&mut recorder, &driver)?;
    }

    driver.teardown();
    finish(recorder)
}

fn frames_for(stream: &FeatureStream, fps: u32) -> u64 {
    let seconds = stream.duration().unwrap_or(0.0).max(0.0);
    (seconds * f64::from(fps)).ceil() as u64 + 1
}

fn recorder(out: Option<&Path>) -> particle_visualiser_core::Result<Option<FrameRecorder>> {
    let Some(dir) = out else {
        return Ok(None);
    };
    let mut recorder = FrameRecorder::new(RecordingSettings {
        output_dir: dir.to_path_buf(),
        ..Default::default()
    });
    recorder.start()?;
    Ok(Some(recorder))
}

fn capture<T: PlaybackTransport>(
    recorder: &mut Option<FrameRecorder>,
    driver: &AnimationDriver<T>,
) -> particle_visualiser_core::Result<()> {
    if let (Some(recorder), Some(canvas)) = (recorder.as_mut(), driver.canvas()) {
        recorder.capture(canvas)?;
    }
    Ok(())
}

fn finish(recorder: Option<FrameRecorder>) -> particle_visualiser_core::Result<()> {
    match recorder {
        Some(mut recorder) => recorder.stop(),
        None => Ok(()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-synchronised particle visualiser", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    surface: SurfaceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct SurfaceArgs {
    /// Surface width in pixels.
    #[arg(long, global = true)]
    width: Option<u32>,
    /// Surface height in pixels.
    #[arg(long, global = true)]
    height: Option<u32>,
    /// Ticks per second.
    #[arg(long, global = true)]
    fps: Option<u32>,
    /// Recycle the oldest particles beyond this many.
    #[arg(long, global = true)]
    max_particles: Option<usize>,
    /// Clear the surface before the background is painted.
    #[arg(long, global = true)]
    clear_each_tick: bool,
    /// Base URL of the analysis service.
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

impl SurfaceArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(width) = self.width {
            config.canvas.width = width;
        }
        if let Some(height) = self.height {
            config.canvas.height = height;
        }
        if let Some(fps) = self.fps {
            config.render.fps = fps;
        }
        if self.max_particles.is_some() {
            config.render.max_particles = self.max_particles;
        }
        if self.clear_each_tick {
            config.render.clear_each_tick = true;
        }
        if let Some(endpoint) = &self.endpoint {
            config.analysis.endpoint = endpoint.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the particle visualisation for an analysed track.
    Render {
        /// Saved analysis response to visualise.
        #[arg(long, conflicts_with = "audio")]
        analysis: Option<PathBuf>,
        /// Audio file to send to the analysis service first.
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Directory for the PNG frame sequence.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Stop after this many ticks.
        #[arg(long)]
        frames: Option<u64>,
        /// Follow the wall clock instead of stepping one frame per tick.
        #[arg(long)]
        realtime: bool,
    },
    /// Analyse an audio file with the analysis service and save the result.
    Upload {
        /// Audio file to analyse.
        audio: PathBuf,
        /// Output path for the analysis JSON.
        output: PathBuf,
    },
    /// Render live frequency bars from raw mono f32 little-endian PCM.
    Bars {
        /// PCM input file.
        pcm: PathBuf,
        /// Sample rate of the PCM input.
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        /// Directory for the PNG frame sequence.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "particle-visualiser",
            "render",
            "--analysis",
            "track.json",
            "--width",
            "320",
            "--max-particles",
            "200",
            "--clear-each-tick",
        ]);
        let mut config = AppConfig::default();
        cli.surface.apply(&mut config);

        assert_eq!(config.canvas.width, 320);
        assert_eq!(config.canvas.height, 720);
        assert_eq!(config.render.max_particles, Some(200));
        assert!(config.render.clear_each_tick);
    }

    #[test]
    fn offline_frame_count_covers_the_track() {
        let stream = FeatureStream::from_json(
            r#"{ "data": [ {}, {} ], "times": [0.0, 2.0] }"#,
        )
        .unwrap();
        assert_eq!(frames_for(&stream, 30), 61);
    }

    #[test]
    fn offline_render_writes_a_frame_per_tick() {
        let dir = std::env::temp_dir().join(format!("pv-offline-{}", std::process::id()));
        let stream = FeatureStream::from_json(
            r#"{ "data": [ { "vol": 0.2, "beat": true } ], "times": [0.1] }"#,
        )
        .unwrap();
        let config = AppConfig {
            canvas: particle_visualiser_core::CanvasConfig {
                width: 32,
                height: 24,
            },
            ..Default::default()
        };

        run_offline(&config, stream, Some(&dir), Some(3)).unwrap();

        assert!(dir.join("frame_00002.png").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
