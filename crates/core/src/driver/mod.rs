use crate::{
    config::{AppConfig, RenderConfig},
    AudioMode, BarRenderer, Canvas, FeatureFrameIndex, FeatureStream, Particle, ParticleSimulator,
    ParticleSpawner, PlaybackTransport, SceneCompositor, ShapeRenderer, SpectrumAnalyser,
    Surface,
};

/// Lifecycle of the tick chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
}

/// What a completed tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub frame_index: Option<usize>,
    pub spawned: usize,
    pub live: usize,
}

#[derive(Debug)]
enum DataSource {
    Features(FeatureFrameIndex),
    Spectrum {
        analyser: SpectrumAnalyser,
        bins: Vec<u8>,
    },
}

/// Owns the single animation chain: the surface, the live particle set and
/// the transport the visuals follow.
///
/// A tick only runs when one has been scheduled. Every completed tick
/// schedules the next, so the host calls [`tick`](Self::tick) once per
/// refresh opportunity until [`teardown`](Self::teardown) cancels the chain.
#[derive(Debug)]
pub struct AnimationDriver<T> {
    render: RenderConfig,
    state: DriverState,
    pending: Option<u64>,
    ticks: u64,
    canvas: Option<Canvas>,
    compositor: SceneCompositor,
    spawner: ParticleSpawner,
    simulator: ParticleSimulator,
    shapes: ShapeRenderer,
    bars: BarRenderer,
    source: Option<DataSource>,
    transport: Option<T>,
}

impl<T: PlaybackTransport> AnimationDriver<T> {
    pub fn new(config: &AppConfig) -> Self {
        let canvas = Canvas::new(config.canvas.width, config.canvas.height)
            .map_err(|err| tracing::warn!(%err, "starting without a drawing surface"))
            .ok();

        Self {
            render: config.render.clone(),
            state: DriverState::Idle,
            pending: None,
            ticks: 0,
            canvas,
            compositor: SceneCompositor::new(config.render.grain_opacity),
            spawner: ParticleSpawner::new(),
            simulator: ParticleSimulator::with_capacity_limit(config.render.max_particles),
            shapes: ShapeRenderer::new(),
            bars: BarRenderer::new(),
            source: None,
            transport: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    pub fn has_pending_tick(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of ticks that have painted the surface.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn mode(&self) -> Option<AudioMode> {
        self.source.as_ref().map(|source| match source {
            DataSource::Features(_) => AudioMode::Precomputed,
            DataSource::Spectrum { .. } => AudioMode::Live,
        })
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn particles(&self) -> &[Particle] {
        self.simulator.particles()
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Live analyser of the spectrum variant, for feeding samples.
    pub fn spectrum_mut(&mut self) -> Option<&mut SpectrumAnalyser> {
        match self.source.as_mut() {
            Some(DataSource::Spectrum { analyser, .. }) => Some(analyser),
            _ => None,
        }
    }

    /// Replaces the loaded track. A running chain is torn down first.
    pub fn load_track(&mut self, stream: FeatureStream) {
        self.teardown();
        tracing::info!(frames = stream.len(), "track loaded");
        self.source = Some(DataSource::Features(FeatureFrameIndex::new(stream)));
    }

    /// Switches to the live frequency-bar variant.
    pub fn load_spectrum(&mut self, analyser: SpectrumAnalyser) {
        self.teardown();
        let bins = vec![0; analyser.bin_count()];
        tracing::info!(bins = bins.len(), "live spectrum attached");
        self.source = Some(DataSource::Spectrum { analyser, bins });
    }

    /// Starts playback and schedules the first tick.
    ///
    /// Without a loaded track the driver stays idle. A refused play request
    /// is logged and the chain starts anyway.
    pub fn start(&mut self, mut transport: T) {
        if self.source.is_none() {
            tracing::warn!("start requested before a track was loaded");
            return;
        }

        if let Err(err) = transport.play() {
            tracing::warn!(%err, "audio play request failed; visualising anyway");
        }

        self.transport = Some(transport);
        self.state = DriverState::Running;
        self.schedule();
        tracing::info!("animation started");
    }

    /// Applies a new surface size without interrupting the chain. Particles
    /// keep their coordinates; only the bounce bounds change.
    pub fn resize(&mut self, width: u32, height: u32) {
        match Canvas::new(width, height) {
            Ok(canvas) => self.canvas = Some(canvas),
            Err(err) => {
                tracing::warn!(%err, "surface detached until the next valid resize");
                self.canvas = None;
            }
        }
    }

    /// Cancels the scheduled tick, if any. The chain stops with it; only
    /// [`start`](Self::start) schedules ticks again.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
        self.state = DriverState::Idle;
    }

    /// Stops the chain and releases per-run resources. Safe to call at any
    /// time, including repeatedly.
    pub fn teardown(&mut self) {
        let was_running = self.is_running();
        self.cancel_pending();
        self.simulator.clear();
        self.compositor.release();
        self.transport = None;

        match self.source.take() {
            Some(DataSource::Features(mut index)) => {
                index.reset();
                self.source = Some(DataSource::Features(index));
            }
            Some(DataSource::Spectrum { mut analyser, .. }) => analyser.close(),
            None => {}
        }

        if was_running {
            tracing::info!(ticks = self.ticks, "animation stopped");
        }
    }

    /// Runs the scheduled tick at wall-clock time `now_ms`.
    ///
    /// Returns `None` when no tick was pending, or when the surface or
    /// transport is not attached; the latter still keeps the chain alive.
    pub fn tick(&mut self, now_ms: f64) -> Option<TickReport> {
        self.pending.take()?;
        let report = self.run_tick(now_ms);
        self.schedule();
        report
    }

    fn schedule(&mut self) {
        if self.state == DriverState::Running {
            self.pending = Some(self.ticks + 1);
        }
    }

    fn run_tick(&mut self, now_ms: f64) -> Option<TickReport> {
        let canvas = self.canvas.as_mut()?;
        let transport = self.transport.as_ref()?;
        let source = self.source.as_mut()?;

        self.ticks += 1;
        let (width, height) = (canvas.width() as f32, canvas.height() as f32);

        match source {
            DataSource::Features(index) => {
                if self.render.clear_each_tick {
                    canvas.clear();
                }
                self.compositor.paint_background(canvas, self.ticks);
                self.compositor.paint_grain(canvas, now_ms);

                let frame_index = index.resolve_index(transport.current_time());
                let frame = frame_index.and_then(|i| index.stream().frame(i));
                let spawned = self.spawner.spawn(frame, width, height, now_ms);
                let spawned_count = spawned.len();

                self.simulator.extend(spawned);
                self.simulator.tick(width, height, now_ms);
                for particle in self.simulator.particles() {
                    self.shapes.draw(canvas, particle);
                }

                Some(TickReport {
                    tick: self.ticks,
                    frame_index,
                    spawned: spawned_count,
                    live: self.simulator.len(),
                })
            }
            DataSource::Spectrum { analyser, bins } => {
                if let Err(err) = analyser.byte_frequency_data(bins) {
                    tracing::warn!(%err, "spectrum read failed");
                    bins.fill(0);
                }
                self.bars.draw(canvas, bins);

                Some(TickReport {
                    tick: self.ticks,
                    frame_index: None,
                    spawned: 0,
                    live: 0,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CanvasConfig, FeatureFrame, SimulatedPlayback, SteppedPlayback};

    fn config(width: u32, height: u32) -> AppConfig {
        AppConfig {
            canvas: CanvasConfig { width, height },
            ..Default::default()
        }
    }

    fn single_frame(volume: f32, beat: bool) -> FeatureStream {
        let frame = FeatureFrame {
            volume,
            beat,
            ..Default::default()
        };
        FeatureStream::new(vec![0.0], vec![frame]).unwrap()
    }

    fn running(stream: FeatureStream) -> AnimationDriver<SteppedPlayback> {
        let mut driver = AnimationDriver::new(&config(64, 48));
        driver.load_track(stream);
        driver.start(SteppedPlayback::new(0.0));
        driver
    }

    #[test]
    fn quiet_frame_spawns_one_particle_per_tick() {
        let mut driver = running(single_frame(0.0, false));

        for tick in 1..=3 {
            let report = driver.tick(tick as f64 * 16.0).unwrap();
            assert_eq!(report.spawned, 1);
            assert_eq!(report.frame_index, Some(0));
            assert_eq!(report.live, tick);
        }
        assert_eq!(driver.particles().len(), 3);
    }

    #[test]
    fn beat_frame_spawns_thirty_per_tick() {
        let mut driver = running(single_frame(0.9, true));

        assert_eq!(driver.tick(0.0).unwrap().spawned, 30);
        assert_eq!(driver.tick(16.0).unwrap().spawned, 30);
        assert_eq!(driver.particles().len(), 60);
    }

    #[test]
    fn playback_past_the_last_frame_spawns_nothing() {
        let mut driver = running(single_frame(1.0, false));
        driver.transport_mut().unwrap().seek(5.0);

        let report = driver.tick(0.0).unwrap();
        assert_eq!(report.frame_index, None);
        assert_eq!(report.spawned, 0);
        assert_eq!(driver.tick_count(), 1);
    }

    #[test]
    fn particles_expire_during_the_chain() {
        let mut driver = running(single_frame(0.0, false));
        driver.tick(0.0).unwrap();

        let report = driver.tick(3_800.0).unwrap();
        assert_eq!(report.live, 1);
    }

    #[test]
    fn ticks_only_fire_when_scheduled() {
        let mut driver: AnimationDriver<SteppedPlayback> = AnimationDriver::new(&config(32, 32));
        assert!(driver.tick(0.0).is_none());

        driver.start(SteppedPlayback::new(0.0));
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.tick(0.0).is_none());
    }

    #[test]
    fn pending_tick_can_be_cancelled_before_it_fires() {
        let mut driver = running(single_frame(0.0, false));
        assert!(driver.has_pending_tick());

        driver.cancel_pending();
        assert!(!driver.is_running());
        assert!(!driver.has_pending_tick());
        assert!(driver.tick(0.0).is_none());
        assert_eq!(driver.tick_count(), 0);

        driver.start(SteppedPlayback::new(0.0));
        assert!(driver.is_running());
        assert!(driver.tick(0.0).is_some());
    }

    #[test]
    fn teardown_is_idempotent_and_releases_particles() {
        let mut driver = running(single_frame(0.5, false));
        driver.tick(0.0).unwrap();

        driver.teardown();
        driver.teardown();

        assert_eq!(driver.state(), DriverState::Idle);
        assert!(!driver.has_pending_tick());
        assert!(driver.particles().is_empty());
        assert!(driver.transport().is_none());
        assert!(driver.tick(16.0).is_none());

        driver.start(SteppedPlayback::new(0.0));
        assert!(driver.is_running());
        assert_eq!(driver.tick(32.0).unwrap().spawned, 8);
    }

    #[test]
    fn swapping_tracks_returns_to_idle() {
        let mut driver = running(single_frame(0.0, false));
        driver.tick(0.0).unwrap();

        driver.load_track(single_frame(0.0, true));
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.particles().is_empty());
        assert_eq!(driver.mode(), Some(AudioMode::Precomputed));
    }

    #[test]
    fn rejected_play_still_starts_the_chain() {
        let mut driver = AnimationDriver::new(&config(32, 32));
        driver.load_track(single_frame(0.0, false));
        driver.start(SimulatedPlayback::autoplay_blocked());

        assert!(driver.is_running());
        assert_eq!(driver.tick(0.0).unwrap().spawned, 1);
    }

    #[test]
    fn resize_keeps_the_chain_and_particles() {
        let mut driver = running(single_frame(0.0, false));
        driver.tick(0.0).unwrap();
        let before = driver.particles()[0].clone();

        driver.resize(128, 96);
        assert!(driver.has_pending_tick());
        assert_eq!(driver.canvas().unwrap().width(), 128);
        assert_eq!(driver.particles()[0], before);

        let report = driver.tick(16.0).unwrap();
        assert_eq!(report.live, 2);
    }

    #[test]
    fn detached_surface_makes_ticks_no_ops() {
        let mut driver = running(single_frame(0.0, false));

        driver.resize(0, 0);
        assert!(driver.canvas().is_none());
        assert!(driver.tick(0.0).is_none());
        assert!(driver.has_pending_tick());
        assert_eq!(driver.tick_count(), 0);

        driver.resize(16, 16);
        assert_eq!(driver.tick(16.0).unwrap().tick, 1);
    }

    #[test]
    fn frame_cursor_restarts_after_seek_backwards() {
        let frames = vec![
            FeatureFrame {
                volume: 0.0,
                ..Default::default()
            },
            FeatureFrame {
                volume: 1.0,
                ..Default::default()
            },
        ];
        let stream = FeatureStream::new(vec![0.0, 1.0], frames).unwrap();
        let mut driver = running(stream);

        driver.transport_mut().unwrap().seek(0.5);
        assert_eq!(driver.tick(0.0).unwrap().spawned, 16);

        driver.transport_mut().unwrap().seek(0.0);
        assert_eq!(driver.tick(16.0).unwrap().spawned, 1);
    }

    #[test]
    fn spectrum_variant_draws_bars() {
        let mut driver = AnimationDriver::new(&config(128, 64));
        let analyser = SpectrumAnalyser::new(&AppConfig::default().spectrum).unwrap();
        driver.load_spectrum(analyser);
        driver.start(SteppedPlayback::new(0.0));
        assert_eq!(driver.mode(), Some(AudioMode::Live));

        let tone: Vec<f32> = (0..256)
            .map(|n| (std::f32::consts::TAU * 8.0 * n as f32 / 256.0).sin())
            .collect();
        driver.spectrum_mut().unwrap().push_samples(&tone);

        let report = driver.tick(0.0).unwrap();
        assert_eq!(report.spawned, 0);
        let canvas = driver.canvas().unwrap();
        let bottom = canvas.pixmap().pixel(29, 63).unwrap();
        assert!(bottom.alpha() > 0);

        driver.teardown();
        assert!(driver.spectrum_mut().is_none());
        assert_eq!(driver.mode(), None);
    }
}
