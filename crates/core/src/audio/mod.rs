use std::time::Instant;

use crate::{Result, VisualiserError};

/// Mode enum describes where the per-tick audio data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Magnitude bins read from a live frequency analyser.
    Live,
    /// Feature frames produced ahead of time by the analysis service.
    Precomputed,
}

/// Host media transport the animation follows.
pub trait PlaybackTransport {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Requests playback. Callers treat failures as advisory: the
    /// visualisation keeps running on whatever position is reported.
    fn play(&mut self) -> Result<()>;
}

/// Wall-clock transport standing in for an audio element.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayback {
    started: Option<Instant>,
    offset: f64,
    autoplay_blocked: bool,
}

impl SimulatedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose `play` requests are always refused, the way a browser
    /// rejects autoplay without a user gesture.
    pub fn autoplay_blocked() -> Self {
        Self {
            autoplay_blocked: true,
            ..Self::default()
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    pub fn pause(&mut self) {
        self.offset = self.current_time();
        self.started = None;
    }

    /// Jumps to `seconds`, keeping the play/pause state.
    pub fn seek(&mut self, seconds: f64) {
        self.offset = seconds.max(0.0);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }
}

impl PlaybackTransport for SimulatedPlayback {
    fn current_time(&self) -> f64 {
        let running = self
            .started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.offset + running
    }

    fn play(&mut self) -> Result<()> {
        if self.autoplay_blocked {
            return Err(VisualiserError::Playback(
                "autoplay is not permitted".to_string(),
            ));
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }
}

/// Transport that moves by a fixed step each time it is advanced. Used when
/// rendering frames offline, where wall-clock time is meaningless.
#[derive(Debug, Clone, PartialEq)]
pub struct SteppedPlayback {
    time_seconds: f64,
    step_seconds: f64,
    playing: bool,
}

impl SteppedPlayback {
    pub fn new(step_seconds: f64) -> Self {
        Self {
            time_seconds: 0.0,
            step_seconds,
            playing: false,
        }
    }

    /// Advances one step if playback has been started.
    pub fn advance(&mut self) {
        if self.playing {
            self.time_seconds = (self.time_seconds + self.step_seconds).max(0.0);
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        self.time_seconds = seconds.max(0.0);
    }
}

impl PlaybackTransport for SteppedPlayback {
    fn current_time(&self) -> f64 {
        self.time_seconds
    }

    fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }
}
