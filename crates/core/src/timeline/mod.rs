use std::time::{Duration, Instant};

use crate::{FeatureFrame, FeatureStream};

/// Resolves the active feature frame for a playback position.
///
/// Forward playback advances a cursor that never moves backwards, so each
/// lookup only searches the unvisited tail. A position earlier than the
/// previous lookup (seek or loop) rewinds the cursor to the start.
#[derive(Debug, Default)]
pub struct FeatureFrameIndex {
    stream: FeatureStream,
    cursor: usize,
    last_time: Option<f64>,
}

impl FeatureFrameIndex {
    pub fn new(stream: FeatureStream) -> Self {
        Self {
            stream,
            cursor: 0,
            last_time: None,
        }
    }

    pub fn stream(&self) -> &FeatureStream {
        &self.stream
    }

    /// Forgets the cursor, e.g. after the transport restarted the track.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.last_time = None;
    }

    /// Position of the first frame whose timestamp is `>= seconds`.
    pub fn resolve_index(&mut self, seconds: f64) -> Option<usize> {
        if !seconds.is_finite() {
            return None;
        }

        if self.last_time.is_some_and(|last| seconds < last) {
            tracing::debug!(seconds, "playback moved backwards; rewinding frame cursor");
            self.cursor = 0;
        }
        self.last_time = Some(seconds);

        let times = self.stream.times();
        let start = self.cursor.min(times.len());
        self.cursor = start + times[start..].partition_point(|t| *t < seconds);

        (self.cursor < times.len()).then_some(self.cursor)
    }

    /// Active frame for the playback position, `None` once the track has run
    /// past its last timestamp or when the stream is empty.
    pub fn resolve(&mut self, seconds: f64) -> Option<&FeatureFrame> {
        let index = self.resolve_index(seconds)?;
        self.stream.frame(index)
    }
}

/// Paces the tick chain at a fixed refresh rate.
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            next_deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next refresh opportunity. A caller that fell behind
    /// is not made to catch up with a burst of ticks.
    pub fn wait(&mut self) {
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
            self.next_deadline = Some(deadline + self.interval);
        } else {
            self.next_deadline = Some(now + self.interval);
        }
    }
}
