use std::{collections::VecDeque, f32::consts::TAU, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::SpectrumConfig, Result, VisualiserError};

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;

/// Frequency-domain analyser for the live bar variant.
///
/// Mirrors the browser analyser node: a Blackman-windowed FFT over the most
/// recent `fft_size` samples, exponential smoothing between reads and a
/// decibel range mapped onto one byte per bin.
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
    closed: bool,
}

impl SpectrumAnalyser {
    pub fn new(config: &SpectrumConfig) -> Result<Self> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(VisualiserError::InvalidInput(
                "fft size must be a power of two between 32 and 32768",
            ));
        }
        if config.max_db <= config.min_db {
            return Err(VisualiserError::InvalidInput(
                "max_db must be greater than min_db",
            ));
        }

        Ok(Self {
            fft_size,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_db: config.min_db,
            max_db: config.max_db,
            history: std::iter::repeat(0.0).take(fft_size).collect(),
            smoothed: vec![0.0; fft_size / 2],
            fft_planner: RealFftPlanner::new(),
            fft: None,
            closed: false,
        })
    }

    /// Number of magnitude bins produced per read.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Appends time-domain samples, keeping only the most recent window.
    /// Non-finite samples are stored as silence.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if self.closed {
            return;
        }
        let keep = samples.len().min(self.fft_size);
        self.history.drain(..keep);
        self.history.extend(
            samples[samples.len() - keep..]
                .iter()
                .map(|sample| if sample.is_finite() { *sample } else { 0.0 }),
        );
    }

    /// Writes one byte per bin into `out`, which must hold
    /// [`bin_count`](Self::bin_count) entries.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        if self.closed {
            return Err(VisualiserError::msg("spectrum analyser has been closed"));
        }
        if out.len() != self.bin_count() {
            return Err(VisualiserError::InvalidInput(
                "output buffer must match the analyser bin count",
            ));
        }

        let size = self.fft_size;
        let planner = &mut self.fft_planner;
        let fft = self.fft.get_or_insert_with(|| FftResources::plan(planner, size));

        for (index, (slot, sample)) in fft.input.iter_mut().zip(&self.history).enumerate() {
            *slot = sample * blackman_value(index, size);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| VisualiserError::msg(format!("spectrum transform failed: {err}")))?;

        let range = self.max_db - self.min_db;
        for ((byte, smoothed), bin) in out.iter_mut().zip(&mut self.smoothed).zip(&fft.spectrum) {
            let magnitude = bin.norm() / size as f32;
            if !smoothed.is_finite() {
                *smoothed = 0.0;
            }
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            let decibels = 20.0 * smoothed.log10();
            *byte = (255.0 / range * (decibels - self.min_db))
                .floor()
                .clamp(0.0, 255.0) as u8;
        }

        Ok(())
    }

    /// Releases the transform buffers. Further reads fail; closing twice is
    /// harmless.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!("closing spectrum analyser");
        }
        self.closed = true;
        self.fft = None;
        self.history.clear();
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        Self {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .field("closed", &self.closed)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let phase = TAU * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}
