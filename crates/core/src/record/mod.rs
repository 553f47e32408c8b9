use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Canvas, Result, VisualiserError};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    /// Prefix of every frame file, followed by a zero-padded index.
    pub file_prefix: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            file_prefix: "frame".to_string(),
        }
    }
}

/// Writes rendered ticks to disk as a numbered PNG sequence.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    settings: RecordingSettings,
    is_recording: bool,
    frames_written: u64,
}

impl FrameRecorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            is_recording: false,
            frames_written: 0,
        }
    }

    /// Creates the output directory and starts a new sequence.
    pub fn start(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.settings.output_dir)?;
        self.is_recording = true;
        self.frames_written = 0;
        tracing::info!(dir = ?self.settings.output_dir, "recording frames");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.is_recording {
            tracing::info!(frames = self.frames_written, "recording finished");
        }
        self.is_recording = false;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Path the frame with the given index is written to.
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}_{index:05}.png", self.settings.file_prefix))
    }

    /// Encodes the canvas as the next frame of the sequence.
    pub fn capture(&mut self, canvas: &Canvas) -> Result<PathBuf> {
        if !self.is_recording {
            return Err(VisualiserError::msg("recorder has not been started"));
        }

        let path = self.frame_path(self.frames_written);
        canvas.save_png(&path)?;
        self.frames_written += 1;
        tracing::trace!(path = %path.display(), "frame captured");
        Ok(path)
    }
}
