use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

const DEFAULT_VOLUME: f32 = 0.3;
const DEFAULT_CENTROID: f32 = 0.5;
const DEFAULT_TIMBRE: f32 = 0.5;

/// Feature summary for one analysis time slice.
///
/// The serialised names follow the analysis service payload (`vol`, `cent`,
/// `mfcc`). Optional fields that are absent on the wire take the documented
/// defaults rather than failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Normalised loudness in `[0, 1]`.
    #[serde(rename = "vol", default = "default_volume")]
    pub volume: f32,
    /// Normalised spectral centroid in `[0, 1]`.
    #[serde(rename = "cent", default = "default_centroid")]
    pub spectral_centroid: f32,
    /// Pitch-class energies, usually twelve bins.
    #[serde(default)]
    pub chroma: Vec<f32>,
    /// Cepstral-like timbre coefficients.
    #[serde(rename = "mfcc", default)]
    pub timbre: Vec<f32>,
    /// Onset flag for this slice.
    #[serde(default)]
    pub beat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f32>,
}

impl Default for FeatureFrame {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            spectral_centroid: DEFAULT_CENTROID,
            chroma: Vec::new(),
            timbre: Vec::new(),
            beat: false,
            onset: None,
            tempo: None,
        }
    }
}

impl FeatureFrame {
    /// Mean pitch-class energy, `0.0` for an empty chroma vector.
    pub fn mean_chroma(&self) -> f32 {
        if self.chroma.is_empty() {
            return 0.0;
        }
        self.chroma.iter().sum::<f32>() / self.chroma.len() as f32
    }

    /// First timbre coefficient, or the neutral default when none were sent.
    pub fn leading_timbre(&self) -> f32 {
        self.timbre.first().copied().unwrap_or(DEFAULT_TIMBRE)
    }
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

fn default_centroid() -> f32 {
    DEFAULT_CENTROID
}

/// Wire format returned by the analysis service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub data: Vec<FeatureFrame>,
    #[serde(default)]
    pub times: Vec<f64>,
}

/// Timestamped feature frames for one loaded track.
#[derive(Debug, Clone, Default)]
pub struct FeatureStream {
    times: Vec<f64>,
    frames: Vec<FeatureFrame>,
    duration: Option<f64>,
}

impl FeatureStream {
    /// Builds a stream from parallel timestamp and frame sequences.
    ///
    /// Sequences of unequal length are truncated to the shorter one. Time
    /// stamps must be finite and non-decreasing.
    pub fn new(mut times: Vec<f64>, mut frames: Vec<FeatureFrame>) -> Result<Self> {
        if times.len() != frames.len() {
            tracing::warn!(
                times = times.len(),
                frames = frames.len(),
                "feature stream sequences differ in length; truncating"
            );
            let len = times.len().min(frames.len());
            times.truncate(len);
            frames.truncate(len);
        }

        if let Some(position) = times.iter().position(|t| !t.is_finite()) {
            return Err(VisualiserError::InvalidStream(format!(
                "timestamp {position} is not finite"
            )));
        }

        if let Some(position) = times.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(VisualiserError::InvalidStream(format!(
                "timestamp {} ({}) precedes its predecessor ({})",
                position + 1,
                times[position + 1],
                times[position]
            )));
        }

        Ok(Self {
            times,
            frames,
            duration: None,
        })
    }

    /// Decodes an analysis service response.
    pub fn from_response(response: AnalysisResponse) -> Result<Self> {
        let mut stream = Self::new(response.times, response.data)?;
        stream.duration = response.duration;
        tracing::debug!(
            frames = stream.len(),
            duration = ?stream.duration(),
            "loaded feature stream"
        );
        Ok(stream)
    }

    /// Parses the JSON body produced by the analysis service.
    pub fn from_json(json: &str) -> Result<Self> {
        let response: AnalysisResponse = serde_json::from_str(json)?;
        Self::from_response(response)
    }

    /// Reads an analysis response previously saved to disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn frame(&self, index: usize) -> Option<&FeatureFrame> {
        self.frames.get(index)
    }

    pub fn timestamp(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    /// Track length as reported by the service, or the last timestamp.
    pub fn duration(&self) -> Option<f64> {
        self.duration.or_else(|| self.times.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_fields_take_defaults() {
        let stream = FeatureStream::from_json(r#"{ "data": [ {} ], "times": [0.0] }"#).unwrap();
        let frame = stream.frame(0).unwrap();

        assert_eq!(frame.volume, 0.3);
        assert_eq!(frame.spectral_centroid, 0.5);
        assert!(frame.chroma.is_empty());
        assert!(frame.timbre.is_empty());
        assert!(!frame.beat);
        assert_eq!(frame.mean_chroma(), 0.0);
        assert_eq!(frame.leading_timbre(), 0.5);
    }

    #[test]
    fn present_fields_are_kept_verbatim() {
        let json = r#"{
            "duration": 12.5,
            "data": [{
                "vol": 0.75, "cent": 0.125, "beat": true, "onset": 0.5,
                "chroma": [0.1, 0.2], "mfcc": [-3.5, 1.0], "tempo": 123.0
            }],
            "times": [0.25]
        }"#;
        let stream = FeatureStream::from_json(json).unwrap();
        let frame = stream.frame(0).unwrap();

        assert_eq!(frame.volume, 0.75);
        assert_eq!(frame.spectral_centroid, 0.125);
        assert!(frame.beat);
        assert_eq!(frame.onset, Some(0.5));
        assert_eq!(frame.tempo, Some(123.0));
        assert_eq!(frame.chroma, vec![0.1, 0.2]);
        assert_eq!(frame.timbre, vec![-3.5, 1.0]);
        assert_eq!(stream.timestamp(0), Some(0.25));
        assert_eq!(stream.duration(), Some(12.5));
    }

    #[test]
    fn missing_times_yield_an_empty_stream() {
        let stream = FeatureStream::from_json(r#"{ "data": [ { "vol": 1.0 } ] }"#).unwrap();
        assert!(stream.is_empty());
        assert_eq!(stream.duration(), None);
    }

    #[test]
    fn rejects_decreasing_timestamps() {
        let frames = vec![FeatureFrame::default(); 3];
        let err = FeatureStream::new(vec![0.0, 0.5, 0.25], frames).unwrap_err();
        assert!(format!("{err}").contains("precedes"));
    }

    #[test]
    fn accepts_repeated_timestamps() {
        let frames = vec![FeatureFrame::default(); 3];
        let stream = FeatureStream::new(vec![0.0, 0.5, 0.5], frames).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.duration(), Some(0.5));
    }

    #[test]
    fn malformed_payload_is_a_json_error() {
        let err = FeatureStream::from_json("{ not json").unwrap_err();
        assert!(matches!(err, VisualiserError::Json(_)));
    }
}
