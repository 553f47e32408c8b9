use std::{path::Path, time::Duration};

use particle_visualiser_core::{FeatureStream, Result, VisualiserError};
use reqwest::blocking::{multipart::Form, Client};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Sends an audio file to the analysis service and returns the raw JSON
/// body. Any failure is final: there is no retry.
pub fn upload_audio(endpoint: &str, audio: &Path) -> Result<String> {
    let url = format!("{}/upload", endpoint.trim_end_matches('/'));
    tracing::info!(%url, file = %audio.display(), "uploading audio for analysis");

    let form = Form::new().file("file", audio)?;
    let client = Client::builder()
        .timeout(UPLOAD_TIMEOUT)
        .build()
        .map_err(transport_error)?;

    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!(%status, "analysis upload failed");
        return Err(VisualiserError::Transport(format!(
            "analysis service answered {status}"
        )));
    }

    response.text().map_err(transport_error)
}

/// Uploads `audio` and decodes the returned feature stream.
pub fn analyse(endpoint: &str, audio: &Path) -> Result<FeatureStream> {
    let body = upload_audio(endpoint, audio)?;
    FeatureStream::from_json(&body)
}

fn transport_error(err: reqwest::Error) -> VisualiserError {
    tracing::error!(%err, "analysis request failed");
    VisualiserError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_audio_file_fails_before_any_request() {
        let err = upload_audio("http://127.0.0.1:9", Path::new("/no/such/track.mp3")).unwrap_err();
        assert!(matches!(err, VisualiserError::Io(_)));
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        let audio = std::env::temp_dir().join(format!("upload-probe-{}.mp3", std::process::id()));
        std::fs::write(&audio, b"ID3").unwrap();

        let err = upload_audio("http://127.0.0.1:9/", &audio).unwrap_err();
        assert!(matches!(err, VisualiserError::Transport(_)));

        std::fs::remove_file(&audio).unwrap();
    }
}
