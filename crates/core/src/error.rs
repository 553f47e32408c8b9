/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
///
/// None of these are fatal to the host: callers log them and degrade to
/// "nothing visible" rather than aborting the animation chain.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Free-form message for conditions that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The analysis payload could not be decoded.
    #[error("malformed analysis payload: {0}")]
    Json(#[from] serde_json::Error),
    /// A caller handed over data that can never be processed.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The feature stream violates its ordering contract.
    #[error("invalid feature stream: {0}")]
    InvalidStream(String),
    /// The drawing surface could not be allocated or encoded.
    #[error("surface error: {0}")]
    Surface(String),
    /// Upload or network failure while talking to the analysis service.
    #[error("transport error: {0}")]
    Transport(String),
    /// The media transport refused to start playback.
    #[error("playback rejected: {0}")]
    Playback(String),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
