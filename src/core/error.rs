use thiserror::Error;

/// Failures that block a user-initiated action and are surfaced to the UI.
///
/// Everything else (no buffer loaded, out-of-range values, stopping a node
/// twice) is handled in place and never becomes an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("master capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("offline render failed: {0}")]
    RenderFailed(String),
    #[error("audio decode failed: {0}")]
    Decode(String),
    #[error("audio fetch failed: {0}")]
    Fetch(String),
    #[error("audio graph construction failed: {0}")]
    Graph(String),
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
}
