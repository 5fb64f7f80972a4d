// src/error.rs - Error taxonomy for the anchor pipeline
use thiserror::Error;

/// Errors surfaced by the tracking core.
///
/// None of these abort anything: callers degrade to "skip this frame" or
/// "use the fallback distance".
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Single-frame detector failure; the frame is skipped.
    #[error("recoverable frame error: {0}")]
    RecoverableFrame(#[from] crate::detector::DetectorError),

    /// Non-finite ray or degenerate camera transform.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
