// src/session.rs - Session status gate and the status sink capability
use std::fmt;

use tracing::info;

/// High-level AR session status, driven from outside the tracking core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    CheckingPrerequisites,
    NotSupported,
    CameraNotDetermined,
    CameraDenied,
    MissingReferenceImages,
    Ready,
    Tracking,
    Interrupted,
    SessionFailed(String),
}

impl SessionStatus {
    pub fn message(&self) -> String {
        match self {
            SessionStatus::CheckingPrerequisites => {
                "Checking camera and AR capabilities…".to_string()
            }
            SessionStatus::NotSupported => "AR is not supported on this device.".to_string(),
            SessionStatus::CameraNotDetermined => "Requesting camera permission…".to_string(),
            SessionStatus::CameraDenied => {
                "Camera access denied. Enable it in Settings.".to_string()
            }
            SessionStatus::MissingReferenceImages => {
                "No AR reference images found in the asset catalog.".to_string()
            }
            SessionStatus::Ready => "Point your camera at the tag image".to_string(),
            SessionStatus::Tracking => "Tracking image…".to_string(),
            SessionStatus::Interrupted => "Session interrupted. Hold on…".to_string(),
            SessionStatus::SessionFailed(reason) => format!("Session failed: {reason}"),
        }
    }

    /// The tracking core only does work in these states.
    pub fn allows_tracking(&self) -> bool {
        matches!(self, SessionStatus::Ready | SessionStatus::Tracking)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::SessionFailed(_)
                | SessionStatus::NotSupported
                | SessionStatus::CameraDenied
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Receives every status change. One handler, injected once.
pub trait StatusSink: Send + Sync {
    fn status_changed(&self, status: &SessionStatus);
}

/// Default sink: writes status changes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn status_changed(&self, status: &SessionStatus) {
        info!(status = ?status, "{}", status.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ready_and_tracking_allow_work() {
        assert!(SessionStatus::Ready.allows_tracking());
        assert!(SessionStatus::Tracking.allows_tracking());
        assert!(!SessionStatus::Interrupted.allows_tracking());
        assert!(!SessionStatus::default().allows_tracking());
        assert!(!SessionStatus::SessionFailed("lost".into()).allows_tracking());
    }

    #[test]
    fn failure_message_carries_reason() {
        let status = SessionStatus::SessionFailed("sensor unavailable".into());
        assert_eq!(status.to_string(), "Session failed: sensor unavailable");
        assert!(status.is_terminal());
        assert!(!SessionStatus::Interrupted.is_terminal());
    }
}
