// src/lib.rs - Fingertip tracking and depth-registered HUD anchoring
pub mod config;
pub mod coords;
pub mod debug_joints;
pub mod depth;
pub mod detector;
pub mod error;
pub mod frame;
pub mod hand;
pub mod hud;
pub mod projector;
pub mod scheduler;
pub mod session;
pub mod smoothing;
pub mod trace;
pub mod tracker;
pub mod wire;

pub use config::TrackerConfig;
pub use coords::{
    ImageOrientation, InterfaceOrientation, NormalizedPoint, ScreenPoint, ViewportSize,
};
pub use detector::{DetectorError, HandPoseDetector, SimulatedDetector};
pub use error::{Result, TrackerError};
pub use frame::{CameraPose, ConfidenceBuffer, DepthBuffer, Frame};
pub use hand::{HandJoint, HandObservation, JointGroup, JointPoint};
pub use hud::{HudSnapshot, TouchSample};
pub use projector::{DepthSource, WorldPoint};
pub use session::{SessionStatus, StatusSink};
pub use tracker::{HandAnchorTracker, TickReport, TrackerContext};
