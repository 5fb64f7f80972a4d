// src/tracker.rs - Frame-driven hand tracking that keeps the HUD anchored to a fingertip
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{DebugJointConfig, TrackerConfig};
use crate::coords::detector_to_screen;
use crate::debug_joints::{compute_markers, DebugJointOverlay, JointMarker};
use crate::detector::HandPoseDetector;
use crate::error::{Result, TrackerError};
use crate::frame::Frame;
use crate::hand::{select_candidate, Candidate, HandJoint};
use crate::hud::{Anchor, HudSnapshot, HudState, KeepLatest, LatestSender, TouchSample};
use crate::projector::{AnchorProjector, WorldPoint};
use crate::scheduler::{CompletionQueue, Generation, InferenceScheduler};
use crate::session::{LogStatusSink, SessionStatus, StatusSink};
use crate::smoothing::AnchorFilter;

/// Everything the tracker needs from its host, built once and handed in.
pub struct TrackerContext {
    pub config: TrackerConfig,
    pub detector: Arc<dyn HandPoseDetector>,
    pub runtime: Handle,
    pub status_sink: Arc<dyn StatusSink>,
}

impl TrackerContext {
    pub fn new(
        config: TrackerConfig,
        detector: Arc<dyn HandPoseDetector>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            detector,
            runtime,
            status_sink: Arc::new(LogStatusSink),
        }
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sink = sink;
        self
    }
}

/// Result of one background pass over a frame.
#[derive(Debug, Clone, Default)]
pub struct FrameOutcome {
    pub frame_timestamp: f64,
    pub candidate: Option<Candidate>,
    pub anchor: Option<WorldPoint>,
    pub markers: Vec<JointMarker>,
}

/// An anchor move applied on the render side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorUpdate {
    pub generation: Generation,
    pub frame_timestamp: f64,
    pub world: WorldPoint,
    /// Position actually given to the HUD, after optional smoothing.
    pub applied: Anchor,
    pub markers: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub anchor_update: Option<AnchorUpdate>,
    pub dot_moved: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub submitted: u64,
    pub skipped_frames: u64,
    pub stale_completions: u64,
    /// Newest generation handed to the render side.
    pub last_generation: Option<Generation>,
}

/// Settings copied into every background job.
#[derive(Clone)]
struct JobSettings {
    anchor_joint: HandJoint,
    confidence_threshold: f32,
    debug: DebugJointConfig,
}

pub struct HandAnchorTracker {
    detector: Arc<dyn HandPoseDetector>,
    status_sink: Arc<dyn StatusSink>,
    status: SessionStatus,
    settings: JobSettings,
    projector: Arc<AnchorProjector>,
    scheduler: InferenceScheduler<FrameOutcome>,
    completions: CompletionQueue<FrameOutcome>,
    touch_tx: LatestSender<TouchSample>,
    touches: KeepLatest<TouchSample>,
    hud: HudState,
    overlay: DebugJointOverlay,
    filter: Option<AnchorFilter>,
    submitted: u64,
}

impl HandAnchorTracker {
    pub fn new(context: TrackerContext) -> Result<Self> {
        let TrackerContext {
            config,
            detector,
            runtime,
            status_sink,
        } = context;
        config.validate()?;

        let (scheduler, completions) =
            InferenceScheduler::new(config.inference_interval(), runtime);
        let (touch_tx, touches) = KeepLatest::channel(config.touch_period());

        info!(
            joint = config.inference.anchor_joint.name(),
            interval_ms = config.inference.min_interval_ms,
            sensor_depth = config.projection.use_sensor_depth,
            debug_joints = config.debug_joints.enabled,
            smoothing = config.enable_smoothing,
            "hand anchor tracker created"
        );

        Ok(Self {
            detector,
            status_sink,
            status: SessionStatus::default(),
            settings: JobSettings {
                anchor_joint: config.inference.anchor_joint,
                confidence_threshold: config.inference.confidence_threshold,
                debug: config.debug_joints.clone(),
            },
            projector: Arc::new(AnchorProjector::new(&config.projection)),
            scheduler,
            completions,
            touch_tx,
            touches,
            hud: HudState::new(config.hud.clone()),
            overlay: DebugJointOverlay::default(),
            filter: config.enable_smoothing.then(AnchorFilter::new),
            submitted: 0,
        })
    }

    /// Producer side of the remote pad stream. Newer samples overwrite ones
    /// the tracker has not consumed yet.
    pub fn touch_sender(&self) -> LatestSender<TouchSample> {
        self.touch_tx.clone()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn set_session_status(&mut self, status: SessionStatus) {
        if status == self.status {
            return;
        }
        if !status.allows_tracking() && self.status.allows_tracking() {
            // a new session starts from a clean slate
            if let Some(filter) = self.filter.as_mut() {
                filter.reset();
            }
        }
        if status.is_terminal() {
            warn!(status = ?status, "session cannot track");
        }
        self.status_sink.status_changed(&status);
        self.status = status;
    }

    /// Hands a new camera frame to the tracker. Returns the generation of the
    /// job started for it, if any.
    pub fn on_frame(&mut self, now: Instant, frame: Arc<Frame>) -> Option<Generation> {
        if !self.status.allows_tracking() {
            return None;
        }
        let detector = Arc::clone(&self.detector);
        let projector = Arc::clone(&self.projector);
        let settings = self.settings.clone();
        let generation = self
            .scheduler
            .submit(now, move || process_frame(detector.as_ref(), &projector, &settings, &frame))?;
        self.submitted += 1;
        Some(generation)
    }

    /// Render-side tick: applies the newest finished job and the latest touch.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let completion = self.completions.take_latest();

        if !self.status.allows_tracking() {
            if let Some(c) = completion {
                debug!(
                    generation = c.generation,
                    status = ?self.status,
                    "discarding completion while not tracking"
                );
            }
            // consume the pending touch so nothing old survives a resume
            let _ = self.touches.poll(now);
            return report;
        }

        if let Some(completion) = completion {
            report.anchor_update = self.apply(completion.generation, completion.output);
        }
        if let Some(sample) = self.touches.poll(now) {
            report.dot_moved = self.hud.apply_touch(&sample);
        }
        report
    }

    /// Waits for the next finished job and applies it, for hosts that await
    /// results instead of ticking. Touches are left to `tick`.
    pub async fn next_update(&mut self) -> Option<AnchorUpdate> {
        let completion = self.completions.next_fresh().await?;
        if !self.status.allows_tracking() {
            debug!(generation = completion.generation, "discarding completion while not tracking");
            return None;
        }
        self.apply(completion.generation, completion.output)
    }

    fn apply(&mut self, generation: Generation, outcome: FrameOutcome) -> Option<AnchorUpdate> {
        if !outcome.markers.is_empty() {
            self.overlay.apply(&outcome.markers);
        }
        let world = outcome.anchor?;
        let position = match self.filter.as_mut() {
            Some(filter) => filter.filter(outcome.frame_timestamp, world.position),
            None => world.position,
        };
        let anchor = Anchor {
            position,
            generation,
            frame_timestamp: outcome.frame_timestamp,
        };
        self.hud.set_anchor(anchor);
        Some(AnchorUpdate {
            generation,
            frame_timestamp: outcome.frame_timestamp,
            world,
            applied: anchor,
            markers: outcome.markers.len(),
        })
    }

    pub fn hud(&self) -> &HudState {
        &self.hud
    }

    pub fn snapshot(&self) -> HudSnapshot {
        self.hud.snapshot()
    }

    pub fn markers(&self) -> &DebugJointOverlay {
        &self.overlay
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            submitted: self.submitted,
            skipped_frames: self.scheduler.skipped_frames(),
            stale_completions: self.completions.stale_dropped(),
            last_generation: self.completions.last_applied(),
        }
    }
}

/// Detection, candidate choice and projection for one frame. Runs off the
/// render context.
fn process_frame(
    detector: &dyn HandPoseDetector,
    projector: &AnchorProjector,
    settings: &JobSettings,
    frame: &Frame,
) -> Result<FrameOutcome> {
    let orientation = frame.orientation.image_orientation();
    let observations = detector.detect(&frame.color_image, orientation)?;

    let mut outcome = FrameOutcome {
        frame_timestamp: frame.timestamp,
        ..FrameOutcome::default()
    };
    let threshold = settings.confidence_threshold;
    let Some(candidate) = select_candidate(&observations, settings.anchor_joint, threshold) else {
        return Ok(outcome);
    };
    outcome.candidate = Some(candidate);
    let hand = &observations[candidate.index];
    let display = frame.display_transform();

    if let Some(point) = hand.joint(settings.anchor_joint) {
        let screen = detector_to_screen(point.location, orientation, &display, frame.viewport);
        match projector.project(screen, frame) {
            Ok(world) => outcome.anchor = Some(world),
            Err(TrackerError::InvalidGeometry(reason)) => {
                warn!(reason, timestamp = frame.timestamp, "anchor not projected");
            }
            Err(e) => return Err(e),
        }
    }

    if settings.debug.enabled {
        outcome.markers = compute_markers(
            hand,
            frame,
            &display,
            projector,
            &settings.debug,
            settings.confidence_threshold,
        );
    }
    Ok(outcome)
}
