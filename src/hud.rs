// src/hud.rs - HUD anchor, billboarded plane and touch-driven dot
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::config::HudConfig;
use crate::coords::clamp_unit;
use crate::scheduler::Generation;

/// Normalized remote pad touch. `timestamp` is the sender's Unix time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchSample {
    pub u: f64,
    pub v: f64,
    pub timestamp: f64,
}

impl TouchSample {
    pub fn new(u: f64, v: f64, timestamp: f64) -> Self {
        Self { u, v, timestamp }
    }
}

/// World placement of the HUD. Orientation is always identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Point3<f32>,
    pub generation: Generation,
    pub frame_timestamp: f64,
}

impl Anchor {
    pub fn transform(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position.coords), UnitQuaternion::identity())
    }
}

/// Dot position inside the plane: centered, clamped inputs, lifted off the surface.
pub fn local_plane_offset(sample: &TouchSample, config: &HudConfig) -> Vector3<f32> {
    let u = clamp_unit(sample.u) as f32;
    let v = clamp_unit(sample.v) as f32;
    Vector3::new(
        (u - 0.5) * config.plane_width_m,
        (v - 0.5) * config.plane_height_m,
        config.dot_lift_m,
    )
}

/// What the renderer needs to draw the HUD this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct HudSnapshot {
    pub visible: bool,
    pub anchor: Option<Isometry3<f32>>,
    /// Plane center relative to the anchor.
    pub plane_offset: Vector3<f32>,
    pub plane_size: (f32, f32),
    pub billboard: bool,
    /// Dot relative to the plane center, in plane axes.
    pub dot: Option<Vector3<f32>>,
}

/// Render-context owned HUD state. Single writer.
#[derive(Debug, Clone)]
pub struct HudState {
    config: HudConfig,
    anchor: Option<Anchor>,
    dot: Option<Vector3<f32>>,
}

impl HudState {
    pub fn new(config: HudConfig) -> Self {
        Self {
            config,
            anchor: None,
            dot: None,
        }
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }

    pub fn dot(&self) -> Option<Vector3<f32>> {
        self.dot
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        debug!(
            generation = anchor.generation,
            x = anchor.position.x,
            y = anchor.position.y,
            z = anchor.position.z,
            "anchor moved"
        );
        self.anchor = Some(anchor);
    }

    /// Moves the dot; returns false when nothing visible changed.
    pub fn apply_touch(&mut self, sample: &TouchSample) -> bool {
        if !self.config.enabled {
            return false;
        }
        let offset = local_plane_offset(sample, &self.config);
        if self.dot == Some(offset) {
            return false;
        }
        self.dot = Some(offset);
        true
    }

    pub fn plane_offset(&self) -> Vector3<f32> {
        Vector3::new(0.0, self.config.vertical_offset_m, 0.0)
    }

    /// World pose of the plane, turned so its +Z normal faces `viewer`.
    pub fn plane_world_pose(&self, viewer: &Point3<f32>) -> Option<Isometry3<f32>> {
        let anchor = self.anchor.as_ref()?;
        let center = anchor.position + self.plane_offset();
        let to_viewer = viewer - center;
        let up = Vector3::y();
        let facing = to_viewer.norm() > f32::EPSILON && to_viewer.cross(&up).norm() > f32::EPSILON;
        let rotation = if facing {
            UnitQuaternion::face_towards(&to_viewer, &up)
        } else {
            UnitQuaternion::identity()
        };
        Some(Isometry3::from_parts(Translation3::from(center.coords), rotation))
    }

    /// World position of the dot as seen from `viewer`.
    pub fn dot_world_position(&self, viewer: &Point3<f32>) -> Option<Point3<f32>> {
        let pose = self.plane_world_pose(viewer)?;
        Some(pose * Point3::from(self.dot?))
    }

    pub fn snapshot(&self) -> HudSnapshot {
        HudSnapshot {
            visible: self.config.enabled && self.anchor.is_some(),
            anchor: self.anchor.as_ref().map(Anchor::transform),
            plane_offset: self.plane_offset(),
            plane_size: (self.config.plane_width_m, self.config.plane_height_m),
            billboard: true,
            dot: self.dot,
        }
    }
}

/// Producer half of [`KeepLatest`]. Sending never blocks and never fails; a
/// newer value overwrites one the sampler has not picked up yet.
pub struct LatestSender<T> {
    tx: Arc<watch::Sender<Option<(u64, T)>>>,
}

impl<T> Clone for LatestSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> LatestSender<T> {
    pub fn send(&self, value: T) {
        self.tx.send_modify(|slot| {
            let seq = slot.as_ref().map_or(1, |(seq, _)| seq + 1);
            *slot = Some((seq, value));
        });
    }
}

/// Fixed-tick keep-latest sampler.
///
/// A value is released at most once per period; anything sent in between is
/// overwritten by the next send.
pub struct KeepLatest<T> {
    rx: watch::Receiver<Option<(u64, T)>>,
    period: Duration,
    last_emit: Option<Instant>,
    last_seq: Option<u64>,
}

impl<T: Clone> KeepLatest<T> {
    pub fn channel(period: Duration) -> (LatestSender<T>, Self) {
        let (tx, rx) = watch::channel(None);
        let sampler = Self {
            rx,
            period,
            last_emit: None,
            last_seq: None,
        };
        (LatestSender { tx: Arc::new(tx) }, sampler)
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.period {
                return None;
            }
        }
        let (seq, value) = self.rx.borrow().as_ref().map(|(seq, v)| (*seq, v.clone()))?;
        if self.last_seq == Some(seq) {
            return None;
        }
        self.last_seq = Some(seq);
        self.last_emit = Some(now);
        Some(value)
    }
}
