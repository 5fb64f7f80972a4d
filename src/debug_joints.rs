// src/debug_joints.rs - Depth-scaled debug markers for detected joints
use std::collections::BTreeMap;

use nalgebra::Point3;

use crate::config::DebugJointConfig;
use crate::coords::{detector_to_screen, DisplayTransform};
use crate::depth::sample_frame_depth;
use crate::frame::Frame;
use crate::hand::{HandJoint, HandObservation};
use crate::projector::{AnchorProjector, DepthSource};

/// Depth floor for the inverse-depth scale.
pub const MIN_MARKER_DEPTH: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointMarker {
    pub joint: HandJoint,
    pub position: Point3<f32>,
    pub scale: f32,
}

/// Closer joints draw larger. Unknown depth counts as the reference depth.
pub fn marker_scale(sampled_depth: Option<f32>, config: &DebugJointConfig) -> f32 {
    let depth = sampled_depth.unwrap_or(config.reference_depth_m);
    let scale = config.reference_depth_m / depth.max(MIN_MARKER_DEPTH);
    scale.clamp(config.min_scale, config.max_scale)
}

/// Markers for the joints of `observation` in the configured group.
///
/// Joints at or below `min_confidence`, and joints without a valid world
/// point, produce nothing.
pub fn compute_markers(
    observation: &HandObservation,
    frame: &Frame,
    display: &DisplayTransform,
    projector: &AnchorProjector,
    config: &DebugJointConfig,
    min_confidence: f32,
) -> Vec<JointMarker> {
    let orientation = frame.orientation.image_orientation();
    observation
        .joints_in(config.group, min_confidence)
        .into_iter()
        .filter_map(|(joint, point)| {
            let screen = detector_to_screen(point.location, orientation, display, frame.viewport);
            let world = projector.project(screen, frame).ok()?;
            let depth = match world.source {
                DepthSource::Sensor(d) => Some(d),
                DepthSource::Fallback(_) => sample_frame_depth(screen, frame),
            };
            Some(JointMarker {
                joint,
                position: world.position,
                scale: marker_scale(depth, config),
            })
        })
        .collect()
}

/// Render-side marker set. Markers persist and are updated in place.
#[derive(Debug, Clone, Default)]
pub struct DebugJointOverlay {
    markers: BTreeMap<HandJoint, JointMarker>,
}

impl DebugJointOverlay {
    pub fn apply(&mut self, markers: &[JointMarker]) {
        for marker in markers {
            self.markers.insert(marker.joint, *marker);
        }
    }

    pub fn markers(&self) -> impl Iterator<Item = &JointMarker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectionConfig;
    use crate::coords::{InterfaceOrientation, ViewportSize};
    use crate::frame::{CameraPose, DepthBuffer};
    use crate::hand::{JointGroup, JointPoint};
    use approx::assert_abs_diff_eq;
    use image::RgbImage;
    use std::sync::Arc;

    #[test]
    fn half_reference_depth_clamps_to_max() {
        let cfg = DebugJointConfig::default();
        assert_abs_diff_eq!(marker_scale(Some(0.225), &cfg), 0.75);
    }

    #[test]
    fn double_reference_depth_is_unclamped() {
        let cfg = DebugJointConfig::default();
        assert_abs_diff_eq!(marker_scale(Some(0.9), &cfg), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn far_and_missing_depth() {
        let cfg = DebugJointConfig::default();
        assert_abs_diff_eq!(marker_scale(Some(10.0), &cfg), 0.15);
        // reference depth -> raw scale 1, then the clamp
        assert_abs_diff_eq!(marker_scale(None, &cfg), 0.75);
        let wide = DebugJointConfig {
            max_scale: 2.0,
            ..cfg
        };
        assert_abs_diff_eq!(marker_scale(None, &wide), 1.0);
        assert_abs_diff_eq!(marker_scale(Some(0.0), &wide), 2.0);
    }

    fn frame() -> Frame {
        Frame::new(
            Arc::new(RgbImage::new(40, 30)),
            CameraPose::perspective(4.0 / 3.0, 1.0, 0.01, 50.0),
            InterfaceOrientation::LandscapeRight,
            ViewportSize::new(400.0, 300.0),
            0.0,
        )
    }

    #[test]
    fn markers_cover_confident_thumb_joints() {
        let frame = frame().with_depth(Arc::new(DepthBuffer::filled(8, 6, 0.9)));
        let obs = HandObservation::new()
            .with_joint(HandJoint::ThumbTip, JointPoint::new(0.5, 0.5, 0.9))
            .with_joint(HandJoint::ThumbIp, JointPoint::new(0.4, 0.5, 0.1))
            .with_joint(HandJoint::IndexTip, JointPoint::new(0.6, 0.5, 0.9));
        let cfg = DebugJointConfig {
            enabled: true,
            group: JointGroup::Thumb,
            ..DebugJointConfig::default()
        };
        let projector = AnchorProjector::new(&ProjectionConfig::default());
        let display = frame.display_transform();
        let markers = compute_markers(&obs, &frame, &display, &projector, &cfg, 0.2);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].joint, HandJoint::ThumbTip);
        assert_abs_diff_eq!(markers[0].scale, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(markers[0].position, Point3::new(0.0, 0.0, -0.9), epsilon = 1e-4);
    }

    #[test]
    fn overlay_updates_in_place() {
        let mut overlay = DebugJointOverlay::default();
        let marker = JointMarker {
            joint: HandJoint::ThumbTip,
            position: Point3::origin(),
            scale: 0.5,
        };
        overlay.apply(&[marker]);
        overlay.apply(&[JointMarker { scale: 0.7, ..marker }]);
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.markers().next().unwrap().scale, 0.7);
    }
}
