// src/detector.rs - Hand pose detector seam plus a simulated detector for demos
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbImage;
use thiserror::Error;

use crate::coords::ImageOrientation;
use crate::hand::{HandJoint, HandObservation, JointPoint};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unsupported image {width}x{height}")]
    UnsupportedImage { width: u32, height: u32 },
}

/// External hand pose detector. Runs on the background context.
pub trait HandPoseDetector: Send + Sync {
    fn detect(
        &self,
        image: &RgbImage,
        orientation: ImageOrientation,
    ) -> Result<Vec<HandObservation>, DetectorError>;
}

impl<F> HandPoseDetector for F
where
    F: Fn(&RgbImage, ImageOrientation) -> Result<Vec<HandObservation>, DetectorError> + Send + Sync,
{
    fn detect(
        &self,
        image: &RgbImage,
        orientation: ImageOrientation,
    ) -> Result<Vec<HandObservation>, DetectorError> {
        self(image, orientation)
    }
}

/// Scripted two-hand detector: the primary hand's thumb traces a slow circle,
/// a second, weaker hand sits still in the lower corner.
pub struct SimulatedDetector {
    calls: AtomicU64,
    max_hands: usize,
    fail_every: Option<u64>,
}

impl SimulatedDetector {
    pub fn new(max_hands: usize) -> Self {
        Self {
            calls: AtomicU64::new(0),
            max_hands,
            fail_every: None,
        }
    }

    /// Every `n`th call fails, to exercise frame skipping.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    fn primary_hand(t: f64) -> HandObservation {
        let cx = 0.5 + 0.15 * (t * 0.8).cos();
        let cy = 0.5 + 0.15 * (t * 0.8).sin();
        let confidence = 0.8 + 0.15 * (t * 2.0).sin().abs() as f32;
        HandObservation::new()
            .with_joint(HandJoint::Wrist, JointPoint::new(cx, cy - 0.15, confidence))
            .with_joint(HandJoint::ThumbCmc, JointPoint::new(cx - 0.06, cy - 0.10, confidence))
            .with_joint(HandJoint::ThumbMp, JointPoint::new(cx - 0.04, cy - 0.05, confidence))
            .with_joint(HandJoint::ThumbIp, JointPoint::new(cx - 0.02, cy - 0.02, confidence))
            .with_joint(HandJoint::ThumbTip, JointPoint::new(cx, cy, confidence * 0.9))
            .with_joint(HandJoint::IndexTip, JointPoint::new(cx + 0.03, cy + 0.08, confidence))
    }

    fn secondary_hand() -> HandObservation {
        HandObservation::new()
            .with_joint(HandJoint::Wrist, JointPoint::new(0.85, 0.1, 0.5))
            .with_joint(HandJoint::ThumbIp, JointPoint::new(0.8, 0.2, 0.35))
            .with_joint(HandJoint::ThumbTip, JointPoint::new(0.78, 0.22, 0.15))
    }
}

impl HandPoseDetector for SimulatedDetector {
    fn detect(
        &self,
        image: &RgbImage,
        _orientation: ImageOrientation,
    ) -> Result<Vec<HandObservation>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::UnsupportedImage { width, height });
        }
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(n) = self.fail_every {
            if call % n == 0 {
                return Err(DetectorError::Inference(format!("simulated failure on call {call}")));
            }
        }

        let t = call as f64 * 0.033;
        let mut hands = vec![Self::primary_hand(t), Self::secondary_hand()];
        hands.truncate(self.max_hands);
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::select_candidate;

    #[test]
    fn primary_hand_wins_selection() {
        let detector = SimulatedDetector::new(2);
        let hands = detector.detect(&RgbImage::new(8, 8), ImageOrientation::Right).unwrap();
        assert_eq!(hands.len(), 2);
        let chosen = select_candidate(&hands, HandJoint::ThumbIp, 0.2).unwrap();
        assert_eq!(chosen.index, 0);
    }

    #[test]
    fn single_hand_limit_keeps_the_primary() {
        let detector = SimulatedDetector::new(1);
        let hands = detector.detect(&RgbImage::new(8, 8), ImageOrientation::Right).unwrap();
        assert_eq!(hands.len(), 1);
        let thumb = hands[0].joint(HandJoint::ThumbIp).unwrap();
        assert!(thumb.confidence >= 0.8);
    }

    #[test]
    fn scheduled_failures() {
        let detector = SimulatedDetector::new(2).failing_every(3);
        let image = RgbImage::new(4, 4);
        assert!(detector.detect(&image, ImageOrientation::Up).is_ok());
        assert!(detector.detect(&image, ImageOrientation::Up).is_ok());
        assert!(detector.detect(&image, ImageOrientation::Up).is_err());
    }

    #[test]
    fn empty_image_is_rejected() {
        let detector = SimulatedDetector::new(1);
        assert!(matches!(
            detector.detect(&RgbImage::new(0, 0), ImageOrientation::Up),
            Err(DetectorError::UnsupportedImage { .. })
        ));
    }

    #[test]
    fn closures_are_detectors() {
        let detector =
            |_: &RgbImage, _: ImageOrientation| -> Result<Vec<HandObservation>, DetectorError> {
                Ok(Vec::new())
            };
        assert!(detector.detect(&RgbImage::new(1, 1), ImageOrientation::Up).unwrap().is_empty());
    }
}
