// src/hand.rs - Hand observations and per-frame candidate selection
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coords::NormalizedPoint;

/// 21-point hand skeleton, declared in skeleton order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandJoint {
    Wrist,
    ThumbCmc,
    ThumbMp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleDip,
    LittleTip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointGroup {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
    All,
}

impl HandJoint {
    pub const ALL: [HandJoint; 21] = [
        HandJoint::Wrist,
        HandJoint::ThumbCmc,
        HandJoint::ThumbMp,
        HandJoint::ThumbIp,
        HandJoint::ThumbTip,
        HandJoint::IndexMcp,
        HandJoint::IndexPip,
        HandJoint::IndexDip,
        HandJoint::IndexTip,
        HandJoint::MiddleMcp,
        HandJoint::MiddlePip,
        HandJoint::MiddleDip,
        HandJoint::MiddleTip,
        HandJoint::RingMcp,
        HandJoint::RingPip,
        HandJoint::RingDip,
        HandJoint::RingTip,
        HandJoint::LittleMcp,
        HandJoint::LittlePip,
        HandJoint::LittleDip,
        HandJoint::LittleTip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HandJoint::Wrist => "wrist",
            HandJoint::ThumbCmc => "thumb_cmc",
            HandJoint::ThumbMp => "thumb_mp",
            HandJoint::ThumbIp => "thumb_ip",
            HandJoint::ThumbTip => "thumb_tip",
            HandJoint::IndexMcp => "index_mcp",
            HandJoint::IndexPip => "index_pip",
            HandJoint::IndexDip => "index_dip",
            HandJoint::IndexTip => "index_tip",
            HandJoint::MiddleMcp => "middle_mcp",
            HandJoint::MiddlePip => "middle_pip",
            HandJoint::MiddleDip => "middle_dip",
            HandJoint::MiddleTip => "middle_tip",
            HandJoint::RingMcp => "ring_mcp",
            HandJoint::RingPip => "ring_pip",
            HandJoint::RingDip => "ring_dip",
            HandJoint::RingTip => "ring_tip",
            HandJoint::LittleMcp => "little_mcp",
            HandJoint::LittlePip => "little_pip",
            HandJoint::LittleDip => "little_dip",
            HandJoint::LittleTip => "little_tip",
        }
    }

    /// Finger the joint sits on; the wrist reports `All`.
    pub fn group(self) -> JointGroup {
        match self {
            HandJoint::Wrist => JointGroup::All,
            HandJoint::ThumbCmc | HandJoint::ThumbMp | HandJoint::ThumbIp | HandJoint::ThumbTip => {
                JointGroup::Thumb
            }
            HandJoint::IndexMcp
            | HandJoint::IndexPip
            | HandJoint::IndexDip
            | HandJoint::IndexTip => JointGroup::Index,
            HandJoint::MiddleMcp
            | HandJoint::MiddlePip
            | HandJoint::MiddleDip
            | HandJoint::MiddleTip => JointGroup::Middle,
            HandJoint::RingMcp | HandJoint::RingPip | HandJoint::RingDip | HandJoint::RingTip => {
                JointGroup::Ring
            }
            HandJoint::LittleMcp
            | HandJoint::LittlePip
            | HandJoint::LittleDip
            | HandJoint::LittleTip => JointGroup::Little,
        }
    }
}

impl JointGroup {
    pub fn contains(self, joint: HandJoint) -> bool {
        match self {
            JointGroup::All => true,
            group => joint.group() == group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPoint {
    /// Detector space: normalized, bottom-left origin.
    pub location: NormalizedPoint,
    pub confidence: f32,
}

impl JointPoint {
    pub fn new(x: f64, y: f64, confidence: f32) -> Self {
        Self {
            location: NormalizedPoint::new(x, y),
            confidence,
        }
    }

    pub fn clamped_confidence(&self) -> f32 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

/// One detected hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    pub joints: BTreeMap<HandJoint, JointPoint>,
}

impl HandObservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_joint(mut self, joint: HandJoint, point: JointPoint) -> Self {
        self.joints.insert(joint, point);
        self
    }

    pub fn joint(&self, joint: HandJoint) -> Option<&JointPoint> {
        self.joints.get(&joint)
    }

    /// Joints of `group` strictly above `min_confidence`, in skeleton order.
    pub fn joints_in(
        &self,
        group: JointGroup,
        min_confidence: f32,
    ) -> Vec<(HandJoint, JointPoint)> {
        self.joints
            .iter()
            .filter(|(joint, point)| {
                group.contains(**joint) && point.clamped_confidence() > min_confidence
            })
            .map(|(joint, point)| (*joint, *point))
            .collect()
    }
}

/// Winner of [`select_candidate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub confidence: f32,
}

/// Picks the observation whose `joint` is most confident.
///
/// Only confidences strictly above `min_confidence` count; ties keep the
/// earliest observation.
pub fn select_candidate(
    observations: &[HandObservation],
    joint: HandJoint,
    min_confidence: f32,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for (index, obs) in observations.iter().enumerate() {
        let Some(point) = obs.joint(joint) else { continue };
        let confidence = point.clamped_confidence();
        if confidence <= min_confidence {
            continue;
        }
        if best.map_or(true, |b| confidence > b.confidence) {
            best = Some(Candidate { index, confidence });
        }
    }
    best
}
