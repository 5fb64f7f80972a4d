// src/config.rs - Tuning for inference, projection, HUD and debug markers
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::hand::{HandJoint, JointGroup};

/// Slowest interval still accepted for the inference gate: one frame at 30 Hz.
const MAX_INFERENCE_INTERVAL_MS: f64 = 1000.0 / 30.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub inference: InferenceConfig,
    pub projection: ProjectionConfig,
    pub hud: HudConfig,
    pub debug_joints: DebugJointConfig,
    pub touch_period_ms: u64,
    pub enable_smoothing: bool,
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    pub min_interval_ms: f64,
    pub confidence_threshold: f32,
    pub anchor_joint: HandJoint,
    pub max_hands: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    pub use_sensor_depth: bool,
    pub fixed_distance_m: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HudConfig {
    pub enabled: bool,
    pub plane_width_m: f32,
    pub plane_height_m: f32,
    pub vertical_offset_m: f32,
    pub dot_lift_m: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugJointConfig {
    pub enabled: bool,
    pub group: JointGroup,
    pub reference_depth_m: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            projection: ProjectionConfig::default(),
            hud: HudConfig::default(),
            debug_joints: DebugJointConfig::default(),
            touch_period_ms: 16,
            enable_smoothing: false,
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("HudAnchor")))
                .unwrap_or_else(|| PathBuf::from("./output")),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000.0 / 30.0,
            confidence_threshold: 0.2,
            anchor_joint: HandJoint::ThumbIp,
            max_hands: 2,
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            use_sensor_depth: true,
            fixed_distance_m: 0.45,
        }
    }
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plane_width_m: 0.025,
            plane_height_m: 0.025,
            vertical_offset_m: 0.075,
            dot_lift_m: 0.001,
        }
    }
}

impl Default for DebugJointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            group: JointGroup::Thumb,
            reference_depth_m: 0.45,
            min_scale: 0.15,
            max_scale: 0.75,
        }
    }
}

impl TrackerConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: TrackerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "loaded tracker config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let interval = self.inference.min_interval_ms;
        if !(interval > 0.0 && interval <= MAX_INFERENCE_INTERVAL_MS) {
            return Err(TrackerError::Config(format!(
                "inference interval {interval} ms must be in (0, {MAX_INFERENCE_INTERVAL_MS:.2}]"
            )));
        }
        if !(0.0..=1.0).contains(&self.inference.confidence_threshold) {
            return Err(TrackerError::Config(
                "confidence threshold must be within [0, 1]".to_string(),
            ));
        }
        if !(self.projection.fixed_distance_m > 0.0) {
            return Err(TrackerError::Config(
                "fixed projection distance must be positive".to_string(),
            ));
        }
        if !(self.hud.plane_width_m > 0.0 && self.hud.plane_height_m > 0.0) {
            return Err(TrackerError::Config("HUD plane must have a positive size".to_string()));
        }
        let dbg = &self.debug_joints;
        let scale_ok = dbg.min_scale > 0.0 && dbg.min_scale <= dbg.max_scale;
        if !(dbg.reference_depth_m > 0.0) || !scale_ok {
            return Err(TrackerError::Config(format!(
                "invalid debug marker scaling (reference {}, scale [{}, {}])",
                dbg.reference_depth_m, dbg.min_scale, dbg.max_scale
            )));
        }
        if self.touch_period_ms == 0 {
            return Err(TrackerError::Config("touch period must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn inference_interval(&self) -> Duration {
        Duration::from_secs_f64(self.inference.min_interval_ms / 1000.0)
    }

    pub fn touch_period(&self) -> Duration {
        Duration::from_millis(self.touch_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inference.anchor_joint, HandJoint::ThumbIp);
        assert!(!config.debug_joints.enabled);
        assert!(config.inference_interval() <= Duration::from_millis(34));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{ "projection": { "fixed_distance_m": 0.6 } }"#).unwrap();
        assert_eq!(config.projection.fixed_distance_m, 0.6);
        assert!(config.projection.use_sensor_depth);
        assert_eq!(config.hud, HudConfig::default());
    }

    #[test]
    fn slow_inference_interval_is_rejected() {
        let mut config = TrackerConfig::default();
        config.inference.min_interval_ms = 50.0;
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
        // just past one 30 Hz frame
        config.inference.min_interval_ms = 33.5;
        assert!(config.validate().is_err());
        config.inference.min_interval_ms = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn interval_bound_is_the_30hz_frame_period() {
        let mut config = TrackerConfig::default();
        assert_eq!(config.inference.min_interval_ms, MAX_INFERENCE_INTERVAL_MS);
        config.inference.min_interval_ms = 33.0;
        assert!(config.validate().is_ok());
        config.inference.min_interval_ms = 16.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_scale_clamp_is_rejected() {
        let mut config = TrackerConfig::default();
        config.debug_joints.min_scale = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        let mut config = TrackerConfig::default();
        config.debug_joints.enabled = true;
        config.save(&path).unwrap();
        assert_eq!(TrackerConfig::load(&path).unwrap(), config);
    }
}
