// src/projector.rs - Screen point + frame -> world position (sensor depth or fixed distance)
use nalgebra::{Matrix3, Point3, Vector3, Vector4};
use tracing::trace;

use crate::config::ProjectionConfig;
use crate::coords::{ScreenPoint, ViewportSize};
use crate::depth::sample_frame_depth;
use crate::error::{Result, TrackerError};
use crate::frame::{CameraPose, Frame};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Unit length.
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Result<Self> {
        if !origin.coords.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::InvalidGeometry("ray origin is not finite"));
        }
        let norm = direction.norm();
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Err(TrackerError::InvalidGeometry("ray direction is zero or not finite"));
        }
        Ok(Self {
            origin,
            direction: direction / norm,
        })
    }

    /// Ray from the camera through a viewport pixel.
    pub fn through_screen_point(
        screen: ScreenPoint,
        camera: &CameraPose,
        viewport: ViewportSize,
    ) -> Result<Self> {
        if viewport.is_empty() {
            return Err(TrackerError::InvalidGeometry("viewport has no area"));
        }
        if !camera.transform.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::InvalidGeometry("camera transform is not finite"));
        }
        let rotation: Matrix3<f32> = camera.transform.fixed_view::<3, 3>(0, 0).into_owned();
        if rotation.determinant().abs() <= f32::EPSILON {
            return Err(TrackerError::InvalidGeometry("camera transform is degenerate"));
        }
        let inverse_projection = camera
            .projection
            .try_inverse()
            .ok_or(TrackerError::InvalidGeometry("camera projection is not invertible"))?;

        // Screen (top-left origin) -> NDC (y up)
        let ndc_x = (2.0 * screen.x / viewport.width - 1.0) as f32;
        let ndc_y = (1.0 - 2.0 * screen.y / viewport.height) as f32;

        let near = unproject(&inverse_projection, ndc_x, ndc_y, -1.0)?;
        let far = unproject(&inverse_projection, ndc_x, ndc_y, 1.0)?;

        Self::new(camera.position(), rotation * (far - near))
    }

    pub fn point_at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction * distance
    }
}

fn unproject(
    inverse_projection: &nalgebra::Matrix4<f32>,
    x: f32,
    y: f32,
    z: f32,
) -> Result<Vector3<f32>> {
    let p = inverse_projection * Vector4::new(x, y, z, 1.0);
    if p.w.abs() <= f32::EPSILON {
        return Err(TrackerError::InvalidGeometry("unprojected point at infinity"));
    }
    Ok(p.xyz() / p.w)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthSource {
    /// Line-of-sight distance read from the depth map.
    Sensor(f32),
    Fallback(f32),
}

impl DepthSource {
    pub fn distance(&self) -> f32 {
        match *self {
            DepthSource::Sensor(d) | DepthSource::Fallback(d) => d,
        }
    }

    pub fn is_sensor(&self) -> bool {
        matches!(self, DepthSource::Sensor(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub position: Point3<f32>,
    pub source: DepthSource,
}

#[derive(Debug, Clone)]
pub struct AnchorProjector {
    use_sensor_depth: bool,
    fixed_distance: f32,
}

impl AnchorProjector {
    pub fn new(config: &ProjectionConfig) -> Self {
        Self {
            use_sensor_depth: config.use_sensor_depth,
            fixed_distance: config.fixed_distance_m,
        }
    }

    /// World position under `screen`, walking the camera ray by sampled depth
    /// when available, else by the fixed distance.
    pub fn project(&self, screen: ScreenPoint, frame: &Frame) -> Result<WorldPoint> {
        let ray = Ray::through_screen_point(screen, &frame.camera, frame.viewport)?;
        let depth = if self.use_sensor_depth {
            sample_frame_depth(screen, frame)
        } else {
            None
        };
        Ok(self.place(&ray, depth))
    }

    pub fn place(&self, ray: &Ray, depth: Option<f32>) -> WorldPoint {
        let source = match depth {
            Some(d) if d.is_finite() && d > 0.0 => DepthSource::Sensor(d),
            _ => DepthSource::Fallback(self.fixed_distance),
        };
        let position = ray.point_at(source.distance());
        trace!(?source, x = position.x, y = position.y, z = position.z, "projected world point");
        WorldPoint { position, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::InterfaceOrientation;
    use crate::frame::DepthBuffer;
    use approx::assert_abs_diff_eq;
    use image::RgbImage;
    use nalgebra::Matrix4;
    use std::sync::Arc;

    fn projector() -> AnchorProjector {
        AnchorProjector::new(&ProjectionConfig::default())
    }

    fn forward_ray() -> Ray {
        Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)).unwrap()
    }

    fn landscape_frame() -> Frame {
        Frame::new(
            Arc::new(RgbImage::new(64, 48)),
            CameraPose::perspective(64.0 / 48.0, 1.0, 0.01, 100.0),
            InterfaceOrientation::LandscapeRight,
            ViewportSize::new(640.0, 480.0),
            0.0,
        )
    }

    #[test]
    fn sensor_depth_walks_the_ray() {
        let p = projector().place(&forward_ray(), Some(0.6));
        assert_abs_diff_eq!(p.position, Point3::new(0.0, 0.0, -0.6), epsilon = 1e-6);
        assert_eq!(p.source, DepthSource::Sensor(0.6));
    }

    #[test]
    fn missing_depth_uses_fixed_distance() {
        let p = projector().place(&forward_ray(), None);
        assert_abs_diff_eq!(p.position, Point3::new(0.0, 0.0, -0.45), epsilon = 1e-6);
        assert!(!p.source.is_sensor());
    }

    #[test]
    fn zero_direction_is_invalid() {
        assert!(matches!(
            Ray::new(Point3::origin(), Vector3::zeros()),
            Err(TrackerError::InvalidGeometry(_))
        ));
        assert!(Ray::new(Point3::origin(), Vector3::new(f32::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn viewport_center_looks_down_negative_z() {
        let frame = landscape_frame();
        let center = ScreenPoint::new(320.0, 240.0);
        let ray = Ray::through_screen_point(center, &frame.camera, frame.viewport).unwrap();
        assert_abs_diff_eq!(ray.direction, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        assert_abs_diff_eq!(ray.origin, Point3::origin());
    }

    #[test]
    fn screen_top_left_points_up_and_left() {
        let frame = landscape_frame();
        let corner = ScreenPoint::new(0.0, 0.0);
        let ray = Ray::through_screen_point(corner, &frame.camera, frame.viewport).unwrap();
        assert!(ray.direction.x < 0.0);
        assert!(ray.direction.y > 0.0);
        assert!(ray.direction.z < 0.0);
    }

    #[test]
    fn camera_translation_moves_origin() {
        let mut frame = landscape_frame();
        frame.camera = frame.camera.with_position(Vector3::new(1.0, 1.5, 2.0));
        let p = projector().project(ScreenPoint::new(320.0, 240.0), &frame).unwrap();
        assert_abs_diff_eq!(p.position, Point3::new(1.0, 1.5, 1.55), epsilon = 1e-5);
    }

    #[test]
    fn project_uses_depth_buffer_when_present() {
        let frame = landscape_frame().with_depth(Arc::new(DepthBuffer::filled(16, 12, 0.6)));
        let p = projector().project(ScreenPoint::new(320.0, 240.0), &frame).unwrap();
        assert_abs_diff_eq!(p.position, Point3::new(0.0, 0.0, -0.6), epsilon = 1e-5);

        let fixed = AnchorProjector::new(&ProjectionConfig {
            use_sensor_depth: false,
            ..ProjectionConfig::default()
        });
        let p = fixed.project(ScreenPoint::new(320.0, 240.0), &frame).unwrap();
        assert_abs_diff_eq!(p.position.z, -0.45, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_camera_is_invalid_geometry() {
        let mut frame = landscape_frame();
        frame.camera.transform = Matrix4::zeros();
        assert!(projector().project(ScreenPoint::new(1.0, 1.0), &frame).is_err());

        let mut frame = landscape_frame();
        frame.camera.projection = Matrix4::zeros();
        let corner = ScreenPoint::new(1.0, 1.0);
        assert!(Ray::through_screen_point(corner, &frame.camera, frame.viewport).is_err());
    }
}
