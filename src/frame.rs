// src/frame.rs - Per-tick capture handed to the tracker
use std::sync::{Arc, RwLock, RwLockReadGuard};

use image::RgbImage;
use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

use crate::coords::{DisplayTransform, InterfaceOrientation, ViewportSize};
use crate::error::{Result, TrackerError};

/// Row-strided pixel buffer shared with the capture pipeline.
///
/// Readers take a scoped lock for the duration of a lookup; the capture side
/// writes in place through [`PixelBuffer::write`].
#[derive(Debug)]
pub struct PixelBuffer<T> {
    width: usize,
    height: usize,
    row_stride: usize,
    data: RwLock<Vec<T>>,
}

pub type DepthBuffer = PixelBuffer<f32>;
pub type ConfidenceBuffer = PixelBuffer<u8>;

impl<T: Copy> PixelBuffer<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        Self::with_stride(width, height, width, data)
    }

    /// `row_stride` is in elements and may include row padding.
    pub fn with_stride(
        width: usize,
        height: usize,
        row_stride: usize,
        data: Vec<T>,
    ) -> Result<Self> {
        if row_stride < width {
            return Err(TrackerError::Config(format!(
                "row stride {row_stride} shorter than width {width}"
            )));
        }
        let needed = row_stride * height;
        if data.len() < needed {
            return Err(TrackerError::Config(format!(
                "pixel buffer holds {} elements, {}x{} (stride {}) needs {}",
                data.len(),
                width,
                height,
                row_stride,
                needed
            )));
        }
        Ok(Self {
            width,
            height,
            row_stride,
            data: RwLock::new(data),
        })
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            row_stride: width,
            data: RwLock::new(vec![value; width * height]),
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            row_stride: width,
            data: RwLock::new(data),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Read lock; `None` when a writer panicked mid-update or the buffer is empty.
    pub fn lock_read(&self) -> Option<PixelReadGuard<'_, T>> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let guard = self.data.read().ok()?;
        Some(PixelReadGuard {
            guard,
            width: self.width,
            height: self.height,
            row_stride: self.row_stride,
        })
    }

    /// In-place write from the capture side. The buffer cannot be resized.
    pub fn write(&self, f: impl FnOnce(&mut [T])) -> bool {
        match self.data.write() {
            Ok(mut guard) => {
                f(guard.as_mut_slice());
                true
            }
            Err(_) => false,
        }
    }
}

pub struct PixelReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, Vec<T>>,
    width: usize,
    height: usize,
    row_stride: usize,
}

impl<T: Copy> PixelReadGuard<'_, T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sample with both indices clamped into the buffer.
    pub fn at_clamped(&self, x: usize, y: usize) -> Option<T> {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.guard.get(y * self.row_stride + x).copied()
    }
}

/// Camera extrinsics (camera → world) and projection (view → clip, looking down −Z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub transform: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

impl CameraPose {
    pub fn new(transform: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        Self { transform, projection }
    }

    /// Camera at the world origin with a symmetric perspective projection.
    pub fn perspective(aspect: f32, fovy: f32, znear: f32, zfar: f32) -> Self {
        Self {
            transform: Matrix4::identity(),
            projection: Perspective3::new(aspect, fovy, znear, zfar).to_homogeneous(),
        }
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.transform.fixed_view_mut::<3, 1>(0, 3).copy_from(&position);
        self
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::new(
            self.transform[(0, 3)],
            self.transform[(1, 3)],
            self.transform[(2, 3)],
        )
    }
}

/// Everything captured for one tick. Shared read-only with the background job.
#[derive(Debug, Clone)]
pub struct Frame {
    pub color_image: Arc<RgbImage>,
    pub depth: Option<Arc<DepthBuffer>>,
    pub confidence: Option<Arc<ConfidenceBuffer>>,
    pub camera: CameraPose,
    pub orientation: InterfaceOrientation,
    pub viewport: ViewportSize,
    pub timestamp: f64,
}

impl Frame {
    pub fn new(
        color_image: Arc<RgbImage>,
        camera: CameraPose,
        orientation: InterfaceOrientation,
        viewport: ViewportSize,
        timestamp: f64,
    ) -> Self {
        Self {
            color_image,
            depth: None,
            confidence: None,
            camera,
            orientation,
            viewport,
            timestamp,
        }
    }

    pub fn with_depth(mut self, depth: Arc<DepthBuffer>) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_confidence(mut self, confidence: Arc<ConfidenceBuffer>) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn image_size(&self) -> (u32, u32) {
        self.color_image.dimensions()
    }

    pub fn display_transform(&self) -> DisplayTransform {
        DisplayTransform::new(self.orientation, self.image_size(), self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_is_rejected() {
        assert!(DepthBuffer::new(4, 4, vec![1.0; 15]).is_err());
        assert!(DepthBuffer::with_stride(4, 2, 3, vec![1.0; 8]).is_err());
    }

    #[test]
    fn strided_reads_skip_padding() {
        // 2x2 image with one padding element per row
        let data = vec![1.0, 2.0, -9.0, 3.0, 4.0, -9.0];
        let buffer = DepthBuffer::with_stride(2, 2, 3, data).unwrap();
        let guard = buffer.lock_read().unwrap();
        assert_eq!(guard.at_clamped(1, 0), Some(2.0));
        assert_eq!(guard.at_clamped(0, 1), Some(3.0));
        // clamped past the right edge, never into padding
        assert_eq!(guard.at_clamped(5, 1), Some(4.0));
    }

    #[test]
    fn empty_buffer_cannot_be_locked() {
        let buffer = ConfidenceBuffer::filled(0, 3, 0);
        assert!(buffer.lock_read().is_none());
    }

    #[test]
    fn capture_side_writes_are_visible() {
        let buffer = DepthBuffer::filled(2, 2, 1.0);
        assert!(buffer.write(|px| px[3] = 5.0));
        assert_eq!(buffer.lock_read().unwrap().at_clamped(1, 1), Some(5.0));
    }

    #[test]
    fn camera_position_comes_from_translation() {
        let pose = CameraPose::perspective(1.0, 1.0, 0.01, 10.0)
            .with_position(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.position(), Point3::new(1.0, 2.0, 3.0));
    }
}
