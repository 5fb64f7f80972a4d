// src/coords.rs - Detector / image / display / screen space conversions
//
// Detector space: normalized, bottom-left origin.
// Image space: normalized, top-left origin, sensor-native (landscape) axes.
// Display space: normalized, top-left origin, as seen in the viewport.
// Screen space: viewport pixels, top-left origin.
use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Clamps to [0, 1]; NaN collapses to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// EXIF-style orientation the detector is told the captured image has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageOrientation {
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl ImageOrientation {
    pub const ALL: [ImageOrientation; 8] = [
        ImageOrientation::Up,
        ImageOrientation::Down,
        ImageOrientation::Left,
        ImageOrientation::Right,
        ImageOrientation::UpMirrored,
        ImageOrientation::DownMirrored,
        ImageOrientation::LeftMirrored,
        ImageOrientation::RightMirrored,
    ];

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            ImageOrientation::UpMirrored
                | ImageOrientation::DownMirrored
                | ImageOrientation::LeftMirrored
                | ImageOrientation::RightMirrored
        )
    }
}

/// Device interface orientation as reported by the window scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    Unknown,
}

impl InterfaceOrientation {
    pub const ALL: [InterfaceOrientation; 5] = [
        InterfaceOrientation::Portrait,
        InterfaceOrientation::PortraitUpsideDown,
        InterfaceOrientation::LandscapeLeft,
        InterfaceOrientation::LandscapeRight,
        InterfaceOrientation::Unknown,
    ];

    /// Orientation handed to the detector for frames captured in this UI orientation.
    pub fn image_orientation(self) -> ImageOrientation {
        match self {
            InterfaceOrientation::Portrait => ImageOrientation::Right,
            InterfaceOrientation::PortraitUpsideDown => ImageOrientation::Left,
            InterfaceOrientation::LandscapeLeft => ImageOrientation::Down,
            InterfaceOrientation::LandscapeRight => ImageOrientation::Up,
            InterfaceOrientation::Unknown => ImageOrientation::Right,
        }
    }

    fn is_portrait(self) -> bool {
        matches!(
            self,
            InterfaceOrientation::Portrait
                | InterfaceOrientation::PortraitUpsideDown
                | InterfaceOrientation::Unknown
        )
    }
}

/// Detector (bottom-left) point to camera image (top-left) point.
///
/// Mirrored orientations are passed through untouched.
pub fn detector_to_image(p: NormalizedPoint, orientation: ImageOrientation) -> NormalizedPoint {
    match orientation {
        ImageOrientation::Up => NormalizedPoint::new(p.x, 1.0 - p.y),
        ImageOrientation::Down => NormalizedPoint::new(1.0 - p.x, p.y),
        ImageOrientation::Right => NormalizedPoint::new(1.0 - p.y, 1.0 - p.x),
        ImageOrientation::Left => NormalizedPoint::new(p.y, p.x),
        _ => p,
    }
}

/// Inverse of [`detector_to_image`]. Every non-mirrored mapping is its own inverse.
pub fn image_to_detector(p: NormalizedPoint, orientation: ImageOrientation) -> NormalizedPoint {
    match orientation {
        ImageOrientation::Up => NormalizedPoint::new(p.x, 1.0 - p.y),
        ImageOrientation::Down => NormalizedPoint::new(1.0 - p.x, p.y),
        ImageOrientation::Right => NormalizedPoint::new(1.0 - p.y, 1.0 - p.x),
        ImageOrientation::Left => NormalizedPoint::new(p.y, p.x),
        _ => p,
    }
}

/// Affine map from image-normalized to display-normalized coordinates.
///
/// Rotates the sensor image into the interface orientation, then crops it
/// aspect-fill into the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    matrix: Matrix3<f64>,
}

impl DisplayTransform {
    pub fn new(
        orientation: InterfaceOrientation,
        image_size: (u32, u32),
        viewport: ViewportSize,
    ) -> Self {
        #[rustfmt::skip]
        let rotation = match orientation {
            InterfaceOrientation::LandscapeRight => Matrix3::identity(),
            InterfaceOrientation::LandscapeLeft => Matrix3::new(
                -1.0, 0.0, 1.0,
                0.0, -1.0, 1.0,
                0.0, 0.0, 1.0,
            ),
            InterfaceOrientation::PortraitUpsideDown => Matrix3::new(
                0.0, 1.0, 0.0,
                -1.0, 0.0, 1.0,
                0.0, 0.0, 1.0,
            ),
            InterfaceOrientation::Portrait | InterfaceOrientation::Unknown => Matrix3::new(
                0.0, -1.0, 1.0,
                1.0, 0.0, 0.0,
                0.0, 0.0, 1.0,
            ),
        };

        let (w, h) = (image_size.0 as f64, image_size.1 as f64);
        let (rotated_w, rotated_h) = if orientation.is_portrait() { (h, w) } else { (w, h) };

        // Aspect fill: scale until both axes cover the viewport, then center-crop
        // the overflow
        let fill = (viewport.width / rotated_w).max(viewport.height / rotated_h);
        let sx = rotated_w * fill / viewport.width;
        let sy = rotated_h * fill / viewport.height;
        if !(sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0) {
            return Self { matrix: rotation };
        }
        #[rustfmt::skip]
        let crop = Matrix3::new(
            sx, 0.0, -(sx - 1.0) / 2.0,
            0.0, sy, -(sy - 1.0) / 2.0,
            0.0, 0.0, 1.0,
        );

        Self { matrix: crop * rotation }
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self { matrix: Matrix3::identity() }
    }

    pub fn image_to_display(&self, p: NormalizedPoint) -> NormalizedPoint {
        let q = self.matrix.transform_point(&Point2::new(p.x, p.y));
        NormalizedPoint::new(q.x, q.y)
    }

    /// Display-normalized back to image-normalized; `None` if the transform is
    /// degenerate.
    pub fn display_to_image(&self, p: NormalizedPoint) -> Option<NormalizedPoint> {
        let inverse = self.inverse()?;
        let q = inverse.transform_point(&Point2::new(p.x, p.y));
        let out = NormalizedPoint::new(q.x, q.y);
        out.is_finite().then_some(out)
    }

    pub fn inverse(&self) -> Option<Matrix3<f64>> {
        self.matrix.try_inverse()
    }
}

pub fn display_to_screen(p: NormalizedPoint, viewport: ViewportSize) -> ScreenPoint {
    ScreenPoint::new(p.x * viewport.width, p.y * viewport.height)
}

pub fn screen_to_display(s: ScreenPoint, viewport: ViewportSize) -> NormalizedPoint {
    NormalizedPoint::new(s.x / viewport.width, s.y / viewport.height)
}

/// Full chain for one detection: detector point → screen pixel.
pub fn detector_to_screen(
    p: NormalizedPoint,
    orientation: ImageOrientation,
    display: &DisplayTransform,
    viewport: ViewportSize,
) -> ScreenPoint {
    let image = detector_to_image(p.clamped(), orientation);
    display_to_screen(display.image_to_display(image), viewport)
}
