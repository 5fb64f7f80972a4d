// src/depth.rs - Confidence-weighted bilinear depth lookup at a screen point
use crate::coords::{screen_to_display, DisplayTransform, ScreenPoint, ViewportSize};
use crate::frame::{ConfidenceBuffer, DepthBuffer, Frame};

/// Lower bound on a normalized confidence weight, keeps low-confidence pixels
/// in play.
pub const MIN_CONFIDENCE_WEIGHT: f32 = 0.05;

/// Line-of-sight depth in meters at `screen`, or `None` when there is no usable
/// sample.
pub fn sample_depth(
    screen: ScreenPoint,
    depth: Option<&DepthBuffer>,
    confidence: Option<&ConfidenceBuffer>,
    viewport: ViewportSize,
    display: &DisplayTransform,
) -> Option<f32> {
    let depth = depth?;

    // View point -> normalized image coordinates, clamped onto the map
    let image = display.display_to_image(screen_to_display(screen, viewport))?;
    let image = image.clamped();

    let pixels = depth.lock_read()?;
    let (w, h) = (pixels.width(), pixels.height());
    let fx = (w - 1) as f64 * image.x;
    let fy = (h - 1) as f64 * image.y;

    let x0 = (fx.floor() as usize).min(w - 1);
    let y0 = (fy.floor() as usize).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = (fx - x0 as f64) as f32;
    let ty = (fy - y0 as f64) as f32;

    let mut d00 = pixels.at_clamped(x0, y0)?;
    let d10 = pixels.at_clamped(x1, y0)?;
    let mut d01 = pixels.at_clamped(x0, y1)?;
    let d11 = pixels.at_clamped(x1, y1)?;
    drop(pixels);

    if let Some(weights) = confidence.and_then(|c| confidence_weights(c, [x0, x1], [y0, y1])) {
        let [w00, w10, w01, w11] = weights;
        d00 = blend_pair(d00, d10, w00, w10);
        d01 = blend_pair(d01, d11, w01, w11);
    }

    let d0 = d00 + (d10 - d00) * tx;
    let d1 = d01 + (d11 - d01) * tx;
    let d = d0 + (d1 - d0) * ty;

    (d.is_finite() && d > 0.0).then_some(d)
}

/// [`sample_depth`] against the buffers carried by `frame`.
pub fn sample_frame_depth(screen: ScreenPoint, frame: &Frame) -> Option<f32> {
    sample_depth(
        screen,
        frame.depth.as_deref(),
        frame.confidence.as_deref(),
        frame.viewport,
        &frame.display_transform(),
    )
}

// Weights for (x0,y0), (x1,y0), (x0,y1), (x1,y1), each floored at
// MIN_CONFIDENCE_WEIGHT.
fn confidence_weights(
    confidence: &ConfidenceBuffer,
    xs: [usize; 2],
    ys: [usize; 2],
) -> Option<[f32; 4]> {
    let pixels = confidence.lock_read()?;
    let weight = |x: usize, y: usize| -> Option<f32> {
        let raw = pixels.at_clamped(x, y)?;
        Some((raw as f32 / 255.0).max(MIN_CONFIDENCE_WEIGHT))
    };
    Some([
        weight(xs[0], ys[0])?,
        weight(xs[1], ys[0])?,
        weight(xs[0], ys[1])?,
        weight(xs[1], ys[1])?,
    ])
}

fn blend_pair(a: f32, b: f32, wa: f32, wb: f32) -> f32 {
    let total = wa + wb;
    if total > 0.0 {
        a * (wa / total) + b * (wb / total)
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::NormalizedPoint;
    use approx::assert_abs_diff_eq;

    fn viewport() -> ViewportSize {
        ViewportSize::new(100.0, 100.0)
    }

    fn identity() -> DisplayTransform {
        DisplayTransform::identity()
    }

    #[test]
    fn constant_depth_is_returned_everywhere() {
        let depth = DepthBuffer::filled(16, 12, 0.8);
        for (x, y) in [(0.0, 0.0), (12.34, 56.7), (99.9, 0.1), (50.5, 50.5), (100.0, 100.0)] {
            let at = ScreenPoint::new(x, y);
            let d = sample_depth(at, Some(&depth), None, viewport(), &identity()).unwrap();
            assert_abs_diff_eq!(d, 0.8, epsilon = 1e-5);
        }
    }

    #[test]
    fn constant_depth_survives_confidence_blend() {
        let depth = DepthBuffer::filled(8, 8, 1.25);
        let confidence = ConfidenceBuffer::from_fn(8, 8, |x, y| ((x * 37 + y * 11) % 256) as u8);
        let d = sample_depth(
            ScreenPoint::new(33.3, 71.9),
            Some(&depth),
            Some(&confidence),
            viewport(),
            &identity(),
        )
        .unwrap();
        assert_abs_diff_eq!(d, 1.25, epsilon = 1e-5);
    }

    #[test]
    fn zero_confidence_uses_floor_weights() {
        let depth = DepthBuffer::from_fn(4, 4, |x, _| 0.5 + x as f32 * 0.1);
        let confidence = ConfidenceBuffer::filled(4, 4, 0);
        let d = sample_depth(
            ScreenPoint::new(40.0, 40.0),
            Some(&depth),
            Some(&confidence),
            viewport(),
            &identity(),
        )
        .unwrap();
        // fx = 1.2: each row pair averages to 0.65, then the lerp moves 0.2 toward 0.7
        assert_abs_diff_eq!(d, 0.66, epsilon = 1e-5);
        let at = ScreenPoint::new(40.0, 40.0);
        let plain = sample_depth(at, Some(&depth), None, viewport(), &identity()).unwrap();
        assert_abs_diff_eq!(plain, 0.62, epsilon = 1e-5);
    }

    #[test]
    fn horizontal_gradient_interpolates_without_confidence() {
        // depth = x in pixel units + 1, so a query at fx returns fx + 1
        let depth = DepthBuffer::from_fn(11, 2, |x, _| x as f32 + 1.0);
        let at = ScreenPoint::new(25.0, 0.0);
        let d = sample_depth(at, Some(&depth), None, viewport(), &identity()).unwrap();
        assert_abs_diff_eq!(d, 3.5, epsilon = 1e-5);
    }

    #[test]
    fn confident_neighbour_dominates_row_blend() {
        // left column confident, right column barely trusted
        let depth = DepthBuffer::from_fn(2, 2, |x, _| if x == 0 { 1.0 } else { 2.0 });
        let confidence = ConfidenceBuffer::from_fn(2, 2, |x, _| if x == 0 { 255 } else { 0 });
        let d = sample_depth(
            ScreenPoint::new(0.0, 0.0),
            Some(&depth),
            Some(&confidence),
            viewport(),
            &identity(),
        )
        .unwrap();
        // blended left sample: (1.0 * 1.0 + 2.0 * 0.05) / 1.05
        assert_abs_diff_eq!(d, 1.1 / 1.05, epsilon = 1e-5);
    }

    #[test]
    fn missing_buffer_means_no_depth() {
        let d = sample_depth(ScreenPoint::new(1.0, 1.0), None, None, viewport(), &identity());
        assert!(d.is_none());
    }

    #[test]
    fn non_positive_and_nan_depth_are_rejected() {
        let at = ScreenPoint::new(10.0, 10.0);
        let zero = DepthBuffer::filled(4, 4, 0.0);
        assert!(sample_depth(at, Some(&zero), None, viewport(), &identity()).is_none());
        let nan = DepthBuffer::filled(4, 4, f32::NAN);
        assert!(sample_depth(at, Some(&nan), None, viewport(), &identity()).is_none());
    }

    #[test]
    fn out_of_view_queries_clamp_to_the_edge() {
        let depth = DepthBuffer::from_fn(3, 3, |x, y| 1.0 + (x + 3 * y) as f32);
        let far = ScreenPoint::new(-500.0, 9000.0);
        let d = sample_depth(far, Some(&depth), None, viewport(), &identity()).unwrap();
        // bottom-left pixel
        assert_abs_diff_eq!(d, 7.0, epsilon = 1e-5);
    }

    #[test]
    fn single_pixel_buffer_is_safe() {
        let depth = DepthBuffer::filled(1, 1, 0.7);
        let confidence = ConfidenceBuffer::filled(1, 1, 128);
        let d = sample_depth(
            ScreenPoint::new(99.0, 99.0),
            Some(&depth),
            Some(&confidence),
            viewport(),
            &identity(),
        )
        .unwrap();
        assert_abs_diff_eq!(d, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn display_transform_is_inverted_before_lookup() {
        // display x = image y, display y = image x
        #[rustfmt::skip]
        let swap = DisplayTransform::from_matrix(nalgebra::Matrix3::new(
            0.0, 1.0, 0.0,
            1.0, 0.0, 0.0,
            0.0, 0.0, 1.0,
        ));
        let depth = DepthBuffer::from_fn(2, 2, |x, y| if x == 1 && y == 0 { 3.0 } else { 1.0 });
        // display (0, 1) -> image (1, 0)
        let d = sample_depth(ScreenPoint::new(0.0, 100.0), Some(&depth), None, viewport(), &swap);
        assert_abs_diff_eq!(d.unwrap(), 3.0, epsilon = 1e-6);
        let p = swap.display_to_image(NormalizedPoint::new(0.0, 1.0)).unwrap();
        assert_abs_diff_eq!(p.x, 1.0);
    }
}
