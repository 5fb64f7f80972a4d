// src/smoothing.rs - Constant-velocity Kalman filter for anchor positions
use nalgebra::{Matrix3, Matrix3x6, Matrix6, Point3, Vector3, Vector6};

pub struct AnchorFilter {
    state: Vector6<f64>, // [x, y, z, vx, vy, vz]
    covariance: Matrix6<f64>,
    process_noise: Matrix6<f64>,
    measurement_noise: Matrix3<f64>,
    last_timestamp: Option<f64>,
}

impl Default for AnchorFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorFilter {
    pub fn new() -> Self {
        // meters, so noise is far smaller than for normalized landmarks
        let mut process_noise = Matrix6::identity() * 1e-4;
        process_noise.fixed_view_mut::<3, 3>(3, 3).fill_diagonal(1e-3);

        Self {
            state: Vector6::zeros(),
            covariance: Matrix6::identity(),
            process_noise,
            measurement_noise: Matrix3::identity() * 4e-4,
            last_timestamp: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self {
            process_noise: self.process_noise,
            measurement_noise: self.measurement_noise,
            ..Self::new()
        };
    }

    /// Feeds one measurement taken at `timestamp` seconds and returns the
    /// filtered position. The first measurement is passed through.
    pub fn filter(&mut self, timestamp: f64, measurement: Point3<f32>) -> Point3<f32> {
        let z = measurement.coords.cast::<f64>();
        let Some(last) = self.last_timestamp else {
            self.state.fixed_rows_mut::<3>(0).copy_from(&z);
            self.last_timestamp = Some(timestamp);
            return measurement;
        };

        let dt = timestamp - last;
        if dt > 0.0 && dt.is_finite() {
            self.predict(dt);
            self.last_timestamp = Some(timestamp);
        }
        self.update(z);
        Point3::from(self.position().cast::<f32>())
    }

    fn predict(&mut self, dt: f64) {
        let mut f = Matrix6::identity();
        f.fixed_view_mut::<3, 3>(0, 3).fill_diagonal(dt);

        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise;
    }

    fn update(&mut self, measurement: Vector3<f64>) {
        // H observes position only
        let mut h = Matrix3x6::<f64>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h[(2, 2)] = 1.0;

        let y = measurement - (h * self.state);
        let s = h * self.covariance * h.transpose() + self.measurement_noise;
        let Some(s_inv) = s.try_inverse() else {
            return;
        };
        let k = self.covariance * h.transpose() * s_inv;

        self.state += k * y;
        self.covariance = (Matrix6::identity() - k * h) * self.covariance;
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.state[0], self.state[1], self.state[2])
    }
}
