//! Constant-velocity Kalman filter over a 4-channel box measurement.
//!
//! State layout is `[x, y, w, h, vx, vy, vw, vh]`, each rate expressed in
//! units per second. The transition matrix is rebuilt for every step from
//! the elapsed time, so irregular detection intervals are handled exactly.

use nalgebra::{Matrix4, SMatrix, SVector, Vector4};

use crate::{Error, Result};

/// Number of measured channels (x, y, width, height).
pub const DIM_Z: usize = 4;
/// Number of state entries (channels plus their rates).
pub const DIM_X: usize = DIM_Z * 2;

pub type StateVector = SVector<f64, DIM_X>;
pub type StateMatrix = SMatrix<f64, DIM_X, DIM_X>;
pub type ObservationMatrix = SMatrix<f64, DIM_Z, DIM_X>;

/// Kalman filter with a constant-velocity motion model.
#[derive(Clone, Debug)]
pub struct ConstantVelocityKalman {
    /// State vector
    pub x: StateVector,
    /// State covariance matrix
    pub p: StateMatrix,
    /// Measurement matrix (observes the first four states)
    pub h: ObservationMatrix,
    /// Measurement noise covariance
    pub r: Matrix4<f64>,
    /// Process noise spectral density (per channel)
    pub q: f64,
}

impl ConstantVelocityKalman {
    /// Create a filter positioned at `z` with zero velocity.
    ///
    /// # Arguments
    /// * `z` - Initial measurement
    /// * `r` - Measurement noise variance
    /// * `q` - Process noise spectral density
    /// * `pos_variance` - Initial variance of the measured channels
    /// * `vel_variance` - Initial variance of the rates
    pub fn new(z: &Vector4<f64>, r: f64, q: f64, pos_variance: f64, vel_variance: f64) -> Self {
        let mut x = StateVector::zeros();
        x.fixed_rows_mut::<DIM_Z>(0).copy_from(z);

        let mut p = StateMatrix::zeros();
        for i in 0..DIM_Z {
            p[(i, i)] = pos_variance;
            p[(DIM_Z + i, DIM_Z + i)] = vel_variance;
        }

        let mut h = ObservationMatrix::zeros();
        for i in 0..DIM_Z {
            h[(i, i)] = 1.0;
        }

        Self {
            x,
            p,
            h,
            r: Matrix4::identity() * r,
            q,
        }
    }

    /// State transition matrix for a step of `dt` seconds.
    ///
    /// ```text
    /// [I, dt*I]
    /// [0,    I]
    /// ```
    pub fn transition(dt: f64) -> StateMatrix {
        let mut f = StateMatrix::identity();
        for i in 0..DIM_Z {
            f[(i, DIM_Z + i)] = dt;
        }
        f
    }

    /// Continuous white-noise acceleration model discretized over `dt`.
    pub fn process_noise(&self, dt: f64) -> StateMatrix {
        let mut q = StateMatrix::zeros();
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        for i in 0..DIM_Z {
            let v = DIM_Z + i;
            q[(i, i)] = self.q * dt3 / 3.0;
            q[(i, v)] = self.q * dt2 / 2.0;
            q[(v, i)] = self.q * dt2 / 2.0;
            q[(v, v)] = self.q * dt;
        }
        q
    }

    /// Propagate state and covariance forward by `dt` seconds.
    pub fn predict(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let f = Self::transition(dt);
        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + self.process_noise(dt);
    }

    /// Extrapolated state `dt` seconds ahead; the filter itself is untouched.
    pub fn project(&self, dt: f64) -> StateVector {
        if dt <= 0.0 {
            return self.x;
        }
        Self::transition(dt) * self.x
    }

    /// Correct the state with measurement `z`.
    pub fn update(&mut self, z: &Vector4<f64>) -> Result<()> {
        // y = z - H @ x
        let y = z - self.h * self.x;

        // S = H @ P @ H.T + R
        let s = self.h * self.p * self.h.transpose() + self.r;
        let si = s.try_inverse().ok_or_else(|| {
            Error::EstimatorError("innovation covariance is singular".to_string())
        })?;

        // K = P @ H.T @ S^-1
        let k = self.p * self.h.transpose() * si;

        self.x += k * y;
        self.p = (StateMatrix::identity() - k * self.h) * self.p;
        Ok(())
    }

    /// Measured channels of the current state.
    pub fn position(&self) -> Vector4<f64> {
        self.x.fixed_rows::<DIM_Z>(0).into_owned()
    }

    /// Rates of the current state.
    pub fn velocity(&self) -> Vector4<f64> {
        self.x.fixed_rows::<DIM_Z>(DIM_Z).into_owned()
    }
}
