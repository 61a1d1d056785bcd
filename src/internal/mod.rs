//! Internal numeric building blocks.
//!
//! - kalman: fixed-size constant-velocity Kalman filter with variable time step

pub mod kalman;
