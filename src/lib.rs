//! # quad-control
//!
//! Cascaded feedback controller for a quadrotor. Once per tick it turns a
//! desired trajectory point and the estimated vehicle state into four motor
//! thrusts:
//!
//! ```text
//! trajectory ─▶ altitude ─▶ lateral position ─▶ roll/pitch ─┐
//!                                       yaw ──────────────────┤
//!                                                             ▼
//!                                      body rate ─▶ motor mixer ─▶ command
//! ```
//!
//! - [`control`]: the control cascade ([`QuadControl`])
//! - [`params`]: gains, limits and physical constants, plus the
//!   [`ParameterProvider`] implementations they are loaded from
//! - [`vehicle`]: state, trajectory and command types and the
//!   [`FlightContext`] the cascade reads each tick
//!
//! All vectors are in a north-east-down world frame unless stated otherwise.

pub mod control;
pub mod error;
pub mod params;
pub mod vehicle;

pub use control::QuadControl;
pub use error::{ParamError, ParamResult};
pub use params::{ControlParameters, ParamStore, ParameterProvider, SimpleConfig};
pub use vehicle::{
    FlightContext, Trajectory, TrajectoryPoint, Vehicle, VehicleCommand, VehicleState,
};

/// Gravitational acceleration magnitude [m/s²]
pub const GRAVITY: f64 = 9.81;
