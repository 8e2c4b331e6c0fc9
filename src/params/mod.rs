//! Controller gains, limits and physical constants
//!
//! Parameters are read once, through a [`ParameterProvider`], before the
//! first control tick. Two providers are available:
//! - [`SimpleConfig`]: the simulator's text key/value files
//! - [`ParamStore`]: a flat hardware-style parameter table

mod param_store;
mod simple_config;

pub use param_store::ParamStore;
pub use simple_config::SimpleConfig;

use log::{debug, info};
use nalgebra::Vector3;

use crate::error::{ParamError, ParamResult};

/// Key/value source for controller parameters.
///
/// Lookups never fail: a missing key yields `default`.
pub trait ParameterProvider {
    /// Value stored under `key`, if any.
    fn find(&self, key: &str) -> Option<f64>;

    fn get(&self, key: &str, default: f64) -> f64 {
        self.find(key).unwrap_or(default)
    }

    /// Reads a 3-vector. The default implementation looks up the
    /// components as `key.x`, `key.y` and `key.z`.
    fn get_vector(&self, key: &str, default: Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            self.get(&format!("{key}.x"), default.x),
            self.get(&format!("{key}.y"), default.y),
            self.get(&format!("{key}.z"), default.z),
        )
    }
}

/// Everything the control cascade is tuned with.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlParameters {
    // Physical constants
    /// Total vehicle mass (kg)
    pub mass: f64,
    /// Distance from the vehicle centre to each motor (m)
    pub arm_length: f64,
    /// Rotor drag torque to thrust ratio (m)
    pub kappa: f64,
    /// Moments of inertia about body x, y, z (kg⋅m²)
    pub inertia: Vector3<f64>,

    // Gains
    pub kp_pos_xy: f64,
    pub kp_pos_z: f64,
    pub ki_pos_z: f64,
    pub kp_vel_xy: f64,
    pub kp_vel_z: f64,
    pub kp_bank: f64,
    pub kp_yaw: f64,
    /// Body rate gains [p, q, r]
    pub kp_pqr: Vector3<f64>,

    // Limits
    /// Maximum climb speed, non-negative (m/s)
    pub max_ascent_rate: f64,
    /// Maximum sink speed, non-negative (m/s)
    pub max_descent_rate: f64,
    /// Maximum horizontal speed (m/s)
    pub max_speed_xy: f64,
    /// Maximum horizontal acceleration (m/s²)
    pub max_accel_xy: f64,
    /// Limit on each tilt vector component
    pub max_tilt_angle: f64,
    /// Per-motor thrust range (N)
    pub min_motor_thrust: f64,
    pub max_motor_thrust: f64,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            mass: 1.0,
            arm_length: 0.1,
            kappa: 0.01,
            inertia: Vector3::new(1.0, 1.0, 1.0),
            kp_pos_xy: 0.0,
            kp_pos_z: 0.0,
            ki_pos_z: 0.0,
            kp_vel_xy: 0.0,
            kp_vel_z: 0.0,
            kp_bank: 0.0,
            kp_yaw: 0.0,
            kp_pqr: Vector3::zeros(),
            max_ascent_rate: 100.0,
            max_descent_rate: 100.0,
            max_speed_xy: 100.0,
            max_accel_xy: 100.0,
            max_tilt_angle: 100.0,
            min_motor_thrust: 0.0,
            max_motor_thrust: 100.0,
        }
    }
}

impl ControlParameters {
    /// Reads every parameter under `section` (e.g. `"QuadControlParams"`)
    /// and validates the result.
    pub fn from_provider(provider: &dyn ParameterProvider, section: &str) -> ParamResult<Self> {
        let d = Self::default();
        let key = |name: &str| format!("{section}.{name}");
        let get = |name: &str, default: f64| {
            provider.find(&key(name)).unwrap_or_else(|| {
                debug!("{}: not set, using default {}", key(name), default);
                default
            })
        };

        let params = Self {
            mass: get("Mass", d.mass),
            arm_length: get("L", d.arm_length),
            kappa: get("kappa", d.kappa),
            inertia: Vector3::new(
                get("Ixx", d.inertia.x),
                get("Iyy", d.inertia.y),
                get("Izz", d.inertia.z),
            ),
            kp_pos_xy: get("kpPosXY", d.kp_pos_xy),
            kp_pos_z: get("kpPosZ", d.kp_pos_z),
            ki_pos_z: get("KiPosZ", d.ki_pos_z),
            kp_vel_xy: get("kpVelXY", d.kp_vel_xy),
            kp_vel_z: get("kpVelZ", d.kp_vel_z),
            kp_bank: get("kpBank", d.kp_bank),
            kp_yaw: get("kpYaw", d.kp_yaw),
            kp_pqr: provider.get_vector(&key("kpPQR"), d.kp_pqr),
            max_ascent_rate: get("maxAscentRate", d.max_ascent_rate),
            max_descent_rate: get("maxDescentRate", d.max_descent_rate),
            max_speed_xy: get("maxSpeedXY", d.max_speed_xy),
            max_accel_xy: get("maxHorizAccel", d.max_accel_xy),
            max_tilt_angle: get("maxTiltAngle", d.max_tilt_angle),
            min_motor_thrust: get("minMotorThrust", d.min_motor_thrust),
            max_motor_thrust: get("maxMotorThrust", d.max_motor_thrust),
        };

        params.validate()?;
        info!("loaded control parameters from [{section}]");
        Ok(params)
    }

    /// Rejects values the control law would divide by or cannot saturate with.
    pub fn validate(&self) -> ParamResult<()> {
        positive("Mass", self.mass)?;
        positive("L", self.arm_length)?;
        positive("kappa", self.kappa)?;
        positive("Ixx", self.inertia.x)?;
        positive("Iyy", self.inertia.y)?;
        positive("Izz", self.inertia.z)?;

        non_negative("maxAscentRate", self.max_ascent_rate)?;
        non_negative("maxDescentRate", self.max_descent_rate)?;
        non_negative("maxSpeedXY", self.max_speed_xy)?;
        non_negative("maxHorizAccel", self.max_accel_xy)?;
        non_negative("maxTiltAngle", self.max_tilt_angle)?;
        non_negative("minMotorThrust", self.min_motor_thrust)?;

        if !self.max_motor_thrust.is_finite() || self.max_motor_thrust <= self.min_motor_thrust {
            return Err(ParamError::Invalid {
                name: "maxMotorThrust",
                value: self.max_motor_thrust,
                reason: "must exceed minMotorThrust",
            });
        }
        Ok(())
    }

    /// Thrust needed to hold altitude while level (N).
    pub fn hover_thrust(&self) -> f64 {
        self.mass * crate::GRAVITY
    }
}

fn positive(name: &'static str, value: f64) -> ParamResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParamError::Invalid {
            name,
            value,
            reason: "must be positive and finite",
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> ParamResult<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ParamError::Invalid {
            name,
            value,
            reason: "must not be negative",
        })
    }
}
