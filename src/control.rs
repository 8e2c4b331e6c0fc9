use std::f64::consts::{PI, SQRT_2, TAU};

use log::{info, trace};
use nalgebra::{Matrix2, Matrix4, UnitQuaternion, Vector2, Vector3, Vector4};

use crate::error::ParamResult;
use crate::params::{ControlParameters, ParameterProvider};
use crate::vehicle::{FlightContext, TrajectoryPoint, VehicleCommand, VehicleState};
use crate::GRAVITY;

/// A cascaded controller for quadcopter flight.
///
/// Each tick runs, strictly in this order:
/// 1. Altitude control - collective thrust from the vertical trajectory
/// 2. Lateral position control - horizontal acceleration command
/// 3. Roll/pitch control - body rates that tilt the thrust vector
/// 4. Yaw control - yaw rate from the heading error
/// 5. Body rate control - 3-axis moment
/// 6. Motor mixing - four motor thrusts
///
/// ```text
/// point.z   ─▶ altitude ─▶ thrust ─────┬──────────────────────────▶ mixer
///                                      ▼                              ▲
/// point.xy  ─▶ lateral  ─▶ accel ─▶ roll/pitch ─▶ p, q ─┐             │
/// point.yaw ─▶ yaw ──────────────────────────────▶ r ───┴▶ body rate ─┘
/// ```
///
/// The world frame is NED: `z` grows downwards and thrust acts along the
/// body's `-z` axis.
///
/// The only state carried between ticks is the integrated altitude error.
/// Ticks take `&mut self`, so calls on one controller are serialized.
///
/// # Operational limits
///
/// Roll/pitch and altitude control divide by `R33`, the world-z component of
/// the body z axis. Near 90° of tilt these outputs diverge; the vehicle must
/// not be flown in that regime. The altitude integrator has no anti-windup
/// beyond the vertical acceleration clamp.
#[derive(Clone, Debug)]
pub struct QuadControl {
    params: ControlParameters,
    /// Accumulated altitude error for integral control (m⋅s)
    integrated_altitude_error: f64,
}

impl QuadControl {
    /// Creates a controller with a zeroed integrator.
    pub fn new(params: ControlParameters) -> Self {
        Self {
            params,
            integrated_altitude_error: 0.0,
        }
    }

    /// Loads and validates parameters from `provider` under `section`.
    pub fn from_provider(provider: &dyn ParameterProvider, section: &str) -> ParamResult<Self> {
        Ok(Self::new(ControlParameters::from_provider(provider, section)?))
    }

    pub fn params(&self) -> &ControlParameters {
        &self.params
    }

    pub fn integrated_altitude_error(&self) -> f64 {
        self.integrated_altitude_error
    }

    /// Re-initializes the controller, clearing the altitude integrator.
    pub fn reset(&mut self) {
        info!(
            "resetting altitude integrator (was {:.4})",
            self.integrated_altitude_error
        );
        self.integrated_altitude_error = 0.0;
    }

    /// Converts collective thrust and moment commands to individual motor thrusts.
    ///
    /// # Motor Configuration (X-frame, viewed from above)
    ///
    /// ```text
    ///   f0 (front left)   f1 (front right)
    ///            \  +X  /
    ///             \    /
    ///              \  /  → +Y
    ///              /  \
    ///             /    \
    ///   f2 (rear left)    f3 (rear right)
    /// ```
    ///
    /// With `l = L/√2` the forward model is
    ///
    /// ```text
    /// c     =  f0 + f1 + f2 + f3
    /// τx/l  =  f0 - f1 + f2 - f3
    /// τy/l  =  f0 + f1 - f2 - f3
    /// τz/κ  = -f0 + f1 + f2 - f3
    /// ```
    ///
    /// whose matrix is its own inverse up to a factor of 4, so the inverse is
    /// applied in closed form. No clamping happens here.
    pub fn generate_motor_commands(
        &self,
        coll_thrust_cmd: f64,
        moment_cmd: Vector3<f64>,
    ) -> VehicleCommand {
        let l = self.params.arm_length / SQRT_2;

        let c = Vector4::new(
            coll_thrust_cmd,
            moment_cmd.x / l,
            moment_cmd.y / l,
            moment_cmd.z / self.params.kappa,
        );

        #[rustfmt::skip]
        let inverse = Matrix4::new(
            1.0,  1.0,  1.0, -1.0,
            1.0, -1.0,  1.0,  1.0,
            1.0,  1.0, -1.0,  1.0,
            1.0, -1.0, -1.0, -1.0,
        ) * 0.25;

        VehicleCommand {
            desired_thrusts: inverse * c,
        }
    }

    /// Forward allocation: collective thrust (N) and moment (N⋅m) produced by
    /// a set of motor thrusts. Undoes [`generate_motor_commands`](Self::generate_motor_commands).
    pub fn thrust_and_moment(&self, cmd: &VehicleCommand) -> (f64, Vector3<f64>) {
        let f = &cmd.desired_thrusts;
        let fl = f[VehicleCommand::FRONT_LEFT];
        let fr = f[VehicleCommand::FRONT_RIGHT];
        let rl = f[VehicleCommand::REAR_LEFT];
        let rr = f[VehicleCommand::REAR_RIGHT];
        let l = self.params.arm_length / SQRT_2;

        let moment = Vector3::new(
            (fl - fr + rl - rr) * l,
            (fl + fr - rl - rr) * l,
            (-fl + fr + rl - rr) * self.params.kappa,
        );
        (cmd.collective_thrust(), moment)
    }

    /// Calculates desired 3-axis moments from body rate commands and measurements.
    ///
    /// M = I ⊙ Kp ⊙ (ωcmd - ω), elementwise per body axis.
    pub fn body_rate_control(&self, pqr_cmd: Vector3<f64>, pqr: Vector3<f64>) -> Vector3<f64> {
        let pqr_err = pqr_cmd - pqr;
        self.params
            .inertia
            .component_mul(&self.params.kp_pqr)
            .component_mul(&pqr_err)
    }

    /// Calculates desired roll and pitch rates from a horizontal acceleration command.
    ///
    /// The commanded acceleration fixes where the thrust vector must point:
    /// its horizontal direction cosines `b = (R13, R23)` are driven towards
    /// `accel / c`, with `c = -thrust / mass`, and the resulting tilt rate is
    /// mapped back to body rates through the rotation kinematics.
    ///
    /// # Arguments
    ///
    /// * `accel_cmd` - Desired acceleration in m/s² (world frame, z ignored)
    /// * `attitude` - Current attitude (body to world)
    /// * `coll_thrust_cmd` - Collective thrust command in N
    ///
    /// # Returns
    ///
    /// Desired body rates [p, q, 0] in rad/s
    pub fn roll_pitch_control(
        &self,
        accel_cmd: Vector3<f64>,
        attitude: &UnitQuaternion<f64>,
        coll_thrust_cmd: f64,
    ) -> Vector3<f64> {
        let rotation = attitude.to_rotation_matrix();
        let r = rotation.matrix();

        let b = Vector2::new(r[(0, 2)], r[(1, 2)]);

        let c = -coll_thrust_cmd / self.params.mass;
        let max_tilt = self.params.max_tilt_angle;
        let b_cmd = (accel_cmd.xy() / c).map(|v| v.clamp(-max_tilt, max_tilt));

        let b_cmd_dot = self.params.kp_bank * (b_cmd - b);

        #[rustfmt::skip]
        let kinematics = Matrix2::new(
            r[(1, 0)], -r[(0, 0)],
            r[(1, 1)], -r[(0, 1)],
        ) / r[(2, 2)];
        let pq_cmd = kinematics * b_cmd_dot;

        Vector3::new(pq_cmd.x, pq_cmd.y, 0.0)
    }

    /// Calculates desired yaw rate from yaw angle command and current yaw.
    ///
    /// The error is taken the short way round, in (-π, π], so crossing the
    /// ±π seam never spins the vehicle through a full turn.
    pub fn yaw_control(&self, yaw_cmd: f64, yaw: f64) -> f64 {
        let yaw_cmd = yaw_cmd.rem_euclid(TAU);
        self.params.kp_yaw * wrap_angle(yaw_cmd - yaw)
    }

    /// Calculates the collective thrust needed to track the vertical trajectory.
    ///
    /// PID on altitude with velocity and acceleration feed-forward:
    /// 1. velocity command limited to [-max_ascent_rate, max_descent_rate]
    /// 2. position error integrated into the persistent integrator
    /// 3. acceleration limited to [-max_ascent_rate/dt, max_descent_rate/dt]
    /// 4. acceleration projected onto the thrust axis through `R33`
    ///
    /// # Arguments
    ///
    /// * `pos_z_cmd`, `vel_z_cmd` - Desired vertical position (m) and velocity (m/s), NED
    /// * `pos_z`, `vel_z` - Current vertical position and velocity, NED
    /// * `attitude` - Current attitude (body to world)
    /// * `accel_z_cmd` - Feed-forward vertical acceleration (m/s²), NED
    /// * `dt` - Tick duration (s)
    ///
    /// # Returns
    ///
    /// Collective thrust command in N, positive along body -z
    #[allow(clippy::too_many_arguments)]
    pub fn altitude_control(
        &mut self,
        pos_z_cmd: f64,
        vel_z_cmd: f64,
        pos_z: f64,
        vel_z: f64,
        attitude: &UnitQuaternion<f64>,
        accel_z_cmd: f64,
        dt: f64,
    ) -> f64 {
        let p = &self.params;
        let r33 = attitude.to_rotation_matrix()[(2, 2)];

        let vel_z_cmd = vel_z_cmd.clamp(-p.max_ascent_rate, p.max_descent_rate);

        let pos_z_err = pos_z_cmd - pos_z;
        let vel_z_err = vel_z_cmd - vel_z;
        self.integrated_altitude_error += pos_z_err * dt;

        let p_term = p.kp_pos_z * pos_z_err;
        let d_term = p.kp_vel_z * vel_z_err;
        let i_term = p.ki_pos_z * self.integrated_altitude_error;

        let mut accel = accel_z_cmd + p_term + d_term + i_term;
        // A zero-length tick puts no bound on the acceleration
        if dt > 0.0 {
            accel = accel.clamp(-p.max_ascent_rate / dt, p.max_descent_rate / dt);
        }

        -p.mass * (accel - GRAVITY) / r33
    }

    /// Calculates desired horizontal acceleration from position and velocity commands.
    ///
    /// a = a_ff + Kp_pos (pos_cmd - pos) + Kp_vel (vel_cmd - vel)
    ///
    /// All z components are dropped so this loop never fights altitude
    /// control. The velocity command and the resulting acceleration are
    /// limited in horizontal magnitude by uniform rescaling, which keeps
    /// their direction.
    ///
    /// # Returns
    ///
    /// Desired acceleration [ax, ay, 0] in m/s² (world frame)
    pub fn lateral_position_control(
        &self,
        mut pos_cmd: Vector3<f64>,
        mut vel_cmd: Vector3<f64>,
        pos: Vector3<f64>,
        mut vel: Vector3<f64>,
        mut accel_cmd_ff: Vector3<f64>,
    ) -> Vector3<f64> {
        accel_cmd_ff.z = 0.0;
        vel_cmd.z = 0.0;
        vel.z = 0.0;
        pos_cmd.z = pos.z;

        let vel_cmd = limit_xy(vel_cmd, self.params.max_speed_xy);

        let pos_err = pos_cmd - pos;
        let vel_err = vel_cmd - vel;
        let accel_cmd =
            accel_cmd_ff + self.params.kp_pos_xy * pos_err + self.params.kp_vel_xy * vel_err;

        limit_xy(accel_cmd, self.params.max_accel_xy)
    }

    /// Runs one control tick against `vehicle`.
    ///
    /// Fetches the trajectory point for `time`, then runs the cascade on the
    /// vehicle's current state estimate.
    pub fn run_control(
        &mut self,
        vehicle: &mut impl FlightContext,
        dt: f64,
        time: f64,
    ) -> VehicleCommand {
        let point = vehicle.trajectory_point(time);
        self.step(&point, vehicle.estimated_state(), dt)
    }

    /// Runs the cascade for an already fetched trajectory point.
    pub fn step(
        &mut self,
        point: &TrajectoryPoint,
        state: &VehicleState,
        dt: f64,
    ) -> VehicleCommand {
        let mut thrust = self.altitude_control(
            point.position.z,
            point.velocity.z,
            state.position.z,
            state.velocity.z,
            &state.attitude,
            point.acceleration.z,
            dt,
        );

        // Reserve some thrust margin for attitude control
        let (min, max) = (self.params.min_motor_thrust, self.params.max_motor_thrust);
        let margin = 0.1 * (max - min);
        thrust = thrust.clamp((min + margin) * 4.0, (max - margin) * 4.0);

        let des_acc = self.lateral_position_control(
            point.position,
            point.velocity,
            state.position,
            state.velocity,
            point.acceleration,
        );

        let mut des_omega = self.roll_pitch_control(des_acc, &state.attitude, thrust);
        des_omega.z = self.yaw_control(point.yaw(), state.yaw());

        let des_moment = self.body_rate_control(des_omega, state.body_rate);

        let cmd = self.generate_motor_commands(thrust, des_moment);
        trace!(
            "t={:.3} thrust={:.3} moment={:?} motors={:?}",
            point.time,
            thrust,
            des_moment.as_slice(),
            cmd.desired_thrusts.as_slice()
        );
        cmd
    }
}

/// Wraps an angle into (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    PI - (PI - angle).rem_euclid(TAU)
}

/// Rescales `v` so its horizontal magnitude does not exceed `max`.
fn limit_xy(v: Vector3<f64>, max: f64) -> Vector3<f64> {
    let mag = v.xy().norm();
    if mag > max {
        v * (max / mag)
    } else {
        v
    }
}
