//! Rigid-body quadrotor model used to close the loop around the controller.
//!
//! NED world frame, thrust along body -z, Euler angles in ZYX order.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use quad_control::{QuadControl, VehicleCommand, VehicleState, GRAVITY};

/// Physical constants of the simulated airframe.
#[derive(Clone, Copy)]
pub struct Consts {
    pub mass: f64,
    pub inertia: Vector3<f64>,
}

/// [pos(3), vel(3), roll, pitch, yaw, p, q, r]
#[derive(Clone, Copy, Debug, Default)]
pub struct State {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub body_rate: Vector3<f64>,
}

impl State {
    pub fn to_array(&self) -> [f64; 12] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.roll,
            self.pitch,
            self.yaw,
            self.body_rate.x,
            self.body_rate.y,
            self.body_rate.z,
        ]
    }

    pub fn from_array(arr: &[f64; 12]) -> Self {
        State {
            position: Vector3::new(arr[0], arr[1], arr[2]),
            velocity: Vector3::new(arr[3], arr[4], arr[5]),
            roll: arr[6],
            pitch: arr[7],
            yaw: arr[8],
            body_rate: Vector3::new(arr[9], arr[10], arr[11]),
        }
    }

    /// What a perfect estimator would report.
    pub fn estimate(&self) -> VehicleState {
        VehicleState {
            position: self.position,
            velocity: self.velocity,
            attitude: UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw),
            body_rate: self.body_rate,
        }
    }
}

struct QuadOde {
    consts: Consts,
    thrust: f64,
    torques: Vector3<f64>,
}

impl fast_ode::DifferentialEquation<12> for QuadOde {
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<12>) -> (fast_ode::Coord<12>, bool) {
        let s = y.0;

        let (phi, theta, psi) = (s[6], s[7], s[8]);
        let (p, q, r) = (s[9], s[10], s[11]);

        let (sin_phi, cos_phi) = phi.sin_cos();
        let cos_theta = theta.cos();
        let tan_theta = theta.tan();

        // Body to world, R = Rz(ψ) * Ry(θ) * Rx(φ)
        let rot = Rotation3::from_euler_angles(phi, theta, psi);
        let accel = rot * Vector3::new(0.0, 0.0, -self.thrust / self.consts.mass)
            + Vector3::new(0.0, 0.0, GRAVITY);

        let mut dot_y = [0.0; 12];

        dot_y[0] = s[3];
        dot_y[1] = s[4];
        dot_y[2] = s[5];

        dot_y[3] = accel.x;
        dot_y[4] = accel.y;
        dot_y[5] = accel.z;

        // Euler angle rates from body rates
        dot_y[6] = p + q * sin_phi * tan_theta + r * cos_phi * tan_theta;
        dot_y[7] = q * cos_phi - r * sin_phi;
        dot_y[8] = (q * sin_phi + r * cos_phi) / cos_theta;

        // Euler's equations
        let i = self.consts.inertia;
        let tau = self.torques;
        dot_y[9] = (tau.x + (i.y - i.z) * q * r) / i.x;
        dot_y[10] = (tau.y + (i.z - i.x) * r * p) / i.y;
        dot_y[11] = (tau.z + (i.x - i.y) * p * q) / i.z;

        (fast_ode::Coord(dot_y), true)
    }
}

/// Applies `cmd` for `dt` seconds, starting at `t`.
pub fn simulate(
    ctrl: &QuadControl,
    consts: Consts,
    state: State,
    cmd: &VehicleCommand,
    t: f64,
    dt: f64,
) -> State {
    let (thrust, torques) = ctrl.thrust_and_moment(cmd);
    let ode = QuadOde {
        consts,
        thrust,
        torques,
    };

    let result = fast_ode::solve_ivp(
        &ode,
        (t, t + dt),
        fast_ode::Coord(state.to_array()),
        |_, _| true,
        1e-8,
        1e-7,
    );

    match result {
        fast_ode::IvpResult::FinalTimeReached(final_coord) => State::from_array(&final_coord.0),
        _ => panic!("integration failed at t={t}"),
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
