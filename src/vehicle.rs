use nalgebra::{UnitQuaternion, Vector3, Vector4};

/// Estimated state of the vehicle at one control tick.
///
/// Produced by an external estimator; the controller only ever reads it.
///
/// # Fields
///
/// * `position` - Position in the world frame, NED (m)
/// * `velocity` - Velocity in the world frame, NED (m/s)
/// * `attitude` - Rotation from body frame to world frame
/// * `body_rate` - Angular velocity [p, q, r] in the body frame (rad/s)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub attitude: UnitQuaternion<f64>,
    pub body_rate: Vector3<f64>,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            attitude: UnitQuaternion::identity(),
            body_rate: Vector3::zeros(),
        }
    }
}

impl VehicleState {
    /// Heading in radians (ZYX Euler convention).
    pub fn yaw(&self) -> f64 {
        yaw_of(&self.attitude)
    }
}

/// One sample of the desired trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryPoint {
    /// Time this point is scheduled for (s)
    pub time: f64,
    /// Desired position, NED (m)
    pub position: Vector3<f64>,
    /// Desired velocity, NED (m/s)
    pub velocity: Vector3<f64>,
    /// Feed-forward acceleration, NED (m/s²)
    pub acceleration: Vector3<f64>,
    /// Desired attitude; only its yaw is tracked
    pub attitude: UnitQuaternion<f64>,
}

impl Default for TrajectoryPoint {
    fn default() -> Self {
        Self {
            time: 0.0,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            attitude: UnitQuaternion::identity(),
        }
    }
}

impl TrajectoryPoint {
    /// A stationary point at `position` facing `yaw`.
    pub fn hover(time: f64, position: Vector3<f64>, yaw: f64) -> Self {
        Self {
            time,
            position,
            attitude: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
            ..Self::default()
        }
    }

    pub fn yaw(&self) -> f64 {
        yaw_of(&self.attitude)
    }
}

/// Individual motor thrusts in Newtons.
///
/// Ordered front-left, front-right, rear-left, rear-right.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleCommand {
    pub desired_thrusts: Vector4<f64>,
}

impl VehicleCommand {
    pub const FRONT_LEFT: usize = 0;
    pub const FRONT_RIGHT: usize = 1;
    pub const REAR_LEFT: usize = 2;
    pub const REAR_RIGHT: usize = 3;

    pub fn new(front_left: f64, front_right: f64, rear_left: f64, rear_right: f64) -> Self {
        Self {
            desired_thrusts: Vector4::new(front_left, front_right, rear_left, rear_right),
        }
    }

    /// Sum of all four motor thrusts (N).
    pub fn collective_thrust(&self) -> f64 {
        self.desired_thrusts.sum()
    }
}

/// Time-ordered list of trajectory points.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-point trajectory holding `position` and `yaw` forever.
    pub fn hover(position: Vector3<f64>, yaw: f64) -> Self {
        Self {
            points: vec![TrajectoryPoint::hover(0.0, position, yaw)],
        }
    }

    /// Appends a point. Points must be pushed in non-decreasing time order.
    pub fn push(&mut self, point: TrajectoryPoint) {
        debug_assert!(
            self.points.last().map_or(true, |last| last.time <= point.time),
            "trajectory points must be time ordered"
        );
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point to track at `time`.
    ///
    /// Returns the first point scheduled at or after `time`, the last point
    /// once the trajectory has run out, and a default hover at the origin for
    /// an empty trajectory.
    pub fn point_at(&self, time: f64) -> TrajectoryPoint {
        let idx = self.points.partition_point(|p| p.time < time);
        self.points
            .get(idx)
            .or_else(|| self.points.last())
            .copied()
            .unwrap_or_default()
    }
}

/// What the control cascade needs from the vehicle it is flying.
///
/// Estimation and trajectory generation live behind this trait; the
/// controller only reads a state snapshot and asks for the point to track.
pub trait FlightContext {
    fn estimated_state(&self) -> &VehicleState;

    fn trajectory_point(&mut self, time: f64) -> TrajectoryPoint;
}

/// A vehicle following a precomputed [`Trajectory`].
#[derive(Clone, Debug, Default)]
pub struct Vehicle {
    pub state: VehicleState,
    pub trajectory: Trajectory,
    /// Most recent point handed to the controller
    pub current_point: TrajectoryPoint,
}

impl Vehicle {
    pub fn new(state: VehicleState, trajectory: Trajectory) -> Self {
        Self {
            state,
            trajectory,
            current_point: TrajectoryPoint::default(),
        }
    }

    /// Replaces the state snapshot with a fresh estimate.
    pub fn update_estimate(&mut self, state: VehicleState) {
        self.state = state;
    }
}

impl FlightContext for Vehicle {
    fn estimated_state(&self) -> &VehicleState {
        &self.state
    }

    fn trajectory_point(&mut self, time: f64) -> TrajectoryPoint {
        self.current_point = self.trajectory.point_at(time);
        self.current_point
    }
}

/// Extract yaw angle from quaternion (ZYX Euler convention)
fn yaw_of(attitude: &UnitQuaternion<f64>) -> f64 {
    attitude.euler_angles().2
}
