//! Kinematic State Tracking
//!
//! The shared motion model embedded by every tracked entity variant:
//! a timestamped position sample, per-axis velocities, scalar motion
//! speed and acceleration, the lifecycle state, and a bounded history
//! of past samples (the path).
//!
//! Velocity and acceleration are derived by numeric differentiation
//! against the most recent path sample when the sender does not supply
//! them:
//!
//! ```text
//! v_axis       = Δposition_axis / Δt
//! motion_speed = |Δposition| / Δt
//! motion_accel = (motion_speed - previous_motion_speed) / Δt
//! ```
//!
//! Coordinates are in the normalized TUIO space (each axis nominally
//! in [0,1] for 2D profiles); angles elsewhere in the model are radians.

use std::collections::VecDeque;
use std::time::Duration;

use crate::model::state::TuioState;

/// Protocol-assigned unique identifier for a tracked entity's lifetime.
pub type SessionId = i64;

/// Default bound on the per-entity path history.
pub const DEFAULT_PATH_CAPACITY: usize = 128;

/// A point in time relative to the start of the client session,
/// with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TuioTime(Duration);

impl TuioTime {
    /// The session start instant.
    pub const ZERO: TuioTime = TuioTime(Duration::ZERO);

    /// Wrap a duration since session start.
    pub fn from_duration(elapsed: Duration) -> Self {
        TuioTime(elapsed)
    }

    /// Build a time stamp from whole milliseconds since session start.
    pub fn from_millis(millis: u64) -> Self {
        TuioTime(Duration::from_millis(millis))
    }

    /// Milliseconds elapsed since session start.
    pub fn total_millis(&self) -> u64 {
        self.0.as_millis() as u64
    }

    /// Seconds elapsed since session start.
    pub fn as_secs_f32(&self) -> f32 {
        self.0.as_secs_f32()
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn since(&self, earlier: TuioTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// A single timestamped position sample.
///
/// 2D profiles carry `z == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Session time stamp of the sample
    pub time: TuioTime,
    /// Normalized X coordinate
    pub x: f32,
    /// Normalized Y coordinate
    pub y: f32,
    /// Normalized Z coordinate (0 for 2D profiles)
    pub z: f32,
}

impl Sample {
    /// Create a sample.
    pub fn new(time: TuioTime, x: f32, y: f32, z: f32) -> Self {
        Sample { time, x, y, z }
    }

    /// Euclidean distance to the given coordinates.
    pub fn distance_to(&self, x: f32, y: f32, z: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        let dz = self.z - z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Wrap a fractional-turn angular delta onto the shortest path.
///
/// A raw delta beyond three quarters of a turn is interpreted as the
/// angle having crossed its 0/2π boundary, so one full turn is added
/// or removed. Keeps a 350°→10° step from reading as a large negative
/// rotation.
pub(crate) fn wrap_turns(delta_turns: f32) -> f32 {
    if delta_turns > 0.75 {
        delta_turns - 1.0
    } else if delta_turns < -0.75 {
        delta_turns + 1.0
    } else {
        delta_turns
    }
}

/// The motion state shared by all tracked entity variants.
#[derive(Debug, Clone)]
pub struct KinematicState {
    session_id: SessionId,
    sample: Sample,
    x_speed: f32,
    y_speed: f32,
    z_speed: f32,
    motion_speed: f32,
    motion_accel: f32,
    state: TuioState,
    path: VecDeque<Sample>,
    path_capacity: usize,
}

impl KinematicState {
    /// Create the state for a freshly observed entity.
    ///
    /// All derivatives start at zero and the lifecycle state is
    /// [`TuioState::Added`]. The path starts with the initial sample.
    pub(crate) fn new(
        time: TuioTime,
        session_id: SessionId,
        x: f32,
        y: f32,
        z: f32,
        path_capacity: usize,
    ) -> Self {
        let sample = Sample::new(time, x, y, z);
        let mut path = VecDeque::with_capacity(path_capacity.min(32));
        path.push_back(sample);
        KinematicState {
            session_id,
            sample,
            x_speed: 0.0,
            y_speed: 0.0,
            z_speed: 0.0,
            motion_speed: 0.0,
            motion_accel: 0.0,
            state: TuioState::Added,
            path,
            path_capacity: path_capacity.max(1),
        }
    }

    /// Session ID of this entity.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The current sample.
    pub fn sample(&self) -> Sample {
        self.sample
    }

    /// Session time of the current sample.
    pub fn time(&self) -> TuioTime {
        self.sample.time
    }

    /// X velocity.
    pub fn x_speed(&self) -> f32 {
        self.x_speed
    }

    /// Y velocity.
    pub fn y_speed(&self) -> f32 {
        self.y_speed
    }

    /// Z velocity (0 for 2D profiles).
    pub fn z_speed(&self) -> f32 {
        self.z_speed
    }

    /// Scalar motion speed.
    pub fn motion_speed(&self) -> f32 {
        self.motion_speed
    }

    /// Motion acceleration.
    pub fn motion_accel(&self) -> f32 {
        self.motion_accel
    }

    /// Lifecycle state.
    pub fn state(&self) -> TuioState {
        self.state
    }

    /// The bounded history of samples, most recent last.
    pub fn path(&self) -> &VecDeque<Sample> {
        &self.path
    }

    pub(crate) fn set_state(&mut self, state: TuioState) {
        self.state = state;
    }

    /// Most recent committed sample, used as the differentiation base.
    pub(crate) fn last_sample(&self) -> Sample {
        self.path.back().copied().unwrap_or(self.sample)
    }

    fn push_path(&mut self, sample: Sample) {
        while self.path.len() >= self.path_capacity {
            self.path.pop_front();
        }
        self.path.push_back(sample);
    }

    /// Position-only update: velocity and acceleration are derived by
    /// differentiation against the last path sample.
    pub(crate) fn update_derived(&mut self, time: TuioTime, x: f32, y: f32, z: f32) {
        let last = self.last_sample();
        self.sample = Sample::new(time, x, y, z);

        let dt = time.since(last.time).as_secs_f32();
        if dt > 0.0 {
            let dx = x - last.x;
            let dy = y - last.y;
            let dz = z - last.z;
            let dist = (dx * dx + dy * dy + dz * dz).sqrt();
            let last_motion_speed = self.motion_speed;

            self.x_speed = dx / dt;
            self.y_speed = dy / dt;
            self.z_speed = dz / dt;
            self.motion_speed = dist / dt;
            self.motion_accel = (self.motion_speed - last_motion_speed) / dt;
        }

        self.push_path(self.sample);
        self.state = TuioState::from_motion_accel(self.motion_accel);
    }

    /// Full update with sender-supplied velocities and acceleration.
    pub(crate) fn update_raw(
        &mut self,
        time: TuioTime,
        x: f32,
        y: f32,
        z: f32,
        x_speed: f32,
        y_speed: f32,
        z_speed: f32,
        motion_accel: f32,
    ) {
        self.sample = Sample::new(time, x, y, z);
        self.apply_speeds(x_speed, y_speed, z_speed, motion_accel);
    }

    /// Staging variant of [`update_raw`]: the time stamp is left unchanged.
    ///
    /// [`update_raw`]: KinematicState::update_raw
    pub(crate) fn apply_raw(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        x_speed: f32,
        y_speed: f32,
        z_speed: f32,
        motion_accel: f32,
    ) {
        self.sample = Sample::new(self.sample.time, x, y, z);
        self.apply_speeds(x_speed, y_speed, z_speed, motion_accel);
    }

    fn apply_speeds(&mut self, x_speed: f32, y_speed: f32, z_speed: f32, motion_accel: f32) {
        self.x_speed = x_speed;
        self.y_speed = y_speed;
        self.z_speed = z_speed;
        self.motion_speed = (x_speed * x_speed + y_speed * y_speed + z_speed * z_speed).sqrt();
        self.motion_accel = motion_accel;
        self.push_path(self.sample);
        self.state = TuioState::from_motion_accel(motion_accel);
    }

    /// Stamp the removal time and mark the entity removed.
    pub(crate) fn mark_removed(&mut self, time: TuioTime) {
        self.sample.time = time;
        self.state = TuioState::Removed;
    }
}
