//! Tagged Object Entities
//!
//! Objects are tracked fiducial markers: next to the kinematic state
//! they carry a symbol ID (the marker identity, not unique per
//! instance) and rotation. The 2D variant has a single rotation angle,
//! the 3D variant three Euler angles. Angles are radians; angular
//! rates are in turns per second, as the protocol transmits them.

use std::f32::consts::{PI, TAU};

use crate::model::kinematics::{wrap_turns, KinematicState, TuioTime};
use crate::model::state::TuioState;
use crate::model::TuioContainer;

/// A tracked 2D object (`/tuio/2Dobj`).
#[derive(Debug, Clone)]
pub struct TuioObject {
    kinematics: KinematicState,
    symbol_id: i32,
    angle: f32,
    rotation_speed: f32,
    rotation_accel: f32,
}

impl TuioObject {
    pub(crate) fn new(
        time: TuioTime,
        session_id: i64,
        symbol_id: i32,
        x: f32,
        y: f32,
        angle: f32,
        path_capacity: usize,
    ) -> Self {
        TuioObject {
            kinematics: KinematicState::new(time, session_id, x, y, 0.0, path_capacity),
            symbol_id,
            angle,
            rotation_speed: 0.0,
            rotation_accel: 0.0,
        }
    }

    /// Symbol (marker) ID.
    pub fn symbol_id(&self) -> i32 {
        self.symbol_id
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Rotation angle in degrees.
    pub fn angle_degrees(&self) -> f32 {
        self.angle / PI * 180.0
    }

    /// Rotation speed in turns per second.
    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    /// Rotation acceleration.
    pub fn rotation_accel(&self) -> f32 {
        self.rotation_accel
    }

    /// Staging update carrying sender-supplied values; time stamp unchanged.
    pub(crate) fn apply_raw(
        &mut self,
        x: f32,
        y: f32,
        angle: f32,
        x_speed: f32,
        y_speed: f32,
        rotation_speed: f32,
        motion_accel: f32,
        rotation_accel: f32,
    ) {
        self.kinematics
            .apply_raw(x, y, 0.0, x_speed, y_speed, 0.0, motion_accel);
        self.angle = angle;
        self.rotation_speed = rotation_speed;
        self.rotation_accel = rotation_accel;
        self.refresh_rotating_state();
    }

    /// Committed update carrying sender-supplied values.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_raw(
        &mut self,
        time: TuioTime,
        x: f32,
        y: f32,
        angle: f32,
        x_speed: f32,
        y_speed: f32,
        rotation_speed: f32,
        motion_accel: f32,
        rotation_accel: f32,
    ) {
        self.kinematics
            .update_raw(time, x, y, 0.0, x_speed, y_speed, 0.0, motion_accel);
        self.angle = angle;
        self.rotation_speed = rotation_speed;
        self.rotation_accel = rotation_accel;
        self.refresh_rotating_state();
    }

    /// Committed update deriving all derivatives from the previous sample.
    pub(crate) fn update_derived(&mut self, time: TuioTime, x: f32, y: f32, angle: f32) {
        let last = self.kinematics.last_sample();
        self.kinematics.update_derived(time, x, y, 0.0);

        let dt = time.since(last.time).as_secs_f32();
        if dt > 0.0 {
            let da = wrap_turns((angle - self.angle) / TAU);
            let speed = da / dt;
            self.rotation_accel = (speed - self.rotation_speed) / dt;
            self.rotation_speed = speed;
        }
        self.angle = angle;
        self.refresh_rotating_state();
    }

    pub(crate) fn mark_removed(&mut self, time: TuioTime) {
        self.kinematics.mark_removed(time);
    }

    fn refresh_rotating_state(&mut self) {
        if self.rotation_accel != 0.0 && self.kinematics.state() != TuioState::Stopped {
            self.kinematics.set_state(TuioState::Rotating);
        }
    }
}

impl TuioContainer for TuioObject {
    fn kinematics(&self) -> &KinematicState {
        &self.kinematics
    }

    fn is_moving(&self) -> bool {
        matches!(
            self.state(),
            TuioState::Accelerating | TuioState::Decelerating | TuioState::Rotating
        )
    }
}

/// A tracked 3D object (`/tuio/3Dobj`) with three Euler angles.
#[derive(Debug, Clone)]
pub struct Tuio3DObject {
    kinematics: KinematicState,
    symbol_id: i32,
    angle_x: f32,
    angle_y: f32,
    angle_z: f32,
    rotation_speed_x: f32,
    rotation_speed_y: f32,
    rotation_speed_z: f32,
    rotation_accel: f32,
}

impl Tuio3DObject {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        time: TuioTime,
        session_id: i64,
        symbol_id: i32,
        x: f32,
        y: f32,
        z: f32,
        angle_x: f32,
        angle_y: f32,
        angle_z: f32,
        path_capacity: usize,
    ) -> Self {
        Tuio3DObject {
            kinematics: KinematicState::new(time, session_id, x, y, z, path_capacity),
            symbol_id,
            angle_x,
            angle_y,
            angle_z,
            rotation_speed_x: 0.0,
            rotation_speed_y: 0.0,
            rotation_speed_z: 0.0,
            rotation_accel: 0.0,
        }
    }

    /// Symbol (marker) ID.
    pub fn symbol_id(&self) -> i32 {
        self.symbol_id
    }

    /// Euler angle around X in radians.
    pub fn angle_x(&self) -> f32 {
        self.angle_x
    }

    /// Euler angle around Y in radians.
    pub fn angle_y(&self) -> f32 {
        self.angle_y
    }

    /// Euler angle around Z in radians.
    pub fn angle_z(&self) -> f32 {
        self.angle_z
    }

    /// Rotation speed around X in turns per second.
    pub fn rotation_speed_x(&self) -> f32 {
        self.rotation_speed_x
    }

    /// Rotation speed around Y in turns per second.
    pub fn rotation_speed_y(&self) -> f32 {
        self.rotation_speed_y
    }

    /// Rotation speed around Z in turns per second.
    pub fn rotation_speed_z(&self) -> f32 {
        self.rotation_speed_z
    }

    /// Combined rotation acceleration.
    pub fn rotation_accel(&self) -> f32 {
        self.rotation_accel
    }

    /// Staging update carrying sender-supplied values; time stamp unchanged.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_raw(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        angle_x: f32,
        angle_y: f32,
        angle_z: f32,
        x_speed: f32,
        y_speed: f32,
        z_speed: f32,
        rotation_speed_x: f32,
        rotation_speed_y: f32,
        rotation_speed_z: f32,
        motion_accel: f32,
        rotation_accel: f32,
    ) {
        self.kinematics
            .apply_raw(x, y, z, x_speed, y_speed, z_speed, motion_accel);
        self.angle_x = angle_x;
        self.angle_y = angle_y;
        self.angle_z = angle_z;
        self.rotation_speed_x = rotation_speed_x;
        self.rotation_speed_y = rotation_speed_y;
        self.rotation_speed_z = rotation_speed_z;
        self.rotation_accel = rotation_accel;
        self.refresh_rotating_state();
    }

    /// Committed update carrying sender-supplied values.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_raw(
        &mut self,
        time: TuioTime,
        x: f32,
        y: f32,
        z: f32,
        angle_x: f32,
        angle_y: f32,
        angle_z: f32,
        x_speed: f32,
        y_speed: f32,
        z_speed: f32,
        rotation_speed_x: f32,
        rotation_speed_y: f32,
        rotation_speed_z: f32,
        motion_accel: f32,
        rotation_accel: f32,
    ) {
        self.kinematics
            .update_raw(time, x, y, z, x_speed, y_speed, z_speed, motion_accel);
        self.angle_x = angle_x;
        self.angle_y = angle_y;
        self.angle_z = angle_z;
        self.rotation_speed_x = rotation_speed_x;
        self.rotation_speed_y = rotation_speed_y;
        self.rotation_speed_z = rotation_speed_z;
        self.rotation_accel = rotation_accel;
        self.refresh_rotating_state();
    }

    /// Committed update deriving all derivatives from the previous sample.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_derived(
        &mut self,
        time: TuioTime,
        x: f32,
        y: f32,
        z: f32,
        angle_x: f32,
        angle_y: f32,
        angle_z: f32,
    ) {
        let last = self.kinematics.last_sample();
        self.kinematics.update_derived(time, x, y, z);

        let dt = time.since(last.time).as_secs_f32();
        if dt > 0.0 {
            let da = wrap_turns((angle_x - self.angle_x) / TAU);
            let db = wrap_turns((angle_y - self.angle_y) / TAU);
            let dc = wrap_turns((angle_z - self.angle_z) / TAU);
            let speed_x = da / dt;
            let speed_y = db / dt;
            let speed_z = dc / dt;
            self.rotation_accel = (speed_x - self.rotation_speed_x) / dt
                + (speed_y - self.rotation_speed_y) / dt
                + (speed_z - self.rotation_speed_z) / dt;
            self.rotation_speed_x = speed_x;
            self.rotation_speed_y = speed_y;
            self.rotation_speed_z = speed_z;
        }
        self.angle_x = angle_x;
        self.angle_y = angle_y;
        self.angle_z = angle_z;
        self.refresh_rotating_state();
    }

    pub(crate) fn mark_removed(&mut self, time: TuioTime) {
        self.kinematics.mark_removed(time);
    }

    fn refresh_rotating_state(&mut self) {
        if self.rotation_accel != 0.0 && self.kinematics.state() != TuioState::Stopped {
            self.kinematics.set_state(TuioState::Rotating);
        }
    }
}

impl TuioContainer for Tuio3DObject {
    fn kinematics(&self) -> &KinematicState {
        &self.kinematics
    }

    fn is_moving(&self) -> bool {
        matches!(
            self.state(),
            TuioState::Accelerating | TuioState::Decelerating | TuioState::Rotating
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_PATH_CAPACITY;
    use std::f32::consts::TAU;

    fn object_at(millis: u64, x: f32, y: f32, angle: f32) -> TuioObject {
        TuioObject::new(
            TuioTime::from_millis(millis),
            7,
            3,
            x,
            y,
            angle,
            DEFAULT_PATH_CAPACITY,
        )
    }

    #[test]
    fn test_new_object_has_zero_rotation_derivatives() {
        let obj = object_at(0, 0.5, 0.5, 1.0);
        assert_eq!(obj.symbol_id(), 3);
        assert_eq!(obj.rotation_speed(), 0.0);
        assert_eq!(obj.rotation_accel(), 0.0);
        assert_eq!(obj.state(), TuioState::Added);
    }

    #[test]
    fn test_angle_wrap_across_zero_gives_small_positive_rate() {
        // 350 degrees -> 10 degrees over 100ms is a +20 degree step,
        // not a -340 degree one.
        let start = 350.0_f32.to_radians();
        let end = 10.0_f32.to_radians();
        let mut obj = object_at(0, 0.5, 0.5, start);
        obj.update_derived(TuioTime::from_millis(100), 0.5, 0.5, end);

        let expected = (20.0 / 360.0) / 0.1; // turns per second
        assert!(
            (obj.rotation_speed() - expected).abs() < 1e-4,
            "rotation_speed = {}",
            obj.rotation_speed()
        );
        assert!(obj.rotation_speed() > 0.0);
    }

    #[test]
    fn test_rotation_marks_rotating_state() {
        let mut obj = object_at(0, 0.5, 0.5, 0.0);
        // position moves too, so the motion state is not Stopped
        obj.update_derived(TuioTime::from_millis(100), 0.6, 0.5, 0.5);
        assert_eq!(obj.state(), TuioState::Rotating);
        assert!(obj.is_moving());
    }

    #[test]
    fn test_stationary_rotation_stays_stopped() {
        let mut obj = object_at(0, 0.5, 0.5, 0.0);
        obj.update_derived(TuioTime::from_millis(100), 0.5, 0.5, 0.0);
        assert_eq!(obj.state(), TuioState::Stopped);
        assert!(!obj.is_moving());
    }

    #[test]
    fn test_3d_object_rotation_accel_sums_axes() {
        let mut obj = Tuio3DObject::new(
            TuioTime::ZERO,
            1,
            9,
            0.5,
            0.5,
            0.5,
            0.0,
            0.0,
            0.0,
            DEFAULT_PATH_CAPACITY,
        );
        obj.update_derived(
            TuioTime::from_millis(100),
            0.6,
            0.5,
            0.5,
            TAU * 0.1,
            TAU * 0.1,
            0.0,
        );
        // each rotating axis contributes 0.1 turns over 0.1s
        assert!((obj.rotation_speed_x() - 1.0).abs() < 1e-4);
        assert!((obj.rotation_speed_y() - 1.0).abs() < 1e-4);
        assert_eq!(obj.rotation_speed_z(), 0.0);
        assert!(obj.rotation_accel() > 0.0);
        assert_eq!(obj.state(), TuioState::Rotating);
    }

    #[test]
    fn test_angle_degrees() {
        let obj = object_at(0, 0.0, 0.0, std::f32::consts::PI);
        assert!((obj.angle_degrees() - 180.0).abs() < 1e-4);
    }
}
