//! Blob Entities
//!
//! Blobs are untagged tracked regions: a position plus an oriented
//! bounding box (width, height, rotation angle) and the covered area.

use std::f32::consts::{PI, TAU};

use crate::model::kinematics::{wrap_turns, KinematicState, TuioTime};
use crate::model::state::TuioState;
use crate::model::TuioContainer;

/// A tracked 2D blob (`/tuio/2Dblb`).
#[derive(Debug, Clone)]
pub struct TuioBlob {
    kinematics: KinematicState,
    angle: f32,
    width: f32,
    height: f32,
    area: f32,
    rotation_speed: f32,
    rotation_accel: f32,
}

impl TuioBlob {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        time: TuioTime,
        session_id: i64,
        x: f32,
        y: f32,
        angle: f32,
        width: f32,
        height: f32,
        area: f32,
        path_capacity: usize,
    ) -> Self {
        TuioBlob {
            kinematics: KinematicState::new(time, session_id, x, y, 0.0, path_capacity),
            angle,
            width,
            height,
            area,
            rotation_speed: 0.0,
            rotation_accel: 0.0,
        }
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Rotation angle in degrees.
    pub fn angle_degrees(&self) -> f32 {
        self.angle / PI * 180.0
    }

    /// Normalized width of the bounding box.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Normalized height of the bounding box.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Normalized covered area.
    pub fn area(&self) -> f32 {
        self.area
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
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_raw(
        &mut self,
        x: f32,
        y: f32,
        angle: f32,
        width: f32,
        height: f32,
        area: f32,
        x_speed: f32,
        y_speed: f32,
        rotation_speed: f32,
        motion_accel: f32,
        rotation_accel: f32,
    ) {
        self.kinematics
            .apply_raw(x, y, 0.0, x_speed, y_speed, 0.0, motion_accel);
        self.set_geometry(angle, width, height, area);
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
        width: f32,
        height: f32,
        area: f32,
        x_speed: f32,
        y_speed: f32,
        rotation_speed: f32,
        motion_accel: f32,
        rotation_accel: f32,
    ) {
        self.kinematics
            .update_raw(time, x, y, 0.0, x_speed, y_speed, 0.0, motion_accel);
        self.set_geometry(angle, width, height, area);
        self.rotation_speed = rotation_speed;
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
        angle: f32,
        width: f32,
        height: f32,
        area: f32,
    ) {
        let last = self.kinematics.last_sample();
        self.kinematics.update_derived(time, x, y, 0.0);

        let dt = time.since(last.time).as_secs_f32();
        if dt > 0.0 {
            let da = wrap_turns((angle - self.angle) / TAU);
            let speed = da / dt;
            self.rotation_accel = (speed - self.rotation_speed) / dt;
            self.rotation_speed = speed;
        }
        self.set_geometry(angle, width, height, area);
        self.refresh_rotating_state();
    }

    pub(crate) fn mark_removed(&mut self, time: TuioTime) {
        self.kinematics.mark_removed(time);
    }

    fn set_geometry(&mut self, angle: f32, width: f32, height: f32, area: f32) {
        self.angle = angle;
        self.width = width;
        self.height = height;
        self.area = area;
    }

    fn refresh_rotating_state(&mut self) {
        if self.rotation_accel != 0.0 && self.kinematics.state() != TuioState::Stopped {
            self.kinematics.set_state(TuioState::Rotating);
        }
    }
}

impl TuioContainer for TuioBlob {
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

    fn blob_at(millis: u64) -> TuioBlob {
        TuioBlob::new(
            TuioTime::from_millis(millis),
            11,
            0.4,
            0.4,
            0.0,
            0.1,
            0.2,
            0.02,
            DEFAULT_PATH_CAPACITY,
        )
    }

    #[test]
    fn test_blob_geometry() {
        let blob = blob_at(0);
        assert_eq!(blob.width(), 0.1);
        assert_eq!(blob.height(), 0.2);
        assert_eq!(blob.area(), 0.02);
        assert_eq!(blob.rotation_speed(), 0.0);
    }

    #[test]
    fn test_blob_derived_rotation() {
        let mut blob = blob_at(0);
        blob.update_derived(
            TuioTime::from_millis(100),
            0.5,
            0.4,
            TAU * 0.05,
            0.1,
            0.2,
            0.02,
        );
        // 0.05 turns over 0.1s
        assert!((blob.rotation_speed() - 0.5).abs() < 1e-4);
        assert_eq!(blob.state(), TuioState::Rotating);
    }

    #[test]
    fn test_blob_geometry_updates() {
        let mut blob = blob_at(0);
        blob.update_raw(
            TuioTime::from_millis(50),
            0.4,
            0.4,
            0.1,
            0.3,
            0.3,
            0.09,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
        );
        assert_eq!(blob.width(), 0.3);
        assert_eq!(blob.area(), 0.09);
    }
}
