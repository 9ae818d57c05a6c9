//! Cursor Entities
//!
//! Cursors are anonymous touch points: unlike objects they carry no
//! symbol identity, so the client assigns each one a small display ID
//! that downstream consumers can use to index fixed-size per-finger
//! resources. The display ID is stable only while the cursor is live;
//! freed IDs below the historical maximum are recycled by the
//! allocator in `protocol::allocator`.

use crate::model::kinematics::{KinematicState, TuioTime};
use crate::model::TuioContainer;

/// Display ID of a cursor that has not been committed yet.
pub(crate) const UNASSIGNED_CURSOR_ID: i32 = -1;

/// A tracked 2D cursor (`/tuio/2Dcur`).
#[derive(Debug, Clone)]
pub struct TuioCursor {
    kinematics: KinematicState,
    cursor_id: i32,
}

impl TuioCursor {
    pub(crate) fn new(
        time: TuioTime,
        session_id: i64,
        cursor_id: i32,
        x: f32,
        y: f32,
        path_capacity: usize,
    ) -> Self {
        TuioCursor {
            kinematics: KinematicState::new(time, session_id, x, y, 0.0, path_capacity),
            cursor_id,
        }
    }

    /// Allocator-assigned display ID, stable while the cursor is live.
    pub fn cursor_id(&self) -> i32 {
        self.cursor_id
    }

    /// Staging update carrying sender-supplied values; time stamp unchanged.
    pub(crate) fn apply_raw(
        &mut self,
        x: f32,
        y: f32,
        x_speed: f32,
        y_speed: f32,
        motion_accel: f32,
    ) {
        self.kinematics
            .apply_raw(x, y, 0.0, x_speed, y_speed, 0.0, motion_accel);
    }

    /// Committed update carrying sender-supplied values.
    pub(crate) fn update_raw(
        &mut self,
        time: TuioTime,
        x: f32,
        y: f32,
        x_speed: f32,
        y_speed: f32,
        motion_accel: f32,
    ) {
        self.kinematics
            .update_raw(time, x, y, 0.0, x_speed, y_speed, 0.0, motion_accel);
    }

    /// Committed update deriving all derivatives from the previous sample.
    pub(crate) fn update_derived(&mut self, time: TuioTime, x: f32, y: f32) {
        self.kinematics.update_derived(time, x, y, 0.0);
    }

    pub(crate) fn mark_removed(&mut self, time: TuioTime) {
        self.kinematics.mark_removed(time);
    }
}

impl TuioContainer for TuioCursor {
    fn kinematics(&self) -> &KinematicState {
        &self.kinematics
    }
}

/// A tracked 3D cursor (`/tuio/3Dcur`).
#[derive(Debug, Clone)]
pub struct Tuio3DCursor {
    kinematics: KinematicState,
    cursor_id: i32,
}

impl Tuio3DCursor {
    pub(crate) fn new(
        time: TuioTime,
        session_id: i64,
        cursor_id: i32,
        x: f32,
        y: f32,
        z: f32,
        path_capacity: usize,
    ) -> Self {
        Tuio3DCursor {
            kinematics: KinematicState::new(time, session_id, x, y, z, path_capacity),
            cursor_id,
        }
    }

    /// Allocator-assigned display ID, stable while the cursor is live.
    pub fn cursor_id(&self) -> i32 {
        self.cursor_id
    }

    /// Staging update carrying sender-supplied values; time stamp unchanged.
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
        self.kinematics
            .apply_raw(x, y, z, x_speed, y_speed, z_speed, motion_accel);
    }

    /// Committed update carrying sender-supplied values.
    #[allow(clippy::too_many_arguments)]
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
        self.kinematics
            .update_raw(time, x, y, z, x_speed, y_speed, z_speed, motion_accel);
    }

    /// Committed update deriving all derivatives from the previous sample.
    pub(crate) fn update_derived(&mut self, time: TuioTime, x: f32, y: f32, z: f32) {
        self.kinematics.update_derived(time, x, y, z);
    }

    pub(crate) fn mark_removed(&mut self, time: TuioTime) {
        self.kinematics.mark_removed(time);
    }
}

impl TuioContainer for Tuio3DCursor {
    fn kinematics(&self) -> &KinematicState {
        &self.kinematics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TuioState, DEFAULT_PATH_CAPACITY};

    #[test]
    fn test_cursor_starts_added_with_zero_speed() {
        let cur = TuioCursor::new(TuioTime::ZERO, 5, 0, 0.1, 0.2, DEFAULT_PATH_CAPACITY);
        assert_eq!(cur.session_id(), 5);
        assert_eq!(cur.cursor_id(), 0);
        assert_eq!(cur.x_speed(), 0.0);
        assert_eq!(cur.state(), TuioState::Added);
    }

    #[test]
    fn test_cursor_derived_update() {
        let mut cur = TuioCursor::new(TuioTime::ZERO, 5, 0, 0.1, 0.1, DEFAULT_PATH_CAPACITY);
        cur.update_derived(TuioTime::from_millis(200), 0.3, 0.1);
        assert!((cur.x_speed() - 1.0).abs() < 1e-5);
        assert_eq!(cur.y_speed(), 0.0);
    }

    #[test]
    fn test_3d_cursor_tracks_z() {
        let mut cur =
            Tuio3DCursor::new(TuioTime::ZERO, 6, 1, 0.0, 0.0, 0.0, DEFAULT_PATH_CAPACITY);
        cur.update_derived(TuioTime::from_millis(100), 0.0, 0.0, 0.5);
        assert!((cur.z_speed() - 5.0).abs() < 1e-4);
        assert_eq!(cur.x_speed(), 0.0);
    }

    #[test]
    fn test_screen_coordinates() {
        let cur = TuioCursor::new(TuioTime::ZERO, 5, 0, 0.5, 0.25, DEFAULT_PATH_CAPACITY);
        assert_eq!(cur.screen_x(1920), 960);
        assert_eq!(cur.screen_y(1080), 270);
    }
}
