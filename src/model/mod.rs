//! Tracked Entity Model
//!
//! The five TUIO entity variants and their shared kinematic state:
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │  KinematicState  │  position sample, velocities,
//!                 │  (by value)      │  motion accel, lifecycle, path
//!                 └──────────────────┘
//!                    embedded in each
//!        ┌──────────┬──────────┬───────────┬────────────┐
//!   TuioObject  Tuio3DObject TuioCursor Tuio3DCursor TuioBlob
//!   symbol ID   symbol ID    display ID  display ID   w/h/area
//!   angle       3 angles                              angle
//! ```
//!
//! Variant-specific fields stay exclusive to their variant; the common
//! surface is the [`TuioContainer`] trait.

pub mod blob;
pub mod cursor;
pub mod kinematics;
pub mod object;
pub mod state;

pub use blob::TuioBlob;
pub use cursor::{Tuio3DCursor, TuioCursor};
pub use kinematics::{KinematicState, Sample, SessionId, TuioTime, DEFAULT_PATH_CAPACITY};
pub use object::{Tuio3DObject, TuioObject};
pub use state::TuioState;

use std::collections::VecDeque;

/// Common read surface of every tracked entity variant.
pub trait TuioContainer {
    /// The embedded kinematic state.
    fn kinematics(&self) -> &KinematicState;

    /// Session ID, unique among simultaneously live entities of the
    /// same variant.
    fn session_id(&self) -> SessionId {
        self.kinematics().session_id()
    }

    /// Normalized X coordinate.
    fn x(&self) -> f32 {
        self.kinematics().sample().x
    }

    /// Normalized Y coordinate.
    fn y(&self) -> f32 {
        self.kinematics().sample().y
    }

    /// Normalized Z coordinate (0 for 2D profiles).
    fn z(&self) -> f32 {
        self.kinematics().sample().z
    }

    /// X velocity.
    fn x_speed(&self) -> f32 {
        self.kinematics().x_speed()
    }

    /// Y velocity.
    fn y_speed(&self) -> f32 {
        self.kinematics().y_speed()
    }

    /// Z velocity (0 for 2D profiles).
    fn z_speed(&self) -> f32 {
        self.kinematics().z_speed()
    }

    /// Scalar motion speed.
    fn motion_speed(&self) -> f32 {
        self.kinematics().motion_speed()
    }

    /// Motion acceleration.
    fn motion_accel(&self) -> f32 {
        self.kinematics().motion_accel()
    }

    /// Session time of the most recent sample.
    fn time(&self) -> TuioTime {
        self.kinematics().time()
    }

    /// Lifecycle state.
    fn state(&self) -> TuioState {
        self.kinematics().state()
    }

    /// Bounded history of samples, most recent last.
    fn path(&self) -> &VecDeque<Sample> {
        self.kinematics().path()
    }

    /// Whether the entity is currently in motion.
    fn is_moving(&self) -> bool {
        matches!(
            self.state(),
            TuioState::Accelerating | TuioState::Decelerating
        )
    }

    /// Euclidean distance from the current sample to the given point.
    fn distance_to(&self, x: f32, y: f32, z: f32) -> f32 {
        self.kinematics().sample().distance_to(x, y, z)
    }

    /// X coordinate scaled to a screen width in pixels.
    fn screen_x(&self, width: u32) -> i32 {
        (self.x() * width as f32).round() as i32
    }

    /// Y coordinate scaled to a screen height in pixels.
    fn screen_y(&self, height: u32) -> i32 {
        (self.y() * height as f32).round() as i32
    }
}
