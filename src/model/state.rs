//! Entity Lifecycle States

/// Lifecycle state of a tracked entity.
///
/// An entity starts as `Added`, moves through the motion states while
/// it is tracked, and ends as `Removed`. Once `Removed` the entity is
/// purged from the live store and never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuioState {
    /// Staged as new in the current frame, not yet committed
    Added,
    /// Motion acceleration is positive
    Accelerating,
    /// Motion acceleration is negative
    Decelerating,
    /// No motion acceleration
    Stopped,
    /// Rotational acceleration is non-zero (objects and blobs only)
    Rotating,
    /// Lost from the sender's alive set; purged at the frame barrier
    Removed,
}

impl TuioState {
    /// Derive the motion state from the sign of the motion acceleration.
    pub(crate) fn from_motion_accel(accel: f32) -> Self {
        if accel > 0.0 {
            TuioState::Accelerating
        } else if accel < 0.0 {
            TuioState::Decelerating
        } else {
            TuioState::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_accel_sign() {
        assert_eq!(TuioState::from_motion_accel(0.5), TuioState::Accelerating);
        assert_eq!(TuioState::from_motion_accel(-0.5), TuioState::Decelerating);
        assert_eq!(TuioState::from_motion_accel(0.0), TuioState::Stopped);
    }
}
