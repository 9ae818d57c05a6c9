//! Session Clock and Frame Sequencing
//!
//! Session time starts at zero when the decoder is created and advances
//! with wall time. Frame sequence numbers from `fseq` commands decide
//! whether a staged frame commits or is discarded as late:
//!
//! - a frame number above the current one commits and advances the clock
//! - an equal frame number commits (redundant bundles for one frame)
//! - an older frame number is late and is dropped, unless the sender is
//!   more than 100 frames behind, which signals a source restart and
//!   forces a resync
//! - frame number -1 means "no sequencing"; such frames commit, and the
//!   clock advances at most once per 100ms of wall time

use std::time::Instant;

use crate::model::TuioTime;

/// Frame gap beyond which an out-of-order sender is treated as restarted.
const FRAME_RESYNC_GAP: i32 = 100;

/// Wall-time advance interval for unsequenced (fseq -1) senders.
const UNSEQUENCED_ADVANCE_MS: u64 = 100;

/// Verdict for one `fseq` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameAdvance {
    /// Commit the staged frame at this session time.
    Commit(TuioTime),
    /// Discard the staged frame without touching live state.
    Late,
}

/// Monotonic session clock plus the last committed frame number.
#[derive(Debug)]
pub(crate) struct SessionClock {
    start: Instant,
    time: TuioTime,
    frame: i32,
}

impl SessionClock {
    pub(crate) fn new() -> Self {
        SessionClock {
            start: Instant::now(),
            time: TuioTime::ZERO,
            frame: 0,
        }
    }

    /// Elapsed session time right now.
    pub(crate) fn session_now(&self) -> TuioTime {
        TuioTime::from_duration(self.start.elapsed())
    }

    /// Session time at the last clock advance.
    pub(crate) fn time(&self) -> TuioTime {
        self.time
    }

    /// Applies one `fseq` frame number and decides the frame's fate.
    pub(crate) fn observe_fseq(&mut self, fseq: i32) -> FrameAdvance {
        if fseq > 0 {
            if fseq > self.frame {
                self.time = self.session_now();
            }
            if fseq >= self.frame || (self.frame - fseq) > FRAME_RESYNC_GAP {
                self.frame = fseq;
                FrameAdvance::Commit(self.time)
            } else {
                FrameAdvance::Late
            }
        } else {
            // Unsequenced sender: rate-limit the clock advance.
            let now = self.session_now();
            if now.total_millis() - self.time.total_millis() > UNSEQUENCED_ADVANCE_MS {
                self.time = now;
            }
            FrameAdvance::Commit(self.time)
        }
    }

    /// Forgets all frame history, as after a disconnect.
    pub(crate) fn reset(&mut self) {
        self.start = Instant::now();
        self.time = TuioTime::ZERO;
        self.frame = 0;
    }
}
