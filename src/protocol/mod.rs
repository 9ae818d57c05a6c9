//! Protocol Decoding
//!
//! Everything between a raw OSC packet and a committed entity frame:
//! typed argument access, the session clock with frame sequencing, the
//! cursor display ID allocator, and the per-profile decoder state
//! machine.

pub(crate) mod allocator;
pub(crate) mod args;
pub(crate) mod clock;
pub(crate) mod decoder;
