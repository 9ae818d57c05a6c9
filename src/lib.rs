//! # tuio-client
//!
//! Asynchronous client for the TUIO tangible interaction protocol.
//! TUIO senders (multi-touch tables, marker trackers, simulators)
//! broadcast OSC bundles over UDP describing tagged objects, anonymous
//! cursors and untagged blobs; this crate decodes those bundles into
//! live entity state and lifecycle events.
//!
//! ```text
//!   ┌─────────────┐    ┌──────────────────┐    ┌───────────────┐
//!   │ UDP socket  │───>│ ProtocolDecoder  │───>│ EntityStores  │
//!   │ (rosc)      │    │ set/alive/fseq   │    │ live entities │
//!   └─────────────┘    └────────┬─────────┘    └───────┬───────┘
//!                               │                      │
//!                               v                      v
//!                      TuioListener fan-out      query snapshots
//! ```
//!
//! Frames are atomic: a profile's `set` and `alive` commands stage
//! changes that only become visible when the closing `fseq` commits,
//! and late frames are dropped whole. Senders that do not compute
//! velocities get them derived client-side, including shortest-path
//! angle handling for rotating objects.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tuio_client::{TuioClient, TuioContainer, TuioCursor, TuioListener};
//!
//! struct Touches;
//!
//! impl TuioListener for Touches {
//!     fn cursor_added(&self, cursor: &TuioCursor) {
//!         println!("down {} at {},{}", cursor.session_id(), cursor.x(), cursor.y());
//!     }
//! }
//!
//! # async fn run() -> tuio_client::Result<()> {
//! let client = TuioClient::new();
//! client.add_listener(Arc::new(Touches));
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod errors;
pub mod listener;
pub mod model;
pub(crate) mod protocol;

pub use client::TuioClient;
pub use config::{ClientConfig, LoggingConfig, NetworkConfig, TrackingConfig, DEFAULT_TUIO_PORT};
pub use errors::{Result, TuioError};
pub use listener::TuioListener;
pub use model::{
    Sample, SessionId, Tuio3DCursor, Tuio3DObject, TuioBlob, TuioContainer, TuioCursor,
    TuioObject, TuioState, TuioTime,
};
