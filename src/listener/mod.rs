//! Listener Fan-Out
//!
//! Consumers observe tracked entities through the [`TuioListener`]
//! trait. Every method has a no-op default so a listener implements
//! only the events it cares about. Callbacks fire synchronously on the
//! decode path, after the frame's state changes have been applied, and
//! each committed frame ends with exactly one [`TuioListener::refresh`].
//!
//! The registry snapshots its listener list before dispatching, so a
//! callback may add or remove listeners without deadlocking.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{Tuio3DCursor, Tuio3DObject, TuioBlob, TuioCursor, TuioObject, TuioTime};

/// Receives entity lifecycle events from a [`crate::TuioClient`].
///
/// Entities passed to callbacks are snapshots; holding on to one does
/// not track later updates.
#[allow(unused_variables)]
pub trait TuioListener: Send + Sync {
    /// A new 2D object entered the surface.
    fn object_added(&self, object: &TuioObject) {}
    /// A live 2D object moved or rotated.
    fn object_updated(&self, object: &TuioObject) {}
    /// A 2D object left the surface.
    fn object_removed(&self, object: &TuioObject) {}

    /// A new 3D object entered the volume.
    fn object_3d_added(&self, object: &Tuio3DObject) {}
    /// A live 3D object moved or rotated.
    fn object_3d_updated(&self, object: &Tuio3DObject) {}
    /// A 3D object left the volume.
    fn object_3d_removed(&self, object: &Tuio3DObject) {}

    /// A new 2D cursor touched down.
    fn cursor_added(&self, cursor: &TuioCursor) {}
    /// A live 2D cursor moved.
    fn cursor_updated(&self, cursor: &TuioCursor) {}
    /// A 2D cursor lifted.
    fn cursor_removed(&self, cursor: &TuioCursor) {}

    /// A new 3D cursor appeared.
    fn cursor_3d_added(&self, cursor: &Tuio3DCursor) {}
    /// A live 3D cursor moved.
    fn cursor_3d_updated(&self, cursor: &Tuio3DCursor) {}
    /// A 3D cursor disappeared.
    fn cursor_3d_removed(&self, cursor: &Tuio3DCursor) {}

    /// A new blob was segmented.
    fn blob_added(&self, blob: &TuioBlob) {}
    /// A live blob moved or changed shape.
    fn blob_updated(&self, blob: &TuioBlob) {}
    /// A blob vanished.
    fn blob_removed(&self, blob: &TuioBlob) {}

    /// A frame committed; all per-entity events for it have fired.
    fn refresh(&self, time: TuioTime) {}
}

/// Shared, ordered collection of listeners.
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    listeners: Arc<RwLock<Vec<Arc<dyn TuioListener>>>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a listener. The same listener may be registered more
    /// than once and then receives each event once per registration.
    pub(crate) fn add(&self, listener: Arc<dyn TuioListener>) {
        self.listeners.write().push(listener);
    }

    /// Removes every registration of the given listener.
    pub(crate) fn remove(&self, listener: &Arc<dyn TuioListener>) {
        self.listeners
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    pub(crate) fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Invokes `f` on each listener, in registration order, outside the
    /// registry lock.
    pub(crate) fn each(&self, mut f: impl FnMut(&dyn TuioListener)) {
        let snapshot: Vec<_> = self.listeners.read().clone();
        for listener in &snapshot {
            f(listener.as_ref());
        }
    }
}
