//! TUIO Message Decoder
//!
//! Turns decoded OSC packets into entity lifecycle events. Each of the
//! five profile addresses carries three commands per frame:
//!
//! ```text
//!   set    stage one entity add or update
//!   alive  stage removals for entities missing from the ID list
//!   fseq   commit or discard everything staged for the profile
//! ```
//!
//! Nothing touches the live stores until `fseq` commits, so a frame is
//! observed atomically or not at all. All five profiles share one
//! session clock and frame counter, matching senders that interleave
//! profile bundles within a frame stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rosc::{OscMessage, OscPacket};
use tracing::{debug, trace};

use crate::listener::ListenerRegistry;
use crate::model::cursor::UNASSIGNED_CURSOR_ID;
use crate::model::{
    SessionId, Tuio3DCursor, Tuio3DObject, TuioBlob, TuioContainer, TuioCursor, TuioObject,
    TuioState, TuioTime,
};
use crate::protocol::allocator::DisplayIdAllocator;
use crate::protocol::args::Args;
use crate::protocol::clock::{FrameAdvance, SessionClock};

const PROFILE_2D_OBJ: &str = "/tuio/2Dobj";
const PROFILE_2D_CUR: &str = "/tuio/2Dcur";
const PROFILE_2D_BLB: &str = "/tuio/2Dblb";
const PROFILE_3D_OBJ: &str = "/tuio/3Dobj";
const PROFILE_3D_CUR: &str = "/tuio/3Dcur";

/// Live entity maps, shared between the decoder and client queries.
#[derive(Default)]
pub(crate) struct EntityStores {
    pub(crate) objects: Mutex<HashMap<SessionId, TuioObject>>,
    pub(crate) cursors: Mutex<HashMap<SessionId, TuioCursor>>,
    pub(crate) blobs: Mutex<HashMap<SessionId, TuioBlob>>,
    pub(crate) objects_3d: Mutex<HashMap<SessionId, Tuio3DObject>>,
    pub(crate) cursors_3d: Mutex<HashMap<SessionId, Tuio3DCursor>>,
}

impl EntityStores {
    pub(crate) fn clear_all(&self) {
        self.objects.lock().clear();
        self.cursors.lock().clear();
        self.blobs.lock().clear();
        self.objects_3d.lock().clear();
        self.cursors_3d.lock().clear();
    }
}

/// Per-profile staging state for the frame currently being assembled.
struct FrameState<E> {
    /// Session IDs alive as of the last committed frame.
    alive: Vec<SessionId>,
    /// Session IDs announced by this frame's `alive` command.
    fresh: Vec<SessionId>,
    /// Staged changes in arrival order. The lifecycle state of each
    /// entry says how to commit it: `Added` inserts, `Removed` erases,
    /// anything else updates.
    staged: Vec<E>,
}

impl<E: TuioContainer + Clone> FrameState<E> {
    fn new() -> Self {
        FrameState {
            alive: Vec::new(),
            fresh: Vec::new(),
            staged: Vec::new(),
        }
    }

    fn stage(&mut self, entity: E) {
        self.staged.push(entity);
    }

    /// Records the frame's alive list and stages a removal for every
    /// previously alive entity the list no longer mentions.
    fn observe_alive(
        &mut self,
        ids: Vec<SessionId>,
        store: &Mutex<HashMap<SessionId, E>>,
        time: TuioTime,
        mark_removed: impl Fn(&mut E, TuioTime),
    ) {
        self.fresh = ids;
        let mut removals = Vec::new();
        {
            let store = store.lock();
            for sid in &self.alive {
                if self.fresh.contains(sid) {
                    continue;
                }
                // Senders may list IDs that never got a set command.
                if let Some(existing) = store.get(sid) {
                    let mut staged = existing.clone();
                    mark_removed(&mut staged, time);
                    removals.push(staged);
                }
            }
        }
        self.staged.append(&mut removals);
    }

    /// Ends the frame. A committed frame's alive list becomes current;
    /// a late frame leaves live state untouched.
    fn finish(&mut self, committed: bool) {
        if committed {
            std::mem::swap(&mut self.alive, &mut self.fresh);
        }
        self.fresh.clear();
        self.staged.clear();
    }

    fn reset(&mut self) {
        self.alive.clear();
        self.fresh.clear();
        self.staged.clear();
    }
}

/// State machine turning OSC packets into store mutations and listener
/// callbacks.
pub(crate) struct ProtocolDecoder {
    clock: SessionClock,
    objects: FrameState<TuioObject>,
    cursors: FrameState<TuioCursor>,
    blobs: FrameState<TuioBlob>,
    objects_3d: FrameState<Tuio3DObject>,
    cursors_3d: FrameState<Tuio3DCursor>,
    cursor_ids: DisplayIdAllocator,
    cursor_3d_ids: DisplayIdAllocator,
    stores: Arc<EntityStores>,
    listeners: ListenerRegistry,
    path_capacity: usize,
}

impl ProtocolDecoder {
    pub(crate) fn new(
        stores: Arc<EntityStores>,
        listeners: ListenerRegistry,
        path_capacity: usize,
    ) -> Self {
        ProtocolDecoder {
            clock: SessionClock::new(),
            objects: FrameState::new(),
            cursors: FrameState::new(),
            blobs: FrameState::new(),
            objects_3d: FrameState::new(),
            cursors_3d: FrameState::new(),
            cursor_ids: DisplayIdAllocator::new(),
            cursor_3d_ids: DisplayIdAllocator::new(),
            stores,
            listeners,
            path_capacity,
        }
    }

    /// Feeds one decoded packet, recursing through bundles in order.
    pub(crate) fn process_packet(&mut self, packet: &OscPacket) {
        match packet {
            OscPacket::Message(message) => self.process_message(message),
            OscPacket::Bundle(bundle) => {
                for inner in &bundle.content {
                    self.process_packet(inner);
                }
            }
        }
    }

    /// Forgets all frame history, as after a disconnect. Does not touch
    /// the stores; the client owns those.
    pub(crate) fn reset(&mut self) {
        self.clock.reset();
        self.objects.reset();
        self.cursors.reset();
        self.blobs.reset();
        self.objects_3d.reset();
        self.cursors_3d.reset();
        self.cursor_ids.reset();
        self.cursor_3d_ids.reset();
    }

    fn process_message(&mut self, message: &OscMessage) {
        let args = Args::new(&message.args);
        let Some(command) = args.command() else {
            trace!(addr = %message.addr, "message without command string");
            return;
        };
        match (message.addr.as_str(), command) {
            (PROFILE_2D_OBJ, "set") => self.set_object(&args),
            (PROFILE_2D_OBJ, "alive") => self.alive_objects(&args),
            (PROFILE_2D_OBJ, "fseq") => self.fseq_objects(args.int(1)),
            (PROFILE_2D_CUR, "set") => self.set_cursor(&args),
            (PROFILE_2D_CUR, "alive") => self.alive_cursors(&args),
            (PROFILE_2D_CUR, "fseq") => self.fseq_cursors(args.int(1)),
            (PROFILE_2D_BLB, "set") => self.set_blob(&args),
            (PROFILE_2D_BLB, "alive") => self.alive_blobs(&args),
            (PROFILE_2D_BLB, "fseq") => self.fseq_blobs(args.int(1)),
            (PROFILE_3D_OBJ, "set") => self.set_object_3d(&args),
            (PROFILE_3D_OBJ, "alive") => self.alive_objects_3d(&args),
            (PROFILE_3D_OBJ, "fseq") => self.fseq_objects_3d(args.int(1)),
            (PROFILE_3D_CUR, "set") => self.set_cursor_3d(&args),
            (PROFILE_3D_CUR, "alive") => self.alive_cursors_3d(&args),
            (PROFILE_3D_CUR, "fseq") => self.fseq_cursors_3d(args.int(1)),
            (addr, command) => trace!(addr, command, "ignoring unhandled message"),
        }
    }

    /// Applies one `fseq` and reports the commit time, if any.
    fn frame_verdict(&mut self, fseq: i32) -> Option<TuioTime> {
        match self.clock.observe_fseq(fseq) {
            FrameAdvance::Commit(time) => Some(time),
            FrameAdvance::Late => {
                debug!(fseq, "dropping late frame");
                None
            }
        }
    }

    fn notify_refresh(&self, time: TuioTime) {
        self.listeners.each(|l| l.refresh(time));
    }

    // ---- 2D objects -----------------------------------------------------

    fn set_object(&mut self, args: &Args<'_>) {
        let sid = args.session(1);
        let symbol_id = args.int(2);
        let x = args.float(3);
        let y = args.float(4);
        let angle = args.float(5);
        let x_speed = args.float(6);
        let y_speed = args.float(7);
        let rotation_speed = args.float(8);
        let motion_accel = args.float(9);
        let rotation_accel = args.float(10);

        let staged = {
            let store = self.stores.objects.lock();
            match store.get(&sid) {
                None => Some(TuioObject::new(
                    self.clock.time(),
                    sid,
                    symbol_id,
                    x,
                    y,
                    angle,
                    self.path_capacity,
                )),
                Some(existing)
                    if existing.x() != x
                        || existing.y() != y
                        || existing.angle() != angle
                        || existing.x_speed() != x_speed
                        || existing.y_speed() != y_speed
                        || existing.rotation_speed() != rotation_speed
                        || existing.motion_accel() != motion_accel
                        || existing.rotation_accel() != rotation_accel =>
                {
                    let mut update = existing.clone();
                    update.apply_raw(
                        x,
                        y,
                        angle,
                        x_speed,
                        y_speed,
                        rotation_speed,
                        motion_accel,
                        rotation_accel,
                    );
                    Some(update)
                }
                Some(_) => None,
            }
        };
        if let Some(entity) = staged {
            self.objects.stage(entity);
        }
    }

    fn alive_objects(&mut self, args: &Args<'_>) {
        let ids: Vec<SessionId> = args.sessions_from(1).collect();
        let time = self.clock.session_now();
        self.objects
            .observe_alive(ids, &self.stores.objects, time, |e, t| e.mark_removed(t));
    }

    fn fseq_objects(&mut self, fseq: i32) {
        let Some(time) = self.frame_verdict(fseq) else {
            self.objects.finish(false);
            return;
        };
        let staged = std::mem::take(&mut self.objects.staged);
        for mut tobj in staged {
            let sid = tobj.session_id();
            match tobj.state() {
                TuioState::Removed => {
                    // Notify first: the entity stays queryable until the
                    // remove callbacks have run.
                    tobj.mark_removed(time);
                    self.listeners.each(|l| l.object_removed(&tobj));
                    self.stores.objects.lock().remove(&sid);
                }
                TuioState::Added => {
                    let added = TuioObject::new(
                        time,
                        sid,
                        tobj.symbol_id(),
                        tobj.x(),
                        tobj.y(),
                        tobj.angle(),
                        self.path_capacity,
                    );
                    self.stores.objects.lock().insert(sid, added.clone());
                    self.listeners.each(|l| l.object_added(&added));
                }
                _ => {
                    let updated = {
                        let mut store = self.stores.objects.lock();
                        let Some(auth) = store.get_mut(&sid) else {
                            continue;
                        };
                        if position_moved_without_velocity(&tobj, auth) {
                            auth.update_derived(time, tobj.x(), tobj.y(), tobj.angle());
                        } else {
                            auth.update_raw(
                                time,
                                tobj.x(),
                                tobj.y(),
                                tobj.angle(),
                                tobj.x_speed(),
                                tobj.y_speed(),
                                tobj.rotation_speed(),
                                tobj.motion_accel(),
                                tobj.rotation_accel(),
                            );
                        }
                        auth.clone()
                    };
                    self.listeners.each(|l| l.object_updated(&updated));
                }
            }
        }
        self.notify_refresh(time);
        self.objects.finish(true);
    }

    // ---- 2D cursors -----------------------------------------------------

    fn set_cursor(&mut self, args: &Args<'_>) {
        let sid = args.session(1);
        let x = args.float(2);
        let y = args.float(3);
        let x_speed = args.float(4);
        let y_speed = args.float(5);
        let motion_accel = args.float(6);

        let staged = {
            let store = self.stores.cursors.lock();
            match store.get(&sid) {
                None => Some(TuioCursor::new(
                    self.clock.time(),
                    sid,
                    UNASSIGNED_CURSOR_ID,
                    x,
                    y,
                    self.path_capacity,
                )),
                Some(existing)
                    if existing.x() != x
                        || existing.y() != y
                        || existing.x_speed() != x_speed
                        || existing.y_speed() != y_speed
                        || existing.motion_accel() != motion_accel =>
                {
                    let mut update = existing.clone();
                    update.apply_raw(x, y, x_speed, y_speed, motion_accel);
                    Some(update)
                }
                Some(_) => None,
            }
        };
        if let Some(entity) = staged {
            self.cursors.stage(entity);
        }
    }

    fn alive_cursors(&mut self, args: &Args<'_>) {
        let ids: Vec<SessionId> = args.sessions_from(1).collect();
        let time = self.clock.session_now();
        self.cursors
            .observe_alive(ids, &self.stores.cursors, time, |e, t| e.mark_removed(t));
    }

    fn fseq_cursors(&mut self, fseq: i32) {
        let Some(time) = self.frame_verdict(fseq) else {
            self.cursors.finish(false);
            return;
        };
        let staged = std::mem::take(&mut self.cursors.staged);
        for mut tcur in staged {
            let sid = tcur.session_id();
            match tcur.state() {
                TuioState::Removed => {
                    // Notify first: the cursor stays queryable until the
                    // remove callbacks have run.
                    tcur.mark_removed(time);
                    self.listeners.each(|l| l.cursor_removed(&tcur));
                    let mut store = self.stores.cursors.lock();
                    if store.remove(&sid).is_some() {
                        self.cursor_ids.release(
                            tcur.cursor_id(),
                            tcur.x(),
                            tcur.y(),
                            0.0,
                            store.values().map(TuioCursor::cursor_id),
                        );
                    }
                }
                TuioState::Added => {
                    let mut store = self.stores.cursors.lock();
                    let cursor_id = self.cursor_ids.assign(store.len(), tcur.x(), tcur.y(), 0.0);
                    let added = TuioCursor::new(
                        time,
                        sid,
                        cursor_id,
                        tcur.x(),
                        tcur.y(),
                        self.path_capacity,
                    );
                    store.insert(sid, added.clone());
                    drop(store);
                    self.listeners.each(|l| l.cursor_added(&added));
                }
                _ => {
                    let updated = {
                        let mut store = self.stores.cursors.lock();
                        let Some(auth) = store.get_mut(&sid) else {
                            continue;
                        };
                        if position_moved_without_velocity(&tcur, auth) {
                            auth.update_derived(time, tcur.x(), tcur.y());
                        } else {
                            auth.update_raw(
                                time,
                                tcur.x(),
                                tcur.y(),
                                tcur.x_speed(),
                                tcur.y_speed(),
                                tcur.motion_accel(),
                            );
                        }
                        auth.clone()
                    };
                    self.listeners.each(|l| l.cursor_updated(&updated));
                }
            }
        }
        self.notify_refresh(time);
        self.cursors.finish(true);
    }

    // ---- 2D blobs -------------------------------------------------------

    fn set_blob(&mut self, args: &Args<'_>) {
        let sid = args.session(1);
        let x = args.float(2);
        let y = args.float(3);
        let angle = args.float(4);
        let width = args.float(5);
        let height = args.float(6);
        let area = args.float(7);
        let x_speed = args.float(8);
        let y_speed = args.float(9);
        let rotation_speed = args.float(10);
        let motion_accel = args.float(11);
        let rotation_accel = args.float(12);

        let staged = {
            let store = self.stores.blobs.lock();
            match store.get(&sid) {
                None => Some(TuioBlob::new(
                    self.clock.time(),
                    sid,
                    x,
                    y,
                    angle,
                    width,
                    height,
                    area,
                    self.path_capacity,
                )),
                Some(existing)
                    if existing.x() != x
                        || existing.y() != y
                        || existing.angle() != angle
                        || existing.width() != width
                        || existing.height() != height
                        || existing.area() != area
                        || existing.x_speed() != x_speed
                        || existing.y_speed() != y_speed
                        || existing.rotation_speed() != rotation_speed
                        || existing.motion_accel() != motion_accel
                        || existing.rotation_accel() != rotation_accel =>
                {
                    let mut update = existing.clone();
                    update.apply_raw(
                        x,
                        y,
                        angle,
                        width,
                        height,
                        area,
                        x_speed,
                        y_speed,
                        rotation_speed,
                        motion_accel,
                        rotation_accel,
                    );
                    Some(update)
                }
                Some(_) => None,
            }
        };
        if let Some(entity) = staged {
            self.blobs.stage(entity);
        }
    }

    fn alive_blobs(&mut self, args: &Args<'_>) {
        let ids: Vec<SessionId> = args.sessions_from(1).collect();
        let time = self.clock.session_now();
        self.blobs
            .observe_alive(ids, &self.stores.blobs, time, |e, t| e.mark_removed(t));
    }

    fn fseq_blobs(&mut self, fseq: i32) {
        let Some(time) = self.frame_verdict(fseq) else {
            self.blobs.finish(false);
            return;
        };
        let staged = std::mem::take(&mut self.blobs.staged);
        for mut tblb in staged {
            let sid = tblb.session_id();
            match tblb.state() {
                TuioState::Removed => {
                    tblb.mark_removed(time);
                    self.listeners.each(|l| l.blob_removed(&tblb));
                    self.stores.blobs.lock().remove(&sid);
                }
                TuioState::Added => {
                    let added = TuioBlob::new(
                        time,
                        sid,
                        tblb.x(),
                        tblb.y(),
                        tblb.angle(),
                        tblb.width(),
                        tblb.height(),
                        tblb.area(),
                        self.path_capacity,
                    );
                    self.stores.blobs.lock().insert(sid, added.clone());
                    self.listeners.each(|l| l.blob_added(&added));
                }
                _ => {
                    let updated = {
                        let mut store = self.stores.blobs.lock();
                        let Some(auth) = store.get_mut(&sid) else {
                            continue;
                        };
                        if position_moved_without_velocity(&tblb, auth) {
                            auth.update_derived(
                                time,
                                tblb.x(),
                                tblb.y(),
                                tblb.angle(),
                                tblb.width(),
                                tblb.height(),
                                tblb.area(),
                            );
                        } else {
                            auth.update_raw(
                                time,
                                tblb.x(),
                                tblb.y(),
                                tblb.angle(),
                                tblb.width(),
                                tblb.height(),
                                tblb.area(),
                                tblb.x_speed(),
                                tblb.y_speed(),
                                tblb.rotation_speed(),
                                tblb.motion_accel(),
                                tblb.rotation_accel(),
                            );
                        }
                        auth.clone()
                    };
                    self.listeners.each(|l| l.blob_updated(&updated));
                }
            }
        }
        self.notify_refresh(time);
        self.blobs.finish(true);
    }

    // ---- 3D objects -----------------------------------------------------

    fn set_object_3d(&mut self, args: &Args<'_>) {
        let sid = args.session(1);
        let symbol_id = args.int(2);
        let x = args.float(3);
        let y = args.float(4);
        let z = args.float(5);
        let angle_x = args.float(6);
        let angle_y = args.float(7);
        let angle_z = args.float(8);
        let x_speed = args.float(9);
        let y_speed = args.float(10);
        let z_speed = args.float(11);
        let rotation_speed_x = args.float(12);
        let rotation_speed_y = args.float(13);
        let rotation_speed_z = args.float(14);
        let motion_accel = args.float(15);
        let rotation_accel = args.float(16);

        let staged = {
            let store = self.stores.objects_3d.lock();
            match store.get(&sid) {
                None => Some(Tuio3DObject::new(
                    self.clock.time(),
                    sid,
                    symbol_id,
                    x,
                    y,
                    z,
                    angle_x,
                    angle_y,
                    angle_z,
                    self.path_capacity,
                )),
                Some(existing)
                    if existing.x() != x
                        || existing.y() != y
                        || existing.z() != z
                        || existing.angle_x() != angle_x
                        || existing.angle_y() != angle_y
                        || existing.angle_z() != angle_z
                        || existing.x_speed() != x_speed
                        || existing.y_speed() != y_speed
                        || existing.z_speed() != z_speed
                        || existing.rotation_speed_x() != rotation_speed_x
                        || existing.rotation_speed_y() != rotation_speed_y
                        || existing.rotation_speed_z() != rotation_speed_z
                        || existing.motion_accel() != motion_accel
                        || existing.rotation_accel() != rotation_accel =>
                {
                    let mut update = existing.clone();
                    update.apply_raw(
                        x,
                        y,
                        z,
                        angle_x,
                        angle_y,
                        angle_z,
                        x_speed,
                        y_speed,
                        z_speed,
                        rotation_speed_x,
                        rotation_speed_y,
                        rotation_speed_z,
                        motion_accel,
                        rotation_accel,
                    );
                    Some(update)
                }
                Some(_) => None,
            }
        };
        if let Some(entity) = staged {
            self.objects_3d.stage(entity);
        }
    }

    fn alive_objects_3d(&mut self, args: &Args<'_>) {
        let ids: Vec<SessionId> = args.sessions_from(1).collect();
        let time = self.clock.session_now();
        self.objects_3d
            .observe_alive(ids, &self.stores.objects_3d, time, |e, t| e.mark_removed(t));
    }

    fn fseq_objects_3d(&mut self, fseq: i32) {
        let Some(time) = self.frame_verdict(fseq) else {
            self.objects_3d.finish(false);
            return;
        };
        let staged = std::mem::take(&mut self.objects_3d.staged);
        for mut tobj in staged {
            let sid = tobj.session_id();
            match tobj.state() {
                TuioState::Removed => {
                    tobj.mark_removed(time);
                    self.listeners.each(|l| l.object_3d_removed(&tobj));
                    self.stores.objects_3d.lock().remove(&sid);
                }
                TuioState::Added => {
                    let added = Tuio3DObject::new(
                        time,
                        sid,
                        tobj.symbol_id(),
                        tobj.x(),
                        tobj.y(),
                        tobj.z(),
                        tobj.angle_x(),
                        tobj.angle_y(),
                        tobj.angle_z(),
                        self.path_capacity,
                    );
                    self.stores.objects_3d.lock().insert(sid, added.clone());
                    self.listeners.each(|l| l.object_3d_added(&added));
                }
                _ => {
                    let updated = {
                        let mut store = self.stores.objects_3d.lock();
                        let Some(auth) = store.get_mut(&sid) else {
                            continue;
                        };
                        if position_moved_without_velocity(&tobj, auth) {
                            auth.update_derived(
                                time,
                                tobj.x(),
                                tobj.y(),
                                tobj.z(),
                                tobj.angle_x(),
                                tobj.angle_y(),
                                tobj.angle_z(),
                            );
                        } else {
                            auth.update_raw(
                                time,
                                tobj.x(),
                                tobj.y(),
                                tobj.z(),
                                tobj.angle_x(),
                                tobj.angle_y(),
                                tobj.angle_z(),
                                tobj.x_speed(),
                                tobj.y_speed(),
                                tobj.z_speed(),
                                tobj.rotation_speed_x(),
                                tobj.rotation_speed_y(),
                                tobj.rotation_speed_z(),
                                tobj.motion_accel(),
                                tobj.rotation_accel(),
                            );
                        }
                        auth.clone()
                    };
                    self.listeners.each(|l| l.object_3d_updated(&updated));
                }
            }
        }
        self.notify_refresh(time);
        self.objects_3d.finish(true);
    }

    // ---- 3D cursors -----------------------------------------------------

    fn set_cursor_3d(&mut self, args: &Args<'_>) {
        let sid = args.session(1);
        let x = args.float(2);
        let y = args.float(3);
        let z = args.float(4);
        let x_speed = args.float(5);
        let y_speed = args.float(6);
        let z_speed = args.float(7);
        // The 3Dcur profile carries no usable acceleration argument.
        let motion_accel = 0.0;

        let staged = {
            let store = self.stores.cursors_3d.lock();
            match store.get(&sid) {
                None => Some(Tuio3DCursor::new(
                    self.clock.time(),
                    sid,
                    UNASSIGNED_CURSOR_ID,
                    x,
                    y,
                    z,
                    self.path_capacity,
                )),
                Some(existing)
                    if existing.x() != x
                        || existing.y() != y
                        || existing.z() != z
                        || existing.x_speed() != x_speed
                        || existing.y_speed() != y_speed
                        || existing.z_speed() != z_speed
                        || existing.motion_accel() != motion_accel =>
                {
                    let mut update = existing.clone();
                    update.apply_raw(x, y, z, x_speed, y_speed, z_speed, motion_accel);
                    Some(update)
                }
                Some(_) => None,
            }
        };
        if let Some(entity) = staged {
            self.cursors_3d.stage(entity);
        }
    }

    fn alive_cursors_3d(&mut self, args: &Args<'_>) {
        let ids: Vec<SessionId> = args.sessions_from(1).collect();
        let time = self.clock.session_now();
        self.cursors_3d
            .observe_alive(ids, &self.stores.cursors_3d, time, |e, t| e.mark_removed(t));
    }

    fn fseq_cursors_3d(&mut self, fseq: i32) {
        let Some(time) = self.frame_verdict(fseq) else {
            self.cursors_3d.finish(false);
            return;
        };
        let staged = std::mem::take(&mut self.cursors_3d.staged);
        for mut tcur in staged {
            let sid = tcur.session_id();
            match tcur.state() {
                TuioState::Removed => {
                    tcur.mark_removed(time);
                    self.listeners.each(|l| l.cursor_3d_removed(&tcur));
                    let mut store = self.stores.cursors_3d.lock();
                    if store.remove(&sid).is_some() {
                        self.cursor_3d_ids.release(
                            tcur.cursor_id(),
                            tcur.x(),
                            tcur.y(),
                            tcur.z(),
                            store.values().map(Tuio3DCursor::cursor_id),
                        );
                    }
                }
                TuioState::Added => {
                    let mut store = self.stores.cursors_3d.lock();
                    let cursor_id =
                        self.cursor_3d_ids
                            .assign(store.len(), tcur.x(), tcur.y(), tcur.z());
                    let added = Tuio3DCursor::new(
                        time,
                        sid,
                        cursor_id,
                        tcur.x(),
                        tcur.y(),
                        tcur.z(),
                        self.path_capacity,
                    );
                    store.insert(sid, added.clone());
                    drop(store);
                    self.listeners.each(|l| l.cursor_3d_added(&added));
                }
                _ => {
                    let updated = {
                        let mut store = self.stores.cursors_3d.lock();
                        let Some(auth) = store.get_mut(&sid) else {
                            continue;
                        };
                        if position_moved_without_velocity(&tcur, auth) {
                            auth.update_derived(time, tcur.x(), tcur.y(), tcur.z());
                        } else {
                            auth.update_raw(
                                time,
                                tcur.x(),
                                tcur.y(),
                                tcur.z(),
                                tcur.x_speed(),
                                tcur.y_speed(),
                                tcur.z_speed(),
                                tcur.motion_accel(),
                            );
                        }
                        auth.clone()
                    };
                    self.listeners.each(|l| l.cursor_3d_updated(&updated));
                }
            }
        }
        self.notify_refresh(time);
        self.cursors_3d.finish(true);
    }
}

/// True when the staged update moved an axis while claiming zero
/// velocity on it. Such senders do not compute derivatives, so the
/// client numerically differentiates instead of trusting the zeros.
fn position_moved_without_velocity<E: TuioContainer>(staged: &E, current: &E) -> bool {
    (staged.x() != current.x() && staged.x_speed() == 0.0)
        || (staged.y() != current.y() && staged.y_speed() == 0.0)
        || (staged.z() != current.z() && staged.z_speed() == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::OscType;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        CursorAdded(SessionId, i32),
        CursorUpdated(SessionId),
        CursorRemoved(SessionId),
        ObjectAdded(SessionId, i32),
        ObjectUpdated(SessionId),
        ObjectRemoved(SessionId),
        BlobAdded(SessionId),
        Refresh,
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock())
        }
        fn push(&self, event: Event) {
            self.events.lock().push(event);
        }
    }

    impl crate::listener::TuioListener for Recorder {
        fn cursor_added(&self, cursor: &TuioCursor) {
            self.push(Event::CursorAdded(cursor.session_id(), cursor.cursor_id()));
        }
        fn cursor_updated(&self, cursor: &TuioCursor) {
            self.push(Event::CursorUpdated(cursor.session_id()));
        }
        fn cursor_removed(&self, cursor: &TuioCursor) {
            self.push(Event::CursorRemoved(cursor.session_id()));
        }
        fn object_added(&self, object: &TuioObject) {
            self.push(Event::ObjectAdded(object.session_id(), object.symbol_id()));
        }
        fn object_updated(&self, object: &TuioObject) {
            self.push(Event::ObjectUpdated(object.session_id()));
        }
        fn object_removed(&self, object: &TuioObject) {
            self.push(Event::ObjectRemoved(object.session_id()));
        }
        fn blob_added(&self, blob: &TuioBlob) {
            self.push(Event::BlobAdded(blob.session_id()));
        }
        fn refresh(&self, _time: TuioTime) {
            self.push(Event::Refresh);
        }
    }

    struct Fixture {
        decoder: ProtocolDecoder,
        stores: Arc<EntityStores>,
        recorder: Arc<Recorder>,
    }

    fn fixture() -> Fixture {
        let stores = Arc::new(EntityStores::default());
        let listeners = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        listeners.add(recorder.clone());
        Fixture {
            decoder: ProtocolDecoder::new(stores.clone(), listeners, 128),
            stores,
            recorder,
        }
    }

    fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.into(),
            args,
        })
    }

    fn cursor_set(sid: i32, x: f32, y: f32, xs: f32, ys: f32, ma: f32) -> OscPacket {
        message(
            PROFILE_2D_CUR,
            vec![
                OscType::String("set".into()),
                OscType::Int(sid),
                OscType::Float(x),
                OscType::Float(y),
                OscType::Float(xs),
                OscType::Float(ys),
                OscType::Float(ma),
            ],
        )
    }

    fn cursor_alive(ids: &[i32]) -> OscPacket {
        let mut args = vec![OscType::String("alive".into())];
        args.extend(ids.iter().map(|&id| OscType::Int(id)));
        message(PROFILE_2D_CUR, args)
    }

    fn cursor_fseq(fseq: i32) -> OscPacket {
        message(
            PROFILE_2D_CUR,
            vec![OscType::String("fseq".into()), OscType::Int(fseq)],
        )
    }

    #[test]
    fn test_cursor_add_commits_on_fseq() {
        let mut fx = fixture();
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        // Nothing visible before the frame commits.
        assert!(fx.stores.cursors.lock().is_empty());
        assert!(fx.recorder.take().is_empty());

        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(1));

        assert_eq!(
            fx.recorder.take(),
            vec![Event::CursorAdded(5, 0), Event::Refresh]
        );
        let store = fx.stores.cursors.lock();
        let cursor = store.get(&5).expect("cursor 5 live");
        assert_eq!(cursor.x_speed(), 0.0);
        assert_eq!(cursor.state(), TuioState::Added);
    }

    #[test]
    fn test_cursor_update_derives_velocity_from_zero_speed_sender() {
        let mut fx = fixture();
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(1));
        fx.recorder.take();

        std::thread::sleep(std::time::Duration::from_millis(20));
        fx.decoder.process_packet(&cursor_set(5, 0.2, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(2));

        assert_eq!(
            fx.recorder.take(),
            vec![Event::CursorUpdated(5), Event::Refresh]
        );
        let store = fx.stores.cursors.lock();
        let cursor = store.get(&5).unwrap();
        assert!(cursor.x_speed() > 0.0, "x_speed = {}", cursor.x_speed());
        assert_eq!(cursor.y_speed(), 0.0);
    }

    #[test]
    fn test_cursor_update_trusts_sender_velocity() {
        let mut fx = fixture();
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(1));
        fx.recorder.take();

        fx.decoder.process_packet(&cursor_set(5, 0.2, 0.1, 2.5, 0.5, 1.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(2));

        let store = fx.stores.cursors.lock();
        let cursor = store.get(&5).unwrap();
        assert_eq!(cursor.x_speed(), 2.5);
        assert_eq!(cursor.y_speed(), 0.5);
        assert_eq!(cursor.motion_accel(), 1.0);
    }

    #[test]
    fn test_identical_set_is_deduplicated() {
        let mut fx = fixture();
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(1));
        fx.recorder.take();

        // Same values again: no update event, only the refresh.
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(2));
        assert_eq!(fx.recorder.take(), vec![Event::Refresh]);
    }

    #[test]
    fn test_removed_cursor_queryable_until_callback_returns() {
        struct RemoveWatcher {
            stores: Arc<EntityStores>,
            live_during_callback: Mutex<Option<bool>>,
            removed_time: Mutex<Option<TuioTime>>,
            refresh_time: Mutex<Option<TuioTime>>,
        }

        impl crate::listener::TuioListener for RemoveWatcher {
            fn cursor_removed(&self, cursor: &TuioCursor) {
                let live = self.stores.cursors.lock().contains_key(&cursor.session_id());
                *self.live_during_callback.lock() = Some(live);
                *self.removed_time.lock() = Some(cursor.time());
            }
            fn refresh(&self, time: TuioTime) {
                *self.refresh_time.lock() = Some(time);
            }
        }

        let stores = Arc::new(EntityStores::default());
        let listeners = ListenerRegistry::new();
        let watcher = Arc::new(RemoveWatcher {
            stores: stores.clone(),
            live_during_callback: Mutex::new(None),
            removed_time: Mutex::new(None),
            refresh_time: Mutex::new(None),
        });
        listeners.add(watcher.clone());
        let mut decoder = ProtocolDecoder::new(stores.clone(), listeners, 128);

        decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        decoder.process_packet(&cursor_alive(&[5]));
        decoder.process_packet(&cursor_fseq(1));
        decoder.process_packet(&cursor_alive(&[]));
        decoder.process_packet(&cursor_fseq(2));

        // The store still holds the cursor while the callback runs and
        // drops it only once the callbacks have returned.
        assert_eq!(*watcher.live_during_callback.lock(), Some(true));
        assert!(stores.cursors.lock().is_empty());
        // The removal payload carries the committed frame time.
        assert!(watcher.removed_time.lock().is_some());
        assert_eq!(*watcher.removed_time.lock(), *watcher.refresh_time.lock());
    }

    #[test]
    fn test_missing_alive_id_removes_cursor() {
        let mut fx = fixture();
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(1));
        fx.recorder.take();

        fx.decoder.process_packet(&cursor_alive(&[]));
        fx.decoder.process_packet(&cursor_fseq(2));

        assert_eq!(
            fx.recorder.take(),
            vec![Event::CursorRemoved(5), Event::Refresh]
        );
        assert!(fx.stores.cursors.lock().is_empty());
    }

    #[test]
    fn test_late_frame_is_dropped_whole() {
        let mut fx = fixture();
        fx.decoder.process_packet(&cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[5]));
        fx.decoder.process_packet(&cursor_fseq(10));
        fx.recorder.take();

        // An older frame must not mutate anything, including removals.
        fx.decoder.process_packet(&cursor_set(5, 0.9, 0.9, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[]));
        fx.decoder.process_packet(&cursor_fseq(9));

        assert!(fx.recorder.take().is_empty());
        let store = fx.stores.cursors.lock();
        assert_eq!(store.get(&5).unwrap().x(), 0.1);
    }

    #[test]
    fn test_display_id_recycled_to_nearest_touch() {
        let mut fx = fixture();
        for (sid, x) in [(1, 0.1f32), (2, 0.5), (3, 0.9)] {
            fx.decoder.process_packet(&cursor_set(sid, x, 0.5, 0.0, 0.0, 0.0));
        }
        fx.decoder.process_packet(&cursor_alive(&[1, 2, 3]));
        fx.decoder.process_packet(&cursor_fseq(1));
        fx.recorder.take();

        // Middle cursor lifts.
        fx.decoder.process_packet(&cursor_alive(&[1, 3]));
        fx.decoder.process_packet(&cursor_fseq(2));
        fx.recorder.take();

        // A new touch near the lifted position takes over display ID 1.
        fx.decoder.process_packet(&cursor_set(4, 0.52, 0.5, 0.0, 0.0, 0.0));
        fx.decoder.process_packet(&cursor_alive(&[1, 3, 4]));
        fx.decoder.process_packet(&cursor_fseq(3));

        assert!(fx
            .recorder
            .take()
            .contains(&Event::CursorAdded(4, 1)));
    }

    #[test]
    fn test_object_lifecycle() {
        let mut fx = fixture();
        let set = |x: f32, xs: f32| {
            message(
                PROFILE_2D_OBJ,
                vec![
                    OscType::String("set".into()),
                    OscType::Int(7),
                    OscType::Int(42),
                    OscType::Float(x),
                    OscType::Float(0.5),
                    OscType::Float(0.0),
                    OscType::Float(xs),
                    OscType::Float(0.0),
                    OscType::Float(0.0),
                    OscType::Float(0.0),
                    OscType::Float(0.0),
                ],
            )
        };
        let alive = |ids: &[i32]| {
            let mut args = vec![OscType::String("alive".into())];
            args.extend(ids.iter().map(|&id| OscType::Int(id)));
            message(PROFILE_2D_OBJ, args)
        };
        let fseq = |n: i32| {
            message(
                PROFILE_2D_OBJ,
                vec![OscType::String("fseq".into()), OscType::Int(n)],
            )
        };

        fx.decoder.process_packet(&set(0.5, 0.0));
        fx.decoder.process_packet(&alive(&[7]));
        fx.decoder.process_packet(&fseq(1));
        assert_eq!(
            fx.recorder.take(),
            vec![Event::ObjectAdded(7, 42), Event::Refresh]
        );

        fx.decoder.process_packet(&set(0.6, 1.0));
        fx.decoder.process_packet(&alive(&[7]));
        fx.decoder.process_packet(&fseq(2));
        assert_eq!(
            fx.recorder.take(),
            vec![Event::ObjectUpdated(7), Event::Refresh]
        );
        assert_eq!(fx.stores.objects.lock().get(&7).unwrap().x_speed(), 1.0);

        fx.decoder.process_packet(&alive(&[]));
        fx.decoder.process_packet(&fseq(3));
        assert_eq!(
            fx.recorder.take(),
            vec![Event::ObjectRemoved(7), Event::Refresh]
        );
        assert!(fx.stores.objects.lock().is_empty());
    }

    #[test]
    fn test_bundle_processes_in_order() {
        let mut fx = fixture();
        let bundle = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                cursor_set(5, 0.1, 0.1, 0.0, 0.0, 0.0),
                cursor_alive(&[5]),
                cursor_fseq(1),
            ],
        });
        fx.decoder.process_packet(&bundle);
        assert_eq!(
            fx.recorder.take(),
            vec![Event::CursorAdded(5, 0), Event::Refresh]
        );
    }

    #[test]
    fn test_blob_set_commits_geometry() {
        let mut fx = fixture();
        fx.decoder.process_packet(&message(
            PROFILE_2D_BLB,
            vec![
                OscType::String("set".into()),
                OscType::Int(9),
                OscType::Float(0.4),
                OscType::Float(0.4),
                OscType::Float(0.0),
                OscType::Float(0.1),
                OscType::Float(0.2),
                OscType::Float(0.02),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
            ],
        ));
        fx.decoder.process_packet(&message(
            PROFILE_2D_BLB,
            vec![OscType::String("alive".into()), OscType::Int(9)],
        ));
        fx.decoder.process_packet(&message(
            PROFILE_2D_BLB,
            vec![OscType::String("fseq".into()), OscType::Int(1)],
        ));
        assert_eq!(
            fx.recorder.take(),
            vec![Event::BlobAdded(9), Event::Refresh]
        );
        let store = fx.stores.blobs.lock();
        let blob = store.get(&9).unwrap();
        assert_eq!(blob.width(), 0.1);
        assert_eq!(blob.height(), 0.2);
    }

    #[test]
    fn test_unknown_address_is_ignored() {
        let mut fx = fixture();
        fx.decoder.process_packet(&message(
            "/tuio/25Dobj",
            vec![OscType::String("set".into()), OscType::Int(1)],
        ));
        assert!(fx.recorder.take().is_empty());
    }
}
