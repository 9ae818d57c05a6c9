//! Cursor Display ID Allocation
//!
//! Cursors get a dense display ID next to their session ID so consumers
//! can map fingers to fixed-size resources. When a cursor lifts while
//! lower-numbered cursors stay down, its slot is remembered together
//! with its last position; the next new cursor takes the free slot
//! closest to where it appears, which keeps IDs stable across quick
//! lift-and-retouch sequences. The 2D and 3D cursor families each own
//! an independent allocator.

/// A recycled display ID and where its previous owner lifted.
#[derive(Debug, Clone, Copy)]
struct FreeSlot {
    id: i32,
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug)]
pub(crate) struct DisplayIdAllocator {
    free: Vec<FreeSlot>,
    max_id: i32,
}

impl DisplayIdAllocator {
    pub(crate) fn new() -> Self {
        DisplayIdAllocator {
            free: Vec::new(),
            max_id: -1,
        }
    }

    /// Picks a display ID for a new cursor appearing at the given point.
    ///
    /// `live_count` is the number of cursors already live in this
    /// family, which doubles as the next fresh ID when no slot can be
    /// recycled.
    pub(crate) fn assign(&mut self, live_count: usize, x: f32, y: f32, z: f32) -> i32 {
        let fresh = live_count as i32;
        if fresh <= self.max_id && !self.free.is_empty() {
            let nearest = self
                .free
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    distance_sq(a, x, y, z)
                        .partial_cmp(&distance_sq(b, x, y, z))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);
            if let Some(index) = nearest {
                return self.free.remove(index).id;
            }
        }
        self.max_id = fresh;
        fresh
    }

    /// Returns a display ID to the pool when its cursor is removed.
    ///
    /// `live_ids` are the display IDs of the cursors still live after
    /// the removal. Releasing the highest ID shrinks the pool instead
    /// of growing it.
    pub(crate) fn release(
        &mut self,
        id: i32,
        x: f32,
        y: f32,
        z: f32,
        live_ids: impl Iterator<Item = i32>,
    ) {
        if id == self.max_id {
            self.max_id = live_ids.max().unwrap_or(-1);
            if self.max_id < 0 {
                self.free.clear();
            } else {
                let ceiling = self.max_id;
                self.free.retain(|slot| slot.id < ceiling);
            }
        } else if id < self.max_id {
            self.free.push(FreeSlot { id, x, y, z });
        }
    }

    pub(crate) fn reset(&mut self) {
        self.free.clear();
        self.max_id = -1;
    }
}

fn distance_sq(slot: &FreeSlot, x: f32, y: f32, z: f32) -> f32 {
    let dx = slot.x - x;
    let dy = slot.y - y;
    let dz = slot.z - z;
    dx * dx + dy * dy + dz * dz
}
