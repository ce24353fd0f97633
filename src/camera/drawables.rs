//! Lazily materialized, visibility-gated visuals for world objects.
//!
//! Drawables enter through an explicit FIFO queue and get their visual
//! materialized the first time the queue drains — always before the tick's
//! regular update pass touches them. After that, a per-tick visibility
//! check attaches or detaches the visual without destroying it. Removal is
//! deferred: an entry marked for removal is detached and dropped on the
//! following tick, so the active tick's iteration is never mutated
//! mid-walk.

use super::IsometricProjector;
use std::collections::VecDeque;

/// Contract for world objects that own a visual.
pub trait Drawable {
    /// Visibility predicate consulted every tick against the camera state.
    fn is_visible(&self, projector: &IsometricProjector) -> bool;

    /// Called when the visual is created or re-attached.
    fn on_attach_visual(&mut self);

    /// Called when the visual is hidden; the visual is not destroyed.
    fn on_detach_visual(&mut self);

    /// Per-tick update, run only after the visual has been materialized.
    fn update(&mut self, projector: &IsometricProjector);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DrawableId(u64);

struct Slot {
    id: DrawableId,
    drawable: Box<dyn Drawable>,
    attached: bool,
    /// Set by `mark_for_removal`; promoted to `doomed` at the end of the
    /// tick in which it was observed.
    marked: bool,
    /// Entries doomed in a previous tick are dropped at the start of the
    /// next one.
    doomed: bool,
}

#[derive(Default)]
pub struct DrawableLifecycle {
    pending: VecDeque<Slot>,
    active: Vec<Slot>,
    next_id: u64,
}

impl DrawableLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a drawable for materialization on the next tick's drain.
    pub fn enqueue(&mut self, drawable: Box<dyn Drawable>) -> DrawableId {
        let id = DrawableId(self.next_id);
        self.next_id += 1;
        self.pending.push_back(Slot {
            id,
            drawable,
            attached: false,
            marked: false,
            doomed: false,
        });
        id
    }

    /// Flag an entry for removal. It stays tracked through the tick that
    /// observes the mark and is detached and dropped on the one after.
    pub fn mark_for_removal(&mut self, id: DrawableId) {
        if let Some(slot) = self
            .active
            .iter_mut()
            .chain(self.pending.iter_mut())
            .find(|slot| slot.id == id)
        {
            slot.marked = true;
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.active.len() + self.pending.len()
    }

    pub fn is_attached(&self, id: DrawableId) -> bool {
        self.active
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.attached)
            .unwrap_or(false)
    }

    pub fn tick(&mut self, projector: &IsometricProjector) {
        // 1. Drop everything doomed in an earlier tick.
        self.active.retain_mut(|slot| {
            if slot.doomed {
                if slot.attached {
                    slot.drawable.on_detach_visual();
                    slot.attached = false;
                }
                false
            } else {
                true
            }
        });

        // 2. Drain the enqueue FIFO in order, materializing visuals before
        //    any update runs this tick.
        while let Some(mut slot) = self.pending.pop_front() {
            slot.drawable.on_attach_visual();
            slot.attached = true;
            self.active.push(slot);
        }

        // 3. Regular update pass: visibility gating, then the per-tick
        //    update for everything still attached.
        for slot in &mut self.active {
            let visible = slot.drawable.is_visible(projector);
            if visible && !slot.attached {
                slot.drawable.on_attach_visual();
                slot.attached = true;
            } else if !visible && slot.attached {
                slot.drawable.on_detach_visual();
                slot.attached = false;
            }
            slot.drawable.update(projector);
        }

        // 4. Promote marks observed this tick; removal lands next tick.
        for slot in &mut self.active {
            if slot.marked {
                slot.doomed = true;
            }
        }
    }
}
