//! Deferred release of collected regions.
//!
//! The collector tells us a region died only during the finalize pass, where nothing may be
//! mutated. Each dead region is turned into a [`Release`] message and posted to the owner's
//! channel; the owner applies it later, in an ordinary mutation, whenever it next drains the
//! queue.
use crate::value::{Region, RegionId};
use crossbeam_channel::Sender;
use gc_arena::{Collect, Collection, Finalization, Gc, GcWeak};
use std::{cell::RefCell, collections::HashMap};

/// What the owner must undo once a region is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub region: RegionId,
    pub address: usize,
    /// The registry owes this region one `unregister`.
    pub registered: bool,
    /// Byte length of host-owned memory that was freed with the region.
    pub host_len: Option<usize>,
}

struct Watch<'gc> {
    region: GcWeak<'gc, Region<'gc>>,
    address: usize,
    registered: bool,
    host_len: Option<usize>,
}

unsafe impl<'gc> Collect for Watch<'gc> {
    fn trace(&self, cc: &Collection) {
        self.region.trace(cc);
    }
}

impl Watch<'_> {
    fn release(&self, id: RegionId) -> Release {
        Release {
            region: id,
            address: self.address,
            registered: self.registered,
            host_len: self.host_len,
        }
    }
}

pub struct FinalizationCoordinator<'gc> {
    watches: RefCell<HashMap<RegionId, Watch<'gc>>>,
    outbox: Sender<Release>,
}

unsafe impl<'gc> Collect for FinalizationCoordinator<'gc> {
    fn trace(&self, cc: &Collection) {
        for watch in self.watches.borrow().values() {
            watch.trace(cc);
        }
    }
}

impl<'gc> FinalizationCoordinator<'gc> {
    pub fn new(outbox: Sender<Release>) -> Self {
        Self {
            watches: RefCell::new(HashMap::new()),
            outbox,
        }
    }

    /// Starts tracking `region` so its death produces a [`Release`]. Watching twice is harmless.
    pub fn watch(&self, region: Gc<'gc, Region<'gc>>) {
        let host_len = region.is_host().then(|| region.len());
        self.watches
            .borrow_mut()
            .entry(region.id())
            .or_insert_with(|| Watch {
                region: Gc::downgrade(region),
                address: region.address(),
                registered: false,
                host_len,
            });
    }

    /// Makes the release of `region` carry an `unregister` for its address.
    ///
    /// Called once per registration that took effect, so a region never owes more than one.
    pub fn attach_release(&self, region: Gc<'gc, Region<'gc>>) {
        self.watch(region);
        if let Some(w) = self.watches.borrow_mut().get_mut(&region.id()) {
            debug_assert!(!w.registered, "{:?} registered twice", *region);
            w.registered = true;
        }
    }

    #[cfg(test)]
    pub(crate) fn has_release(&self, id: RegionId) -> bool {
        self.watches.borrow().get(&id).is_some_and(|w| w.registered)
    }

    pub fn watched(&self) -> usize {
        self.watches.borrow().len()
    }

    /// Posts a release for every watched region the current cycle found dead.
    ///
    /// Runs inside `MarkedArena::finalize`. Returns how many releases were posted.
    pub fn finalize_check(&self, fc: &Finalization<'gc>) -> usize {
        let mut watches = self.watches.borrow_mut();
        let dead: Vec<RegionId> = watches
            .iter()
            .filter(|(_, w)| w.region.is_dead(fc))
            .map(|(id, _)| *id)
            .collect();

        for id in &dead {
            let Some(watch) = watches.remove(id) else {
                continue;
            };
            let release = watch.release(*id);
            tracing::debug!("region #{} at {:#x} finalized", id.0, release.address);
            if self.outbox.send(release).is_err() {
                // the runtime is shutting down and nobody will apply it
                tracing::trace!("release for region #{} dropped", id.0);
            }
        }
        dead.len()
    }
}
