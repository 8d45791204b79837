//! The canonical address map.
//!
//! Every raw address handed out to native code has at most one live [`Region`] registered for
//! it. Entries hold the region weakly together with a count of release callbacks still owed to
//! the entry; each finalized region that was registered delivers exactly one `unregister`.
//!
//! An entry can outlive its region: once the region is collected its weak reference is
//! cleared, but the entry stays until the pending release arrives. Registering a new region at
//! that address in the meantime re-establishes the reference and bumps the count, so the late
//! release only brings the count back down instead of evicting the new region.
use super::{factory::BufferFactory, finalize::FinalizationCoordinator};
use crate::value::Region;
use gc_arena::{Collect, Collection, Gc, GcWeak, Mutation};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMode {
    /// The registry framed the region itself and the creating path already owns its release.
    CreatedByRegistry,
    /// The region came from elsewhere and needs a release callback attached.
    PassedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First registration of this address.
    Established,
    /// The previous canonical region was already collected; this one replaces it.
    Reestablished,
    /// A live canonical region already owns this address. Nothing changed.
    AlreadyCanonical,
    /// The null address is never registered.
    Exempt,
}

impl Registration {
    pub fn took_effect(self) -> bool {
        matches!(self, Registration::Established | Registration::Reestablished)
    }
}

struct RegistryEntry<'gc> {
    canonical: GcWeak<'gc, Region<'gc>>,
    live_count: usize,
}

unsafe impl<'gc> Collect for RegistryEntry<'gc> {
    fn trace(&self, cc: &Collection) {
        self.canonical.trace(cc);
    }
}

impl<'gc> RegistryEntry<'gc> {
    fn canonical(&self, gc: &Mutation<'gc>) -> Option<Gc<'gc, Region<'gc>>> {
        self.canonical.upgrade(gc)
    }
}

#[derive(Default)]
pub struct BufferRegistry<'gc> {
    entries: HashMap<usize, RegistryEntry<'gc>>,
}

unsafe impl<'gc> Collect for BufferRegistry<'gc> {
    fn trace(&self, cc: &Collection) {
        for entry in self.entries.values() {
            entry.trace(cc);
        }
    }
}

impl<'gc> BufferRegistry<'gc> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        gc: &Mutation<'gc>,
        region: Gc<'gc, Region<'gc>>,
        mode: RegistrationMode,
        finalizer: &FinalizationCoordinator<'gc>,
    ) -> Registration {
        let address = region.address();
        if address == 0 {
            return Registration::Exempt;
        }

        let outcome = match self.entries.get_mut(&address) {
            None => {
                self.entries.insert(
                    address,
                    RegistryEntry {
                        canonical: Gc::downgrade(region),
                        live_count: 1,
                    },
                );
                Registration::Established
            }
            Some(entry) if entry.canonical.upgrade(gc).is_some() => Registration::AlreadyCanonical,
            Some(entry) => {
                entry.canonical = Gc::downgrade(region);
                entry.live_count += 1;
                Registration::Reestablished
            }
        };

        if outcome.took_effect() {
            tracing::trace!("registered {:?} ({outcome:?}, {mode:?})", *region);
            if mode == RegistrationMode::PassedIn {
                finalizer.attach_release(region);
            }
        }
        outcome
    }

    /// The live canonical region for `address`, if any.
    pub fn canonical(&self, gc: &Mutation<'gc>, address: usize) -> Option<Gc<'gc, Region<'gc>>> {
        self.entries.get(&address)?.canonical(gc)
    }

    /// Returns the canonical region for `address`, framing and registering a new one when the
    /// address has none. An existing region is returned whatever `len` asks for.
    pub fn lookup_or_create(
        &mut self,
        gc: &Mutation<'gc>,
        address: usize,
        len: usize,
        factory: &mut BufferFactory,
        finalizer: &FinalizationCoordinator<'gc>,
    ) -> Gc<'gc, Region<'gc>> {
        debug_assert_ne!(address, 0);
        if let Some(region) = self.canonical(gc, address) {
            return region;
        }

        let region = factory.frame_foreign(gc, address, len);
        finalizer.watch(region);
        let outcome = self.register(gc, region, RegistrationMode::CreatedByRegistry, finalizer);
        debug_assert!(outcome.took_effect());
        finalizer.attach_release(region);
        region
    }

    /// Drops one owed release for `address`, erasing the entry when none remain.
    /// Returns the remaining count.
    pub fn unregister(&mut self, address: usize) -> usize {
        let Some(entry) = self.entries.get_mut(&address) else {
            tracing::warn!("release for unregistered address {address:#x}");
            return 0;
        };
        entry.live_count -= 1;
        let remaining = entry.live_count;
        if remaining == 0 {
            self.entries.remove(&address);
            tracing::trace!("evicted {address:#x}");
        }
        remaining
    }

    pub fn live_count(&self, address: usize) -> usize {
        self.entries.get(&address).map_or(0, |e| e.live_count)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.entries.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
