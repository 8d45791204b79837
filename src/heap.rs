//! The arena root: every piece of collector-visible state the bridge keeps.
use crate::{
    config::RuntimeConfig,
    error::Result,
    memory::{
        compute_address, BufferFactory, BufferRegistry, EmbeddedReferenceStore,
        FinalizationCoordinator, HandleTable, KeepAliveTable, RegistrationMode, Release,
    },
    value::{Buffer, HostObject, ObjectRef, Region, Value},
};
use crossbeam_channel::Sender;
use gc_arena::{Collect, Collection, Finalization, Gc, Mutation};

pub struct Heap<'gc> {
    pub(crate) config: RuntimeConfig,
    pub(crate) null: Gc<'gc, Region<'gc>>,
    pub(crate) factory: BufferFactory,
    pub(crate) registry: BufferRegistry<'gc>,
    pub(crate) finalizer: FinalizationCoordinator<'gc>,
    pub(crate) keep_alive: KeepAliveTable<'gc>,
    pub(crate) embedded: EmbeddedReferenceStore<'gc>,
    pub(crate) handles: HandleTable<'gc>,
}

unsafe impl<'gc> Collect for Heap<'gc> {
    fn trace(&self, cc: &Collection) {
        self.null.trace(cc);
        self.registry.trace(cc);
        self.finalizer.trace(cc);
        self.keep_alive.trace(cc);
        self.embedded.trace(cc);
        self.handles.trace(cc);
    }
}

impl<'gc> Heap<'gc> {
    pub fn new(gc: &Mutation<'gc>, config: RuntimeConfig, outbox: Sender<Release>) -> Self {
        Self {
            config,
            null: Gc::new(gc, Region::null(gc)),
            factory: BufferFactory::new(&config),
            registry: BufferRegistry::new(),
            finalizer: FinalizationCoordinator::new(outbox),
            keep_alive: KeepAliveTable::new(),
            embedded: EmbeddedReferenceStore::new(),
            handles: HandleTable::new(),
        }
    }

    /// The zero-length buffer at address 0. Always the same region.
    pub fn null(&self) -> Buffer<'gc> {
        Buffer::new(self.null, 0, 0)
    }

    /// Zero-initialised host memory of `len` bytes.
    pub fn alloc(&mut self, gc: &Mutation<'gc>, len: usize) -> Result<Buffer<'gc>> {
        let region = self.factory.allocate_host(gc, len)?;
        self.finalizer.watch(region);
        Ok(Buffer::new(region, 0, len))
    }

    pub fn new_object(&self, gc: &Mutation<'gc>, class: &str) -> ObjectRef<'gc> {
        HostObject::alloc(gc, class)
    }

    /// The canonical view of `len` bytes at `address`.
    ///
    /// While a region is registered for `address` the result is a view of that same region,
    /// declaring exactly `len` bytes whatever the region originally framed. The null address
    /// gives the null buffer. Lengths above the configured maximum region size are rejected.
    ///
    /// # Safety
    /// `address..address + len` must stay valid for reads and writes for as long as any view of
    /// it is used.
    pub unsafe fn wrap(
        &mut self,
        gc: &Mutation<'gc>,
        address: usize,
        len: usize,
    ) -> Result<Buffer<'gc>> {
        if address == 0 {
            return Ok(self.null());
        }
        self.factory.check_len(len)?;
        let region =
            self.registry
                .lookup_or_create(gc, address, len, &mut self.factory, &self.finalizer);
        Ok(Buffer::new(region, 0, len))
    }

    /// `base(buffer) + offset`. Handing out an address registers the buffer's region as the
    /// canonical owner of its base address if nothing else owns it.
    pub fn address(&mut self, gc: &Mutation<'gc>, buffer: Buffer<'gc>, offset: i64) -> usize {
        self.registry.register(
            gc,
            buffer.region(),
            RegistrationMode::PassedIn,
            &self.finalizer,
        );
        compute_address(&buffer, offset)
    }

    /// A full view of the live region registered for `address`.
    pub fn canonical(&self, gc: &Mutation<'gc>, address: usize) -> Option<Buffer<'gc>> {
        self.registry
            .canonical(gc, address)
            .map(|region| Buffer::new(region, 0, region.len()))
    }

    pub fn live_count(&self, address: usize) -> usize {
        self.registry.live_count(address)
    }

    /// Keeps `value` alive for as long as `holder`'s region is reachable. The edge is traced
    /// through the region, so holders that reference each other can still be collected.
    pub fn attach(&self, gc: &Mutation<'gc>, holder: Buffer<'gc>, value: Value<'gc>) -> bool {
        holder.region().attach(gc, value)
    }

    pub fn registry(&self) -> &BufferRegistry<'gc> {
        &self.registry
    }

    pub fn keep_alive(&self) -> &KeepAliveTable<'gc> {
        &self.keep_alive
    }

    pub fn embedded(&self) -> &EmbeddedReferenceStore<'gc> {
        &self.embedded
    }

    /// Finalize-pass hook. Posts releases for dead regions without touching anything else.
    pub fn finalize_check(&self, fc: &Finalization<'gc>) -> usize {
        self.finalizer.finalize_check(fc)
    }

    /// Undoes everything the released region was holding.
    pub fn apply_release(&mut self, gc: &Mutation<'gc>, release: Release) {
        let links = self.keep_alive.release(release.region);
        let remaining = release
            .registered
            .then(|| self.registry.unregister(release.address));
        if let Some(len) = release.host_len {
            self.embedded.purge_owner(release.region);
            gc.metrics().mark_external_deallocation(len);
        }
        tracing::debug!(
            "released region #{} at {:#x}: {links} pins dropped, {remaining:?} registrations left",
            release.region.0,
            release.address
        );
    }

    /// Drops side-table entries whose referents are gone. Runs after each full collection.
    pub fn prune(&mut self, gc: &Mutation<'gc>) -> usize {
        let pruned = self.embedded.prune(gc);
        if pruned > 0 {
            tracing::trace!("pruned {pruned} dead embedded slots");
        }
        pruned
    }
}
