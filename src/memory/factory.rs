use crate::{
    config::RuntimeConfig,
    error::{RefError, Result},
    value::{
        buffer::{OwnedMemory, Region},
        RegionId,
    },
};
use gc_arena::{Gc, Mutation};

/// Builds new regions. Region ids are never reused, so an id still names the right region in
/// release messages delivered long after the region itself was swept.
pub struct BufferFactory {
    next_id: u64,
    max_region_len: usize,
}

impl BufferFactory {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            // id 0 is the null region
            next_id: 1,
            max_region_len: config.max_region_len,
        }
    }

    fn next_id(&mut self) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Rejects lengths above the configured maximum region size.
    pub fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_region_len {
            return Err(RefError::TooLarge {
                len,
                max: self.max_region_len,
            });
        }
        Ok(())
    }

    /// Zeroed memory owned by the new region and reported to the collector as external bytes.
    pub fn allocate_host<'gc>(
        &mut self,
        gc: &Mutation<'gc>,
        len: usize,
    ) -> Result<Gc<'gc, Region<'gc>>> {
        self.check_len(len)?;
        let memory = OwnedMemory::zeroed(len)?;
        let region = Region::host(gc, self.next_id(), memory, len);
        gc.metrics().mark_external_allocation(len);
        tracing::trace!("allocated {region:?}");
        Ok(Gc::new(gc, region))
    }

    /// A zero-copy region framing `len` bytes of foreign memory at `address`.
    ///
    /// The length is cut only where it would wrap the address space; callers check it against
    /// the maximum first.
    pub fn frame_foreign<'gc>(
        &mut self,
        gc: &Mutation<'gc>,
        address: usize,
        len: usize,
    ) -> Gc<'gc, Region<'gc>> {
        debug_assert_ne!(address, 0, "the null address is never framed");
        let len = len.min(usize::MAX - address);
        let region = Region::foreign(gc, self.next_id(), address, len);
        tracing::trace!("framed {region:?}");
        Gc::new(gc, region)
    }
}
