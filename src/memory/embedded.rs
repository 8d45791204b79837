//! Object references stored inside raw memory.
//!
//! Native memory cannot hold a collector pointer, so each write stores a fresh non-zero
//! token of [`ObjectHandle`] width at the target address and records `address -> (token, weak
//! object)` in a side table. A read trusts the side table only while the token in memory still
//! matches: if native code overwrote the slot, or the object was collected, the slot reads as
//! empty.
//!
//! Slots remember the region they were written through, so freeing that region forgets them
//! without touching slots later written into recycled memory at the same addresses. An
//! attached write also makes that region hold the object strongly, and only until the slot is
//! overwritten or cleared.
use crate::{
    capability::ObjectHandle,
    error::{RefError, Result},
    heap::Heap,
    value::{object::ObjectInner, Buffer, ObjectRef, Region, RegionId},
};
use gc_arena::{Collect, Collection, Gc, GcWeak, Mutation};
use std::collections::BTreeMap;

struct Slot<'gc> {
    token: ObjectHandle,
    owner: RegionId,
    holder: GcWeak<'gc, Region<'gc>>,
    target: GcWeak<'gc, ObjectInner<'gc>>,
    attached: bool,
}

unsafe impl<'gc> Collect for Slot<'gc> {
    fn trace(&self, cc: &Collection) {
        self.holder.trace(cc);
        self.target.trace(cc);
    }
}

impl<'gc> Slot<'gc> {
    /// Drops the strong edge an attached write left on its region.
    fn detach(&self, gc: &Mutation<'gc>, address: usize) {
        if !self.attached {
            return;
        }
        if let Some(holder) = self.holder.upgrade(gc) {
            holder.detach_slot(gc, address);
        }
    }
}

pub struct EmbeddedReferenceStore<'gc> {
    slots: BTreeMap<usize, Slot<'gc>>,
    next_token: ObjectHandle,
}

unsafe impl<'gc> Collect for EmbeddedReferenceStore<'gc> {
    fn trace(&self, cc: &Collection) {
        for slot in self.slots.values() {
            slot.trace(cc);
        }
    }
}

impl Default for EmbeddedReferenceStore<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'gc> EmbeddedReferenceStore<'gc> {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            // 0 marks an empty slot
            next_token: 1,
        }
    }

    /// Stores `target` in the slot at `address`, written through `holder`, replacing and
    /// releasing whatever was there. `None` clears the slot. With `attach`, `holder` keeps
    /// `target` alive until the slot changes again.
    ///
    /// # Safety
    /// `address` must be valid for an unaligned write of [`ObjectHandle`] width.
    pub unsafe fn write(
        &mut self,
        gc: &Mutation<'gc>,
        address: usize,
        holder: Gc<'gc, Region<'gc>>,
        target: Option<ObjectRef<'gc>>,
        attach: bool,
    ) {
        if let Some(previous) = self.slots.remove(&address) {
            previous.detach(gc, address);
        }

        let ptr = address as *mut ObjectHandle;
        let Some(object) = target else {
            ptr.write_unaligned(0);
            return;
        };

        let token = self.next_token;
        self.next_token += 1;
        ptr.write_unaligned(token);
        if attach {
            holder.attach_slot(gc, address, object);
        }
        self.slots.insert(
            address,
            Slot {
                token,
                owner: holder.id(),
                holder: Gc::downgrade(holder),
                target: Gc::downgrade(object),
                attached: attach,
            },
        );
    }

    /// The object stored at `address`, or `None` when the slot is empty, was overwritten from
    /// native code, or its object has been collected.
    ///
    /// # Safety
    /// `address` must be valid for an unaligned read of [`ObjectHandle`] width.
    pub unsafe fn read(&self, gc: &Mutation<'gc>, address: usize) -> Option<ObjectRef<'gc>> {
        let token = (address as *const ObjectHandle).read_unaligned();
        if token == 0 {
            return None;
        }
        let slot = self.slots.get(&address)?;
        if slot.token != token {
            tracing::trace!("slot at {address:#x} was overwritten outside the store");
            return None;
        }
        slot.target.upgrade(gc)
    }

    /// Forgets every slot written through `owner`. Used once its memory is freed.
    pub fn purge_owner(&mut self, owner: RegionId) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.owner != owner);
        before - self.slots.len()
    }

    /// Forgets slots whose objects have been collected.
    pub fn prune(&mut self, gc: &Mutation<'gc>) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.target.upgrade(gc).is_some());
        before - self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<'gc> Heap<'gc> {
    /// Reads the object reference stored `offset` bytes into `buffer`.
    ///
    /// # Safety
    /// The computed address must be readable for [`ObjectHandle`] width.
    pub unsafe fn read_object(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
    ) -> Result<Option<ObjectRef<'gc>>> {
        let address = self.address(gc, buffer, offset);
        if address == 0 {
            return Err(RefError::null_dereference("readObject"));
        }
        Ok(self.embedded.read(gc, address))
    }

    /// Stores a weak reference to `object` `offset` bytes into `buffer`; `None` clears the slot.
    ///
    /// # Safety
    /// The computed address must be writable for [`ObjectHandle`] width.
    pub unsafe fn write_object(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        object: Option<ObjectRef<'gc>>,
    ) -> Result<()> {
        self.store_object(gc, buffer, offset, object, false)
    }

    /// Like [`Heap::write_object`], but `buffer` also keeps `object` alive until the slot is
    /// overwritten or cleared.
    ///
    /// # Safety
    /// The computed address must be writable for [`ObjectHandle`] width.
    pub unsafe fn write_object_attached(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        object: Option<ObjectRef<'gc>>,
    ) -> Result<()> {
        self.store_object(gc, buffer, offset, object, true)
    }

    unsafe fn store_object(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        object: Option<ObjectRef<'gc>>,
        attach: bool,
    ) -> Result<()> {
        let address = self.address(gc, buffer, offset);
        if address == 0 {
            return Err(RefError::null_dereference("writeObject"));
        }
        self.embedded
            .write(gc, address, buffer.region(), object, attach);
        Ok(())
    }
}
