use crate::{
    error::{RefError, Result},
    value::{ObjectRef, Value},
};
use gc_arena::{lock::RefLock, Collect, Collection, Gc, Mutation};
use std::{
    alloc::{self, Layout},
    collections::BTreeMap,
    fmt::{self, Debug, Formatter},
    ptr::NonNull,
};

/// Alignment of host allocations; enough for any primitive in the capability table.
pub const HOST_ALIGN: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Collect)]
#[collect(require_static)]
pub struct RegionId(pub u64);

/// Zeroed memory allocated on behalf of the host, freed when its region is swept.
pub struct OwnedMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl OwnedMemory {
    pub fn zeroed(len: usize) -> Result<Self> {
        let layout = Layout::from_size_align(len.max(1), HOST_ALIGN)
            .map_err(|_| RefError::Allocation(len))?;
        // SAFETY: layout has a non-zero size
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(RefError::Allocation(len))?;
        Ok(Self { ptr, layout })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for OwnedMemory {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with this exact layout
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

enum Origin {
    /// The process-wide zero-length region at address 0.
    Null,
    /// Allocated by the host; the region owns the bytes.
    Host(OwnedMemory),
    /// Memory owned by native code; the region only frames it.
    Foreign,
}

/// Values a region keeps alive for as long as it is itself reachable.
#[derive(Default)]
struct Attachments<'gc> {
    values: Vec<Value<'gc>>,
    /// Objects written into this region's memory, by slot address.
    slots: BTreeMap<usize, ObjectRef<'gc>>,
}

unsafe impl<'gc> Collect for Attachments<'gc> {
    fn trace(&self, cc: &Collection) {
        self.values.trace(cc);
        for object in self.slots.values() {
            object.trace(cc);
        }
    }
}

/// A contiguous byte region tracked by the collector.
///
/// Regions are the unit of identity: the registry maps a raw address to at most one live
/// region, and every [`Buffer`] is a view starting inside exactly one region.
pub struct Region<'gc> {
    id: RegionId,
    address: usize,
    len: usize,
    origin: Origin,
    attachments: Gc<'gc, RefLock<Attachments<'gc>>>,
}

unsafe impl<'gc> Collect for Region<'gc> {
    fn trace(&self, cc: &Collection) {
        self.attachments.trace(cc);
    }
}

impl<'gc> Region<'gc> {
    fn with_origin(
        gc: &Mutation<'gc>,
        id: RegionId,
        address: usize,
        len: usize,
        origin: Origin,
    ) -> Self {
        Self {
            id,
            address,
            len,
            origin,
            attachments: Gc::new(gc, RefLock::new(Attachments::default())),
        }
    }

    pub(crate) fn null(gc: &Mutation<'gc>) -> Self {
        Self::with_origin(gc, RegionId(0), 0, 0, Origin::Null)
    }

    pub(crate) fn host(gc: &Mutation<'gc>, id: RegionId, memory: OwnedMemory, len: usize) -> Self {
        let address = memory.as_ptr() as usize;
        Self::with_origin(gc, id, address, len, Origin::Host(memory))
    }

    pub(crate) fn foreign(gc: &Mutation<'gc>, id: RegionId, address: usize, len: usize) -> Self {
        Self::with_origin(gc, id, address, len, Origin::Foreign)
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn address(&self) -> usize {
        self.address
    }

    /// Bytes owned (host) or framed when the region was created.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(self.origin, Origin::Null)
    }

    pub fn is_host(&self) -> bool {
        matches!(self.origin, Origin::Host(_))
    }

    /// Traces `value` from this region. Scalars, references to the null region and references
    /// back to this region are dropped. Returns whether anything was attached.
    pub(crate) fn attach(&self, gc: &Mutation<'gc>, value: Value<'gc>) -> bool {
        if self.is_null() {
            return false;
        }
        match value {
            Value::Buffer(b) if b.region().id() == self.id || b.region().is_null() => return false,
            Value::Buffer(_) | Value::Object(_) | Value::Str(_) => {}
            _ => return false,
        }
        self.attachments.borrow_mut(gc).values.push(value);
        true
    }

    /// Keeps `object` alive through the slot at `address` until the slot is detached.
    pub(crate) fn attach_slot(&self, gc: &Mutation<'gc>, address: usize, object: ObjectRef<'gc>) {
        self.attachments.borrow_mut(gc).slots.insert(address, object);
    }

    pub(crate) fn detach_slot(&self, gc: &Mutation<'gc>, address: usize) -> bool {
        self.attachments.borrow_mut(gc).slots.remove(&address).is_some()
    }

    pub fn attachments(&self) -> usize {
        let a = self.attachments.borrow();
        a.values.len() + a.slots.len()
    }
}

impl Debug for Region<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match self.origin {
            Origin::Null => "null",
            Origin::Host(_) => "host",
            Origin::Foreign => "foreign",
        };
        write!(
            f,
            "Region#{} [{kind}] {:#x} ({} bytes)",
            self.id.0, self.address, self.len
        )
    }
}

/// A view of `len` bytes starting `offset` bytes into a region.
///
/// Only the start address of a view is tied to its region. Views built by the unsafe
/// constructors on [`Heap`](crate::heap::Heap) may declare more bytes than the region framed;
/// the caller of those constructors vouches for them.
#[derive(Copy, Clone)]
pub struct Buffer<'gc> {
    region: Gc<'gc, Region<'gc>>,
    offset: usize,
    len: usize,
}

unsafe impl<'gc> Collect for Buffer<'gc> {
    fn trace(&self, cc: &Collection) {
        self.region.trace(cc);
    }
}

impl<'gc> Buffer<'gc> {
    pub(crate) fn new(region: Gc<'gc, Region<'gc>>, offset: usize, len: usize) -> Self {
        Self {
            region,
            offset,
            len,
        }
    }

    pub fn region(&self) -> Gc<'gc, Region<'gc>> {
        self.region
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw address of the first byte of this view.
    pub fn address(&self) -> usize {
        self.region.address().wrapping_add(self.offset)
    }

    pub fn is_null(&self) -> bool {
        self.address() == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.address() as *mut u8
    }

    /// Whether both views share the same canonical region object.
    pub fn same_region(&self, other: &Buffer<'gc>) -> bool {
        Gc::ptr_eq(self.region, other.region)
    }

    /// A narrower view over `start..end` of this one, clamped to the view.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len);
        let start = start.min(end);
        Self::new(self.region, self.offset + start, end - start)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        if self.len == 0 {
            return vec![];
        }
        // SAFETY: every byte of a view was vouched for when the view was built
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }.to_vec()
    }

    /// Copies `src` into the view starting at byte `at`.
    ///
    /// Panics if the write would run past the end of the view.
    pub fn copy_from_slice(&self, at: usize, src: &[u8]) {
        let end = at
            .checked_add(src.len())
            .filter(|end| *end <= self.len)
            .unwrap_or_else(|| {
                panic!(
                    "write of {} bytes at {at} overruns a {}-byte buffer",
                    src.len(),
                    self.len
                )
            });
        if at == end {
            return;
        }
        // SAFETY: bounds checked above; views cover writable memory
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), self.as_ptr().add(at), src.len()) };
    }
}

impl Debug for Buffer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buffer({:#x}, {} bytes, region #{})",
            self.address(),
            self.len,
            self.region.id().0
        )
    }
}
