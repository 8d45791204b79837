//! Pointer-sized reads and writes, and re-framing of existing memory.
use crate::{
    error::{RefError, Result},
    heap::Heap,
    value::{Buffer, Value},
};
use gc_arena::Mutation;

impl<'gc> Heap<'gc> {
    /// Reads the pointer stored `offset` bytes into `buffer` and returns the canonical view of
    /// `len` bytes at its target. A null target gives the null buffer.
    ///
    /// # Safety
    /// The source address must be readable for a pointer, and the target must satisfy the
    /// contract of [`Heap::wrap`].
    pub unsafe fn read_pointer(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        len: usize,
    ) -> Result<Buffer<'gc>> {
        let source = self.address(gc, buffer, offset);
        if source == 0 {
            return Err(RefError::null_dereference("readPointer"));
        }
        let target = (source as *const usize).read_unaligned();
        self.wrap(gc, target, len)
    }

    /// Stores the base address of `source` (or null) `offset` bytes into `buffer`.
    ///
    /// With `pin`, `source` is kept alive until `buffer`'s region has been released.
    ///
    /// # Safety
    /// The destination address must be writable for a pointer.
    pub unsafe fn write_pointer(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        source: Option<Buffer<'gc>>,
        pin: bool,
    ) -> Result<()> {
        let dest = self.address(gc, buffer, offset);
        if dest == 0 {
            return Err(RefError::null_dereference("writePointer"));
        }

        let value = match source {
            None => 0,
            Some(src) => {
                if pin {
                    self.keep_alive.link(&buffer, Value::Buffer(src));
                }
                self.address(gc, src, 0)
            }
        };
        (dest as *mut usize).write_unaligned(value);
        Ok(())
    }

    /// The canonical view of `len` bytes starting `offset` bytes into `buffer`. The result
    /// keeps `buffer` alive.
    ///
    /// # Safety
    /// Same contract as [`Heap::wrap`] for the new address and length.
    pub unsafe fn reinterpret(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        len: usize,
        offset: i64,
    ) -> Result<Buffer<'gc>> {
        let address = self.address(gc, buffer, offset);
        if address == 0 {
            return Err(RefError::null_dereference("reinterpret"));
        }
        let result = self.wrap(gc, address, len)?;
        self.attach(gc, result, Value::Buffer(buffer));
        Ok(result)
    }

    /// Like [`Heap::reinterpret`], but the length runs up to the first all-zero element of
    /// `width` bytes, stopping at the configured scan bound.
    ///
    /// # Safety
    /// Memory from the start address up to the terminator (or the scan bound) must be readable.
    pub unsafe fn reinterpret_until_zeros(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        width: usize,
        offset: i64,
    ) -> Result<Buffer<'gc>> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(RefError::UnsupportedElementWidth(width));
        }
        let address = self.address(gc, buffer, offset);
        if address == 0 {
            return Err(RefError::null_dereference("reinterpretUntilZeros"));
        }

        let len = scan_until_zeros(address as *const u8, width, self.config.scan_bound);
        let result = self.wrap(gc, address, len)?;
        self.attach(gc, result, Value::Buffer(buffer));
        Ok(result)
    }
}

/// Byte length up to (excluding) the first zero element, never more than `bound`.
unsafe fn scan_until_zeros(start: *const u8, width: usize, bound: usize) -> usize {
    let is_zero = |p: *const u8| match width {
        1 => p.read() == 0,
        2 => (p as *const u16).read_unaligned() == 0,
        4 => (p as *const u32).read_unaligned() == 0,
        _ => (p as *const u64).read_unaligned() == 0,
    };

    let mut len = 0;
    while len < bound {
        if is_zero(start.add(len)) {
            break;
        }
        len += width;
    }
    len.min(bound)
}
