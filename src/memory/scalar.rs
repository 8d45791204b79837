//! Typed access to buffer contents by primitive name, plus the C string and `ref`/`deref`
//! helpers built on top of pointer IO.
//!
//! Scalar reads and writes stay inside the view and report `OutOfRange` otherwise. Values use
//! native byte order.
use crate::{
    capability::{Primitive, POINTER_SIZE},
    error::{RefError, Result},
    heap::Heap,
    value::{Buffer, Value},
};
use gc_arena::Mutation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repr {
    Signed,
    Unsigned,
    Float,
    Bool,
    Pointer,
    Object,
}

fn repr(ty: Primitive) -> Repr {
    use Primitive::*;
    match ty {
        Int8 | Int16 | Int32 | Int64 | Char | Short | Int | Long | LongLong => Repr::Signed,
        UInt8 | UInt16 | UInt32 | UInt64 | Byte | UChar | UShort | UInt | ULong | ULongLong
        | SizeT => Repr::Unsigned,
        Float | Double => Repr::Float,
        Bool => Repr::Bool,
        Pointer => Repr::Pointer,
        Object => Repr::Object,
    }
}

/// Byte offset of `size` bytes at `offset` inside `buffer`, if they fit.
fn checked_offset(
    buffer: &Buffer<'_>,
    offset: i64,
    size: usize,
    operation: &'static str,
) -> Result<usize> {
    usize::try_from(offset)
        .ok()
        .filter(|o| o.checked_add(size).is_some_and(|end| end <= buffer.len()))
        .ok_or(RefError::OutOfRange {
            operation,
            offset,
            len: buffer.len(),
        })
}

fn read_bits(bytes: &[u8], signed: bool) -> u64 {
    macro_rules! from_bytes {
        ($s:ty, $u:ty) => {{
            let raw = bytes.try_into().unwrap_or_default();
            if signed {
                <$s>::from_ne_bytes(raw) as i64 as u64
            } else {
                <$u>::from_ne_bytes(raw) as u64
            }
        }};
    }
    match bytes.len() {
        1 => from_bytes!(i8, u8),
        2 => from_bytes!(i16, u16),
        4 => from_bytes!(i32, u32),
        _ => from_bytes!(i64, u64),
    }
}

fn bits_to_bytes(bits: u64, size: usize) -> Vec<u8> {
    match size {
        1 => vec![bits as u8],
        2 => (bits as u16).to_ne_bytes().to_vec(),
        4 => (bits as u32).to_ne_bytes().to_vec(),
        _ => bits.to_ne_bytes().to_vec(),
    }
}

/// Integer bits for a scalar write. Strings give their first char code for one-byte types and
/// are parsed as decimal for the rest.
fn integer_bits(value: Value<'_>, size: usize, operation: &'static str) -> Result<u64> {
    match value {
        Value::Bool(b) => Ok(b as u64),
        Value::Str(s) if size == 1 => Ok(s.chars().next().map_or(0, |c| c as u64)),
        Value::Str(s) => s
            .parse::<i64>()
            .map(|i| i as u64)
            .or_else(|_| s.parse::<u64>())
            .map_err(|_| RefError::type_argument(operation, "number", "string")),
        v => v.to_integer(operation).map(|i| i as u64),
    }
}

impl<'gc> Heap<'gc> {
    /// Reads a `ty` value `offset` bytes into `buffer`.
    ///
    /// `uint64`-sized values that do not fit an `i64` come back as decimal strings.
    pub fn get(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        ty: Primitive,
    ) -> Result<Value<'gc>> {
        let size = ty.layout().size;
        let at = checked_offset(&buffer, offset, size, "get")?;
        let bytes = buffer.slice(at, at + size).to_vec();

        let value = match repr(ty) {
            Repr::Signed => Value::Int(read_bits(&bytes, true) as i64),
            Repr::Unsigned => {
                let bits = read_bits(&bytes, false);
                match i64::try_from(bits) {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::string(gc, bits.to_string()),
                }
            }
            Repr::Bool => Value::Bool(bytes.iter().any(|b| *b != 0)),
            Repr::Float if size == 4 => {
                Value::Float(f32::from_ne_bytes(bytes.try_into().unwrap_or_default()) as f64)
            }
            Repr::Float => Value::Float(f64::from_ne_bytes(bytes.try_into().unwrap_or_default())),
            // SAFETY: the slot lies inside the view, and the target is framed with zero length
            Repr::Pointer => Value::Buffer(unsafe { self.read_pointer(gc, buffer, offset, 0)? }),
            Repr::Object => {
                // SAFETY: the slot lies inside the view
                let object = unsafe { self.read_object(gc, buffer, offset)? };
                object.map_or(Value::Null, Value::Object)
            }
        };
        Ok(value)
    }

    /// Writes `value` as a `ty` `offset` bytes into `buffer`.
    ///
    /// Pointers are written pinned and objects are written attached, so neither can be
    /// collected while `buffer` is reachable.
    pub fn set(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
        ty: Primitive,
        value: Value<'gc>,
    ) -> Result<()> {
        let size = ty.layout().size;
        let at = checked_offset(&buffer, offset, size, "set")?;

        let bytes = match repr(ty) {
            Repr::Signed | Repr::Unsigned => bits_to_bytes(integer_bits(value, size, "set")?, size),
            Repr::Bool => bits_to_bytes(value.truthy() as u64, size),
            Repr::Float => {
                let x = match value {
                    Value::Float(x) => x,
                    Value::Int(i) => i as f64,
                    v => return Err(RefError::type_argument("set", "number", v.kind())),
                };
                if size == 4 {
                    (x as f32).to_ne_bytes().to_vec()
                } else {
                    x.to_ne_bytes().to_vec()
                }
            }
            Repr::Pointer => {
                let source = match value {
                    Value::Buffer(b) => Some(b),
                    Value::Null => None,
                    v => return Err(RefError::type_argument("set", "buffer or null", v.kind())),
                };
                // SAFETY: the slot lies inside the view
                return unsafe { self.write_pointer(gc, buffer, offset, source, true) };
            }
            Repr::Object => {
                let object = match value {
                    Value::Object(o) => Some(o),
                    Value::Null => None,
                    v => return Err(RefError::type_argument("set", "object or null", v.kind())),
                };
                // SAFETY: the slot lies inside the view
                return unsafe { self.write_object_attached(gc, buffer, offset, object) };
            }
        };
        buffer.copy_from_slice(at, &bytes);
        Ok(())
    }

    pub fn is_null(&self, buffer: Buffer<'gc>) -> bool {
        buffer.is_null()
    }

    /// Lowercase hexadecimal form of `address(buffer, offset)`, without a prefix.
    pub fn hex_address(&mut self, gc: &Mutation<'gc>, buffer: Buffer<'gc>, offset: i64) -> String {
        format!("{:x}", self.address(gc, buffer, offset))
    }

    /// Reads the NUL-terminated string starting `offset` bytes into `buffer`. Invalid UTF-8 is
    /// replaced.
    ///
    /// # Safety
    /// Memory from the start address through its terminator must be readable.
    pub unsafe fn read_cstring(
        &mut self,
        gc: &Mutation<'gc>,
        buffer: Buffer<'gc>,
        offset: i64,
    ) -> Result<String> {
        let bytes = self.reinterpret_until_zeros(gc, buffer, 1, offset)?.to_vec();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Writes `s` plus a NUL terminator `offset` bytes into `buffer`, truncating at a char
    /// boundary so the terminator always fits.
    pub fn write_cstring(&mut self, buffer: Buffer<'gc>, s: &str, offset: i64) -> Result<()> {
        let at = checked_offset(&buffer, offset, 1, "writeCString")?;
        let room = buffer.len() - at - 1;

        let mut end = s.len().min(room);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        buffer.copy_from_slice(at, &s.as_bytes()[..end]);
        buffer.copy_from_slice(at + end, &[0]);
        Ok(())
    }

    /// A fresh host buffer holding `s` and its terminator. `None` gives the null buffer.
    pub fn alloc_cstring(&mut self, gc: &Mutation<'gc>, s: Option<&str>) -> Result<Buffer<'gc>> {
        let Some(s) = s else {
            return Ok(self.null());
        };
        let buffer = self.alloc(gc, s.len() + 1)?;
        buffer.copy_from_slice(0, s.as_bytes());
        Ok(buffer)
    }

    /// A pointer-sized host buffer that points at `buffer` and keeps it alive.
    pub fn reference(&mut self, gc: &Mutation<'gc>, buffer: Buffer<'gc>) -> Result<Buffer<'gc>> {
        let pointer = self.alloc(gc, POINTER_SIZE)?;
        // SAFETY: `pointer` was just allocated with room for a pointer
        unsafe { self.write_pointer(gc, pointer, 0, Some(buffer), true)? };
        Ok(pointer)
    }

    /// The `len`-byte view that `pointer` points at.
    ///
    /// # Safety
    /// Same contract as [`Heap::read_pointer`] at offset zero.
    pub unsafe fn dereference(
        &mut self,
        gc: &Mutation<'gc>,
        pointer: Buffer<'gc>,
        len: usize,
    ) -> Result<Buffer<'gc>> {
        self.read_pointer(gc, pointer, 0, len)
    }
}
