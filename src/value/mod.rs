//! Values that cross the capability surface.
use crate::error::{RefError, Result};
use gc_arena::{Collect, Collection, Gc, GcWeak, Mutation};
use std::fmt::{self, Debug, Formatter};

pub mod buffer;
pub mod object;

pub use buffer::{Buffer, Region, RegionId};
pub use object::{HostObject, ObjectRef};

#[derive(Copy, Clone)]
pub enum Value<'gc> {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Gc<'gc, String>),
    Buffer(Buffer<'gc>),
    Object(ObjectRef<'gc>),
}

unsafe impl<'gc> Collect for Value<'gc> {
    fn trace(&self, cc: &Collection) {
        match self {
            Value::Str(s) => s.trace(cc),
            Value::Buffer(b) => b.trace(cc),
            Value::Object(o) => o.trace(cc),
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => {}
        }
    }
}

impl<'gc> Value<'gc> {
    pub fn string(gc: &Mutation<'gc>, s: impl Into<String>) -> Self {
        Value::Str(Gc::new(gc, s.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Buffer(_) => "buffer",
            Value::Object(_) => "object",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn as_buffer(&self) -> Option<Buffer<'gc>> {
        match self {
            Value::Buffer(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Interprets the value as a byte offset or length. Floats truncate toward zero.
    pub fn to_integer(&self, operation: &'static str) -> Result<i64> {
        match *self {
            Value::Int(i) => Ok(i),
            Value::Float(f) if f.is_finite() => Ok(f as i64),
            _ => Err(RefError::type_argument(operation, "number", self.kind())),
        }
    }

    pub fn truthy(&self) -> bool {
        match *self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Buffer(_) | Value::Object(_) => true,
        }
    }

    pub(crate) fn downgrade(self) -> WeakValue<'gc> {
        match self {
            Value::Str(s) => WeakValue::Str(Gc::downgrade(s)),
            Value::Buffer(b) => WeakValue::Buffer {
                region: Gc::downgrade(b.region()),
                offset: b.offset(),
                len: b.len(),
            },
            Value::Object(o) => WeakValue::Object(Gc::downgrade(o)),
            scalar => WeakValue::Scalar(scalar),
        }
    }
}

impl Debug for Value<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{:?}", s.as_str()),
            Value::Buffer(b) => write!(f, "{b:?}"),
            Value::Object(o) => write!(f, "Object({:?})", Gc::as_ptr(*o)),
        }
    }
}

impl<'gc> From<Buffer<'gc>> for Value<'gc> {
    fn from(b: Buffer<'gc>) -> Self {
        Value::Buffer(b)
    }
}

impl<'gc> From<ObjectRef<'gc>> for Value<'gc> {
    fn from(o: ObjectRef<'gc>) -> Self {
        Value::Object(o)
    }
}

impl From<i64> for Value<'_> {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A value held without keeping its referent alive.
#[derive(Copy, Clone)]
pub(crate) enum WeakValue<'gc> {
    Scalar(Value<'gc>),
    Str(GcWeak<'gc, String>),
    Buffer {
        region: GcWeak<'gc, Region<'gc>>,
        offset: usize,
        len: usize,
    },
    Object(GcWeak<'gc, object::ObjectInner<'gc>>),
}

unsafe impl<'gc> Collect for WeakValue<'gc> {
    fn trace(&self, cc: &Collection) {
        match self {
            WeakValue::Scalar(v) => v.trace(cc),
            WeakValue::Str(s) => s.trace(cc),
            WeakValue::Buffer { region, .. } => region.trace(cc),
            WeakValue::Object(o) => o.trace(cc),
        }
    }
}

impl<'gc> WeakValue<'gc> {
    /// `None` once the referent has been collected.
    pub(crate) fn upgrade(&self, gc: &Mutation<'gc>) -> Option<Value<'gc>> {
        match *self {
            WeakValue::Scalar(v) => Some(v),
            WeakValue::Str(s) => s.upgrade(gc).map(Value::Str),
            WeakValue::Buffer {
                region,
                offset,
                len,
            } => region
                .upgrade(gc)
                .map(|r| Value::Buffer(Buffer::new(r, offset, len))),
            WeakValue::Object(o) => o.upgrade(gc).map(Value::Object),
        }
    }
}
