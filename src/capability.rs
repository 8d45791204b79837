//! Platform size and alignment of every primitive the marshaling layer can name.
//!
//! The table is built once, on first use, and never changes afterwards.
use crate::error::{RefError, Result};
use std::{
    collections::BTreeMap,
    ffi::{c_char, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong, c_ulonglong, c_ushort},
    mem::{align_of, size_of},
    sync::OnceLock,
};

/// The fixed-width token stored in raw memory for an embedded object reference.
pub type ObjectHandle = u64;

pub const OBJECT_HANDLE_SIZE: usize = size_of::<ObjectHandle>();
pub const POINTER_SIZE: usize = size_of::<*const u8>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
    Byte,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Pointer,
    SizeT,
    Object,
}

impl Primitive {
    pub const ALL: [Primitive; 25] = [
        Primitive::Int8,
        Primitive::UInt8,
        Primitive::Int16,
        Primitive::UInt16,
        Primitive::Int32,
        Primitive::UInt32,
        Primitive::Int64,
        Primitive::UInt64,
        Primitive::Float,
        Primitive::Double,
        Primitive::Bool,
        Primitive::Byte,
        Primitive::Char,
        Primitive::UChar,
        Primitive::Short,
        Primitive::UShort,
        Primitive::Int,
        Primitive::UInt,
        Primitive::Long,
        Primitive::ULong,
        Primitive::LongLong,
        Primitive::ULongLong,
        Primitive::Pointer,
        Primitive::SizeT,
        Primitive::Object,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int8 => "int8",
            Primitive::UInt8 => "uint8",
            Primitive::Int16 => "int16",
            Primitive::UInt16 => "uint16",
            Primitive::Int32 => "int32",
            Primitive::UInt32 => "uint32",
            Primitive::Int64 => "int64",
            Primitive::UInt64 => "uint64",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Bool => "bool",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::UChar => "uchar",
            Primitive::Short => "short",
            Primitive::UShort => "ushort",
            Primitive::Int => "int",
            Primitive::UInt => "uint",
            Primitive::Long => "long",
            Primitive::ULong => "ulong",
            Primitive::LongLong => "longlong",
            Primitive::ULongLong => "ulonglong",
            Primitive::Pointer => "pointer",
            Primitive::SizeT => "size_t",
            Primitive::Object => "Object",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Primitive::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| RefError::UnknownType(name.to_string()))
    }

    pub fn layout(self) -> Layout {
        macro_rules! layout_of {
            ($t:ty) => {
                Layout {
                    size: size_of::<$t>(),
                    align: align_of::<$t>(),
                }
            };
        }

        match self {
            Primitive::Int8 => layout_of!(i8),
            Primitive::UInt8 => layout_of!(u8),
            Primitive::Int16 => layout_of!(i16),
            Primitive::UInt16 => layout_of!(u16),
            Primitive::Int32 => layout_of!(i32),
            Primitive::UInt32 => layout_of!(u32),
            Primitive::Int64 => layout_of!(i64),
            Primitive::UInt64 => layout_of!(u64),
            Primitive::Float => layout_of!(f32),
            Primitive::Double => layout_of!(f64),
            Primitive::Bool => layout_of!(bool),
            Primitive::Byte => layout_of!(c_uchar),
            Primitive::Char => layout_of!(c_char),
            Primitive::UChar => layout_of!(c_uchar),
            Primitive::Short => layout_of!(c_short),
            Primitive::UShort => layout_of!(c_ushort),
            Primitive::Int => layout_of!(c_int),
            Primitive::UInt => layout_of!(c_uint),
            Primitive::Long => layout_of!(c_long),
            Primitive::ULong => layout_of!(c_ulong),
            Primitive::LongLong => layout_of!(c_longlong),
            Primitive::ULongLong => layout_of!(c_ulonglong),
            Primitive::Pointer => layout_of!(*const u8),
            Primitive::SizeT => layout_of!(usize),
            Primitive::Object => layout_of!(ObjectHandle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub size: usize,
    pub align: usize,
}

pub type CapabilityTable = BTreeMap<&'static str, Layout>;

static TABLE: OnceLock<CapabilityTable> = OnceLock::new();

pub fn table() -> &'static CapabilityTable {
    TABLE.get_or_init(|| {
        Primitive::ALL
            .into_iter()
            .map(|p| (p.name(), p.layout()))
            .collect()
    })
}

pub fn size_of_type(name: &str) -> Result<usize> {
    lookup(name).map(|l| l.size)
}

pub fn align_of_type(name: &str) -> Result<usize> {
    lookup(name).map(|l| l.align)
}

fn lookup(name: &str) -> Result<Layout> {
    table()
        .get(name)
        .copied()
        .ok_or_else(|| RefError::UnknownType(name.to_string()))
}

pub fn endianness() -> &'static str {
    if cfg!(target_endian = "little") {
        "LE"
    } else {
        "BE"
    }
}
