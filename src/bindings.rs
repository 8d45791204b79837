//! The dynamic export table.
//!
//! Every operation is also available as a name mapped to a native function over untyped
//! [`Value`] arguments, the shape a marshaling layer or script host consumes. Argument kinds
//! are checked here; the typed [`Heap`] methods underneath never see a wrong kind.
use crate::{
    capability::{self, Primitive},
    error::{RefError, Result},
    heap::Heap,
    memory::offset_argument,
    value::{Buffer, Value},
};
use gc_arena::Mutation;
use std::{collections::HashMap, sync::OnceLock};

/// # Safety
/// Exports dereference raw addresses taken from their arguments.
pub type NativeFn =
    for<'gc> unsafe fn(&mut Heap<'gc>, &'gc Mutation<'gc>, &[Value<'gc>]) -> Result<Value<'gc>>;

static EXPORTS: OnceLock<HashMap<&'static str, NativeFn>> = OnceLock::new();

pub fn exports() -> &'static HashMap<&'static str, NativeFn> {
    EXPORTS.get_or_init(|| {
        let table: [(&'static str, NativeFn); 25] = [
            ("sizeof", sizeof),
            ("alignof", alignof),
            ("endianness", endianness),
            ("NULL", null),
            ("alloc", alloc),
            ("wrap", wrap),
            ("address", address),
            ("hexAddress", hex_address),
            ("isNull", is_null),
            ("readPointer", read_pointer),
            ("writePointer", write_pointer),
            ("readObject", read_object),
            ("writeObject", write_object),
            ("reinterpret", reinterpret),
            ("reinterpretUntilZeros", reinterpret_until_zeros),
            ("readCString", read_cstring),
            ("writeCString", write_cstring),
            ("allocCString", alloc_cstring),
            ("ref", reference),
            ("deref", dereference),
            ("get", get),
            ("set", set),
            ("attach", attach),
            ("nullptr", null),
            ("_writeObject", write_object_unattached),
        ];
        table.into_iter().collect()
    })
}

/// Calls the export `name`.
///
/// # Safety
/// Same contract as the [`Heap`] method behind the export, for the addresses its arguments
/// describe.
pub unsafe fn invoke<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    name: &str,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let Some(f) = exports().get(name) else {
        return Err(RefError::UnknownExport(name.to_string()));
    };
    tracing::trace!("{name}{args:?}");
    f(heap, gc, args)
}

fn arg<'gc>(args: &[Value<'gc>], i: usize) -> Value<'gc> {
    args.get(i).copied().unwrap_or(Value::Undefined)
}

fn buffer_arg<'gc>(args: &[Value<'gc>], i: usize, op: &'static str) -> Result<Buffer<'gc>> {
    match arg(args, i) {
        Value::Buffer(b) => Ok(b),
        v => Err(RefError::type_argument(op, "buffer", v.kind())),
    }
}

fn buffer_or_null_arg<'gc>(
    args: &[Value<'gc>],
    i: usize,
    op: &'static str,
) -> Result<Option<Buffer<'gc>>> {
    match arg(args, i) {
        Value::Buffer(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        v => Err(RefError::type_argument(op, "buffer or null", v.kind())),
    }
}

fn length_arg(args: &[Value<'_>], i: usize, op: &'static str) -> Result<usize> {
    let v = arg(args, i);
    let n = v.to_integer(op)?;
    usize::try_from(n).map_err(|_| RefError::type_argument(op, "non-negative number", v.kind()))
}

fn str_arg<'a>(args: &'a [Value<'_>], i: usize, op: &'static str) -> Result<&'a str> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s.as_str()),
        v => Err(RefError::type_argument(
            op,
            "string",
            v.map_or("undefined", |v| v.kind()),
        )),
    }
}

fn type_arg(args: &[Value<'_>], i: usize, op: &'static str) -> Result<Primitive> {
    Primitive::from_name(str_arg(args, i, op)?)
}

fn usize_value<'gc>(n: usize) -> Value<'gc> {
    Value::Int(n as i64)
}

unsafe fn sizeof<'gc>(
    _: &mut Heap<'gc>,
    _: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    capability::size_of_type(str_arg(args, 0, "sizeof")?).map(usize_value)
}

unsafe fn alignof<'gc>(
    _: &mut Heap<'gc>,
    _: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    capability::align_of_type(str_arg(args, 0, "alignof")?).map(usize_value)
}

unsafe fn endianness<'gc>(
    _: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    _: &[Value<'gc>],
) -> Result<Value<'gc>> {
    Ok(Value::string(gc, capability::endianness()))
}

unsafe fn null<'gc>(
    heap: &mut Heap<'gc>,
    _: &'gc Mutation<'gc>,
    _: &[Value<'gc>],
) -> Result<Value<'gc>> {
    Ok(heap.null().into())
}

unsafe fn alloc<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let len = length_arg(args, 0, "alloc")?;
    Ok(heap.alloc(gc, len)?.into())
}

unsafe fn wrap<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let address = arg(args, 0).to_integer("wrap")? as usize;
    let len = length_arg(args, 1, "wrap")?;
    Ok(heap.wrap(gc, address, len)?.into())
}

unsafe fn address<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "address")?;
    let offset = offset_argument(arg(args, 1), "address")?;
    Ok(usize_value(heap.address(gc, buffer, offset)))
}

unsafe fn hex_address<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "hexAddress")?;
    let offset = offset_argument(arg(args, 1), "hexAddress")?;
    let hex = heap.hex_address(gc, buffer, offset);
    Ok(Value::string(gc, hex))
}

unsafe fn is_null<'gc>(
    heap: &mut Heap<'gc>,
    _: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "isNull")?;
    Ok(Value::Bool(heap.is_null(buffer)))
}

unsafe fn read_pointer<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "readPointer")?;
    let offset = offset_argument(arg(args, 1), "readPointer")?;
    let len = match arg(args, 2) {
        Value::Undefined => 0,
        _ => length_arg(args, 2, "readPointer")?,
    };
    Ok(heap.read_pointer(gc, buffer, offset, len)?.into())
}

unsafe fn write_pointer<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "writePointer")?;
    let offset = offset_argument(arg(args, 1), "writePointer")?;
    let source = buffer_or_null_arg(args, 2, "writePointer")?;
    let pin = arg(args, 3).truthy();
    heap.write_pointer(gc, buffer, offset, source, pin)?;
    Ok(Value::Undefined)
}

unsafe fn read_object<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "readObject")?;
    let offset = offset_argument(arg(args, 1), "readObject")?;
    let object = heap.read_object(gc, buffer, offset)?;
    Ok(object.map_or(Value::Null, Value::Object))
}

unsafe fn store_object<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
    attach: bool,
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "writeObject")?;
    let offset = offset_argument(arg(args, 1), "writeObject")?;
    let object = match arg(args, 2) {
        Value::Object(o) => Some(o),
        Value::Null => None,
        v => return Err(RefError::type_argument("writeObject", "object or null", v.kind())),
    };
    if attach {
        heap.write_object_attached(gc, buffer, offset, object)?;
    } else {
        heap.write_object(gc, buffer, offset, object)?;
    }
    Ok(Value::Undefined)
}

/// Also attaches the object to the buffer until the slot is overwritten, so the weak slot
/// stays readable meanwhile.
unsafe fn write_object<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    store_object(heap, gc, args, true)
}

unsafe fn write_object_unattached<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    store_object(heap, gc, args, false)
}

unsafe fn reinterpret<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "reinterpret")?;
    let len = length_arg(args, 1, "reinterpret")?;
    let offset = offset_argument(arg(args, 2), "reinterpret")?;
    Ok(heap.reinterpret(gc, buffer, len, offset)?.into())
}

unsafe fn reinterpret_until_zeros<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "reinterpretUntilZeros")?;
    let width = length_arg(args, 1, "reinterpretUntilZeros")?;
    let offset = offset_argument(arg(args, 2), "reinterpretUntilZeros")?;
    Ok(heap.reinterpret_until_zeros(gc, buffer, width, offset)?.into())
}

unsafe fn read_cstring<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "readCString")?;
    let offset = offset_argument(arg(args, 1), "readCString")?;
    let s = heap.read_cstring(gc, buffer, offset)?;
    Ok(Value::string(gc, s))
}

unsafe fn write_cstring<'gc>(
    heap: &mut Heap<'gc>,
    _: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "writeCString")?;
    let s = str_arg(args, 1, "writeCString")?;
    let offset = offset_argument(arg(args, 2), "writeCString")?;
    heap.write_cstring(buffer, s, offset)?;
    Ok(Value::Undefined)
}

unsafe fn alloc_cstring<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let s = match arg(args, 0) {
        v if v.is_nullish() => None,
        _ => Some(str_arg(args, 0, "allocCString")?),
    };
    Ok(heap.alloc_cstring(gc, s)?.into())
}

unsafe fn reference<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "ref")?;
    Ok(heap.reference(gc, buffer)?.into())
}

unsafe fn dereference<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let pointer = buffer_arg(args, 0, "deref")?;
    let len = match arg(args, 1) {
        Value::Undefined => 0,
        _ => length_arg(args, 1, "deref")?,
    };
    Ok(heap.dereference(gc, pointer, len)?.into())
}

unsafe fn get<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "get")?;
    let offset = offset_argument(arg(args, 1), "get")?;
    let ty = type_arg(args, 2, "get")?;
    heap.get(gc, buffer, offset, ty)
}

unsafe fn set<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let buffer = buffer_arg(args, 0, "set")?;
    let offset = offset_argument(arg(args, 1), "set")?;
    let ty = type_arg(args, 2, "set")?;
    heap.set(gc, buffer, offset, ty, arg(args, 3))?;
    Ok(Value::Undefined)
}

unsafe fn attach<'gc>(
    heap: &mut Heap<'gc>,
    gc: &'gc Mutation<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>> {
    let holder = buffer_arg(args, 0, "attach")?;
    Ok(Value::Bool(heap.attach(gc, holder, arg(args, 1))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{capability::POINTER_SIZE, config::RuntimeConfig, runtime::Runtime};

    #[test]
    fn test_every_export_is_registered() {
        let names = [
            "sizeof",
            "alignof",
            "endianness",
            "NULL",
            "alloc",
            "wrap",
            "address",
            "hexAddress",
            "isNull",
            "readPointer",
            "writePointer",
            "readObject",
            "writeObject",
            "reinterpret",
            "reinterpretUntilZeros",
            "readCString",
            "writeCString",
            "allocCString",
            "ref",
            "deref",
            "get",
            "set",
            "attach",
            "nullptr",
            "_writeObject",
        ];
        for name in names {
            assert!(exports().contains_key(name), "{name}");
        }
        assert_eq!(exports().len(), names.len());
    }

    #[test]
    fn test_unknown_export() {
        let mut runtime = Runtime::new();
        runtime.mutate(|gc, heap| {
            let result = unsafe { invoke(heap, gc, "readInt128", &[]) };
            assert_eq!(result.err(), Some(RefError::UnknownExport("readInt128".into())));
        });
    }

    #[test]
    fn test_capability_exports() {
        let mut runtime = Runtime::new();
        runtime.mutate(|gc, heap| unsafe {
            let name = Value::string(gc, "pointer");
            let size = invoke(heap, gc, "sizeof", &[name]).unwrap();
            assert!(matches!(size, Value::Int(n) if n as usize == POINTER_SIZE));

            let bogus = Value::string(gc, "quad");
            assert_eq!(
                invoke(heap, gc, "alignof", &[bogus]).err(),
                Some(RefError::UnknownType("quad".into()))
            );
        });
    }

    #[test]
    fn test_argument_kinds_are_checked() {
        let mut runtime = Runtime::new();
        runtime.mutate(|gc, heap| unsafe {
            let buf = Value::Buffer(heap.alloc(gc, 16).unwrap());

            assert_eq!(
                invoke(heap, gc, "writePointer", &[buf, Value::Int(0), Value::Int(5)]).err(),
                Some(RefError::type_argument("writePointer", "buffer or null", "int"))
            );
            assert_eq!(
                invoke(heap, gc, "writeObject", &[buf, Value::Int(0), Value::Bool(true)]).err(),
                Some(RefError::type_argument("writeObject", "object or null", "bool"))
            );
            assert_eq!(
                invoke(heap, gc, "address", &[Value::Int(1)]).err(),
                Some(RefError::type_argument("address", "buffer", "int"))
            );
            assert_eq!(
                invoke(heap, gc, "address", &[buf, Value::Bool(false)]).err(),
                Some(RefError::type_argument("address", "number", "bool"))
            );
            assert_eq!(
                invoke(heap, gc, "reinterpretUntilZeros", &[buf, Value::Int(3)]).err(),
                Some(RefError::UnsupportedElementWidth(3))
            );
        });
    }

    #[test]
    fn test_oversized_allocations_are_errors() {
        let mut runtime = Runtime::new();
        runtime.mutate(|gc, heap| unsafe {
            let max = RuntimeConfig::default().max_region_len;
            assert_eq!(
                invoke(heap, gc, "alloc", &[Value::Int(i64::MAX)]).err(),
                Some(RefError::TooLarge {
                    len: i64::MAX as usize,
                    max
                })
            );
            assert_eq!(
                invoke(heap, gc, "wrap", &[Value::Int(0x1000), Value::Int(i64::MAX)]).err(),
                Some(RefError::TooLarge {
                    len: i64::MAX as usize,
                    max
                })
            );
            assert!(invoke(heap, gc, "alloc", &[Value::Int(-1)]).is_err());
        });
    }

    #[test]
    fn test_null_sources_are_rejected() {
        let mut runtime = Runtime::new();
        runtime.mutate(|gc, heap| unsafe {
            let null = invoke(heap, gc, "NULL", &[]).unwrap();
            assert!(matches!(invoke(heap, gc, "isNull", &[null]), Ok(Value::Bool(true))));
            assert_eq!(
                invoke(heap, gc, "readPointer", &[null, Value::Int(0), Value::Int(8)]).err(),
                Some(RefError::null_dereference("readPointer"))
            );
            assert_eq!(
                invoke(heap, gc, "readObject", &[null]).err(),
                Some(RefError::null_dereference("readObject"))
            );
        });
    }

    #[test]
    fn test_scalar_and_string_exports() {
        let mut runtime = Runtime::new();
        runtime.mutate(|gc, heap| unsafe {
            let buf = Value::Buffer(heap.alloc(gc, 16).unwrap());
            let int32 = Value::string(gc, "int32");
            invoke(heap, gc, "set", &[buf, Value::Int(4), int32, Value::Int(-7)]).unwrap();
            let back = invoke(heap, gc, "get", &[buf, Value::Int(4), int32]).unwrap();
            assert!(matches!(back, Value::Int(-7)));

            let hello = Value::string(gc, "hello");
            let c = invoke(heap, gc, "allocCString", &[hello]).unwrap();
            let read = invoke(heap, gc, "readCString", &[c]).unwrap();
            assert_eq!(read.as_str(), Some("hello"));
        });
    }
}
