use refbridge::{capability::Primitive, RefError, Runtime, RuntimeConfig, Value};

#[test]
fn test_pointer_round_trip() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 8).unwrap();
        let b = heap.alloc(gc, 32).unwrap();
        heap.write_pointer(gc, a, 0, Some(b), false).unwrap();

        let r = heap.read_pointer(gc, a, 0, 16).unwrap();
        assert_eq!(r.address(), heap.address(gc, b, 0));
        assert_eq!(r.len(), 16);
        assert!(r.same_region(&b));
    });
}

#[test]
fn test_views_keep_the_requested_length_past_their_region() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 8).unwrap();
        let b = heap.alloc(gc, 8).unwrap();
        heap.write_pointer(gc, a, 0, Some(b), false).unwrap();

        let wide = heap.read_pointer(gc, a, 0, 16).unwrap();
        assert!(wide.same_region(&b));
        assert_eq!(wide.len(), 16);

        let wider = heap.reinterpret(gc, b, 64, 0).unwrap();
        assert!(wider.same_region(&b));
        assert_eq!(wider.len(), 64);
    });
}

#[test]
fn test_wrap_rejects_lengths_above_the_maximum() {
    let mut runtime = Runtime::with_config(RuntimeConfig::default().with_max_region_len(64));
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 8).unwrap();
        let p = heap.address(gc, a, 0);
        assert_eq!(heap.wrap(gc, p, 64).unwrap().len(), 64);
        assert_eq!(
            heap.wrap(gc, p, 65).err(),
            Some(RefError::TooLarge { len: 65, max: 64 })
        );
        assert_eq!(
            heap.alloc(gc, 65).err(),
            Some(RefError::TooLarge { len: 65, max: 64 })
        );
        assert!(heap.wrap(gc, 0, 65).unwrap().is_null());
    });
}

#[test]
fn test_null_pointer_reads_back_as_the_null_buffer() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 16).unwrap();
        let b = heap.alloc(gc, 4).unwrap();
        heap.write_pointer(gc, a, 8, Some(b), false).unwrap();
        heap.write_pointer(gc, a, 8, None, false).unwrap();

        let r = heap.read_pointer(gc, a, 8, 64).unwrap();
        assert!(r.is_null() && r.is_empty());
    });
}

#[test]
fn test_null_sources_and_destinations_fail() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let null = heap.null();
        let b = heap.alloc(gc, 4).unwrap();
        assert_eq!(
            heap.read_pointer(gc, null, 0, 8).err(),
            Some(RefError::null_dereference("readPointer"))
        );
        assert_eq!(
            heap.write_pointer(gc, null, 0, Some(b), true).err(),
            Some(RefError::null_dereference("writePointer"))
        );
        assert_eq!(
            heap.reinterpret(gc, null, 8, 0).err(),
            Some(RefError::null_dereference("reinterpret"))
        );
        assert!(heap.keep_alive().is_empty());
    });
}

#[test]
fn test_reinterpret_keeps_its_source_alive() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 16).unwrap();
        let r = heap.reinterpret(gc, a, 8, 4).unwrap();
        assert_eq!(r.address(), a.address() + 4);
        assert_eq!(r.len(), 8);
        assert_eq!(r.region().attachments(), 1);

        // re-framing the start of a canonical buffer stays on that buffer
        let same = heap.reinterpret(gc, a, 4, 0).unwrap();
        assert!(same.same_region(&a));
        assert_eq!(same.len(), 4);
        assert_eq!(a.region().attachments(), 0);
    });
}

#[test]
fn test_reinterpret_until_zeros_stops_before_the_zero_element() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 16).unwrap();
        for (i, v) in [1, 2, 3].into_iter().enumerate() {
            heap.set(gc, a, i as i64 * 4, Primitive::UInt32, Value::Int(v)).unwrap();
        }
        let r = heap.reinterpret_until_zeros(gc, a, 4, 0).unwrap();
        assert_eq!(r.len(), 12);
        assert!(r.same_region(&a));

        let tail = heap.reinterpret_until_zeros(gc, a, 4, 4).unwrap();
        assert_eq!(tail.len(), 8);
    });
}

#[test]
fn test_reinterpret_until_zeros_is_capped_at_the_scan_bound() {
    let mut runtime = Runtime::with_config(RuntimeConfig::default().with_scan_bound(16));
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 64).unwrap();
        a.copy_from_slice(0, &[0xff; 64]);
        let r = heap.reinterpret_until_zeros(gc, a, 4, 0).unwrap();
        assert_eq!(r.len(), 16);

        let odd = heap.reinterpret_until_zeros(gc, a, 8, 4).unwrap();
        assert_eq!(odd.len(), 16);
    });
}

#[test]
fn test_unsupported_widths_are_rejected_first() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let null = heap.null();
        assert_eq!(
            heap.reinterpret_until_zeros(gc, null, 3, 0).err(),
            Some(RefError::UnsupportedElementWidth(3))
        );
        assert_eq!(
            heap.reinterpret_until_zeros(gc, null, 2, 0).err(),
            Some(RefError::null_dereference("reinterpretUntilZeros"))
        );
    });
}

#[test]
fn test_ref_and_deref() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let target = heap.alloc(gc, 4).unwrap();
        target.copy_from_slice(0, &[1, 2, 3, 4]);
        let pointer = heap.reference(gc, target).unwrap();
        assert_eq!(pointer.len(), refbridge::capability::POINTER_SIZE);

        let back = heap.dereference(gc, pointer, 4).unwrap();
        assert!(back.same_region(&target));
        assert_eq!(back.to_vec(), [1, 2, 3, 4]);
    });
}

#[test]
fn test_cstrings() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let s = heap.alloc_cstring(gc, Some("héllo")).unwrap();
        assert_eq!(s.len(), "héllo".len() + 1);
        assert_eq!(heap.read_cstring(gc, s, 0).unwrap(), "héllo");
        assert_eq!(heap.read_cstring(gc, s, 3).unwrap(), "llo");

        let small = heap.alloc(gc, 3).unwrap();
        heap.write_cstring(small, "héllo", 0).unwrap();
        // "hé" would need 3 bytes plus the terminator
        assert_eq!(small.to_vec(), [b'h', 0, 0]);

        assert!(heap.alloc_cstring(gc, None).unwrap().is_null());
        assert!(matches!(
            heap.write_cstring(small, "x", 3),
            Err(RefError::OutOfRange { .. })
        ));
    });
}

#[test]
fn test_scalars_use_native_width_and_order() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| {
        let a = heap.alloc(gc, 16).unwrap();
        heap.set(gc, a, 0, Primitive::Int16, Value::Int(-2)).unwrap();
        assert_eq!(a.slice(0, 2).to_vec(), (-2i16).to_ne_bytes());
        assert!(matches!(heap.get(gc, a, 0, Primitive::UInt16), Ok(Value::Int(0xfffe))));

        heap.set(gc, a, 8, Primitive::Double, Value::Float(1.5)).unwrap();
        assert!(matches!(heap.get(gc, a, 8, Primitive::Double), Ok(Value::Float(x)) if x == 1.5));

        heap.set(gc, a, 8, Primitive::UInt64, Value::Int(-1)).unwrap();
        let big = heap.get(gc, a, 8, Primitive::UInt64).unwrap();
        assert_eq!(big.as_str(), Some("18446744073709551615"));

        heap.set(gc, a, 0, Primitive::Bool, Value::Bool(true)).unwrap();
        assert!(matches!(heap.get(gc, a, 0, Primitive::Bool), Ok(Value::Bool(true))));

        assert!(matches!(
            heap.get(gc, a, 12, Primitive::Int64),
            Err(RefError::OutOfRange { offset: 12, len: 16, .. })
        ));
        assert!(matches!(
            heap.get(gc, a, -1, Primitive::Int8),
            Err(RefError::OutOfRange { .. })
        ));
    });
}

#[test]
fn test_hex_address() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| {
        let a = heap.alloc(gc, 4).unwrap();
        let expected = format!("{:x}", a.address() + 2);
        assert_eq!(heap.hex_address(gc, a, 2), expected);
        assert_eq!(heap.hex_address(gc, heap.null(), 0), "0");
    });
}
