use refbridge::{bindings, capability, GcHandleKind, Runtime, Value};

#[test]
fn test_object_round_trip_and_clear() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 16).unwrap();
        let o = heap.new_object(gc, "Point");
        heap.write_object(gc, a, 8, Some(o)).unwrap();

        let back = heap.read_object(gc, a, 8).unwrap();
        assert!(back.is_some_and(|b| gc_arena::Gc::ptr_eq(b, o)));

        heap.write_object(gc, a, 8, None).unwrap();
        assert!(matches!(heap.read_object(gc, a, 8), Ok(None)));
        assert!(heap.embedded().is_empty());
    });
}

#[test]
fn test_overwriting_replaces_the_previous_object() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, 8).unwrap();
        let first = heap.new_object(gc, "First");
        let second = heap.new_object(gc, "Second");
        heap.write_object(gc, a, 0, Some(first)).unwrap();
        heap.write_object(gc, a, 0, Some(second)).unwrap();

        let back = heap.read_object(gc, a, 0).unwrap().unwrap();
        assert_eq!(back.borrow().class(), "Second");
        assert_eq!(heap.embedded().len(), 1);
    });
}

#[test]
fn test_slots_hold_objects_weakly() {
    let mut runtime = Runtime::new();
    let holder = runtime.mutate(|gc, heap| {
        let a = heap.alloc(gc, 8).unwrap();
        let o = heap.new_object(gc, "Ephemeral");
        unsafe { heap.write_object(gc, a, 0, Some(o)).unwrap() };
        heap.alloc_handle(Value::Buffer(a), GcHandleKind::Normal)
    });

    runtime.collect();
    runtime.mutate(|gc, heap| {
        let a = heap.fetch_handle(gc, holder).unwrap().unwrap();
        let a = a.as_buffer().unwrap();
        assert!(matches!(unsafe { heap.read_object(gc, a, 0) }, Ok(None)));
        assert!(heap.embedded().is_empty());
    });
}

#[test]
fn test_attaching_write_keeps_the_object_while_the_buffer_lives() {
    let mut runtime = Runtime::new();
    let holder = runtime.mutate(|gc, heap| {
        let a = heap.alloc(gc, 8).unwrap();
        let o = heap.new_object(gc, "Pinned");
        let args = [Value::Buffer(a), Value::Int(0), Value::Object(o)];
        unsafe { bindings::invoke(heap, gc, "writeObject", &args).unwrap() };
        heap.alloc_handle(Value::Buffer(a), GcHandleKind::Normal)
    });

    runtime.collect();
    runtime.mutate(|gc, heap| {
        let a = heap.fetch_handle(gc, holder).unwrap().unwrap();
        let a = a.as_buffer().unwrap();
        let back = unsafe { heap.read_object(gc, a, 0) }.unwrap().unwrap();
        assert_eq!(back.borrow().class(), "Pinned");
    });
}

#[test]
fn test_clearing_an_attached_slot_lets_its_object_go() {
    let mut runtime = Runtime::new();
    let (holder, object) = runtime.mutate(|gc, heap| {
        let a = heap.alloc(gc, 8).unwrap();
        let o = heap.new_object(gc, "Replaced");
        unsafe {
            let write = [Value::Buffer(a), Value::Int(0), Value::Object(o)];
            bindings::invoke(heap, gc, "writeObject", &write).unwrap();
            let clear = [Value::Buffer(a), Value::Int(0), Value::Null];
            bindings::invoke(heap, gc, "writeObject", &clear).unwrap();
        }
        assert_eq!(a.region().attachments(), 0);
        (
            heap.alloc_handle(Value::Buffer(a), GcHandleKind::Normal),
            heap.alloc_handle(Value::Object(o), GcHandleKind::Weak),
        )
    });

    runtime.collect();
    runtime.process_releases();
    runtime.collect();
    runtime.mutate(|gc, heap| {
        assert!(heap.fetch_handle(gc, holder).unwrap().is_some());
        assert!(heap.fetch_handle(gc, object).unwrap().is_none());
    });
}

#[test]
fn test_overwriting_an_attached_slot_keeps_only_the_new_object() {
    let mut runtime = Runtime::new();
    let (holder, first, second) = runtime.mutate(|gc, heap| {
        let a = heap.alloc(gc, 8).unwrap();
        let first = heap.new_object(gc, "First");
        let second = heap.new_object(gc, "Second");
        let object = Value::string(gc, "Object");
        unsafe {
            heap.set(gc, a, 0, capability::Primitive::Object, Value::Object(first)).unwrap();
            let args = [Value::Buffer(a), Value::Int(0), object, Value::Object(second)];
            bindings::invoke(heap, gc, "set", &args).unwrap();
        }
        (
            heap.alloc_handle(Value::Buffer(a), GcHandleKind::Normal),
            heap.alloc_handle(Value::Object(first), GcHandleKind::Weak),
            heap.alloc_handle(Value::Object(second), GcHandleKind::Weak),
        )
    });

    runtime.collect();
    runtime.mutate(|gc, heap| {
        assert!(heap.fetch_handle(gc, holder).unwrap().is_some());
        assert!(heap.fetch_handle(gc, first).unwrap().is_none());
        assert!(heap.fetch_handle(gc, second).unwrap().is_some());
    });
}

#[test]
fn test_released_host_memory_forgets_its_slots() {
    let mut runtime = Runtime::new();
    let keeper = runtime.mutate(|gc, heap| {
        let o = heap.new_object(gc, "Survivor");
        let a = heap.alloc(gc, 8).unwrap();
        unsafe { heap.write_object(gc, a, 0, Some(o)).unwrap() };
        heap.alloc_handle(Value::Object(o), GcHandleKind::Normal)
    });

    assert_eq!(runtime.collect(), 1);
    runtime.mutate(|_gc, heap| assert_eq!(heap.embedded().len(), 1));
    runtime.process_releases();
    runtime.mutate(|_gc, heap| {
        assert!(heap.embedded().is_empty());
        heap.free_handle(keeper).unwrap();
    });
}

#[test]
fn test_slot_width_matches_the_capability_table() {
    assert_eq!(
        capability::size_of_type("Object"),
        Ok(capability::OBJECT_HANDLE_SIZE)
    );
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| unsafe {
        let a = heap.alloc(gc, capability::OBJECT_HANDLE_SIZE).unwrap();
        let o = heap.new_object(gc, "Tight");
        heap.write_object(gc, a, 0, Some(o)).unwrap();
        assert!(a.to_vec().iter().any(|b| *b != 0));
    });
}
