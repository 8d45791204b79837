use refbridge::{GcHandleKind, Runtime, Value};

/// Memory the runtime does not own, standing in for a native allocation.
fn foreign_block() -> usize {
    Box::leak(Box::new([0u8; 64])).as_mut_ptr() as usize
}

#[test]
fn test_wrap_is_idempotent_while_the_buffer_lives() {
    let mut runtime = Runtime::new();
    let p = foreign_block();
    runtime.mutate(|gc, heap| {
        let a = unsafe { heap.wrap(gc, p, 8) }.unwrap();
        let b = unsafe { heap.wrap(gc, p, 32) }.unwrap();
        assert!(a.same_region(&b));
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 32);
        assert_eq!(heap.address(gc, b, 0), p);
        assert_eq!(heap.live_count(p), 1);
    });
}

#[test]
fn test_host_buffers_become_canonical_once_their_address_is_taken() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| {
        let host = heap.alloc(gc, 16).unwrap();
        let p = heap.address(gc, host, 0);
        let wrapped = unsafe { heap.wrap(gc, p, 16) }.unwrap();
        assert!(wrapped.same_region(&host));
        assert_eq!(heap.live_count(p), 1);

        // asking again does not register twice
        heap.address(gc, host, 4);
        assert_eq!(heap.live_count(p), 1);
    });
}

#[test]
fn test_n_registrations_need_n_releases() {
    let mut runtime = Runtime::new();
    let p = foreign_block();

    // first generation dies, but its release stays queued
    runtime.mutate(|gc, heap| {
        unsafe { heap.wrap(gc, p, 8).unwrap() };
    });
    assert_eq!(runtime.collect(), 1);
    assert_eq!(runtime.pending_releases(), 1);

    // second generation re-establishes the entry before the release is applied
    let handle = runtime.mutate(|gc, heap| {
        let second = unsafe { heap.wrap(gc, p, 8) }.unwrap();
        assert_eq!(heap.live_count(p), 2);
        heap.alloc_handle(Value::Buffer(second), GcHandleKind::Normal)
    });

    assert_eq!(runtime.process_releases(), 1);
    runtime.mutate(|gc, heap| {
        assert_eq!(heap.live_count(p), 1);
        let held = heap.fetch_handle(gc, handle).unwrap();
        let canonical = heap.canonical(gc, p);
        assert!(matches!(
            (held, canonical),
            (Some(Value::Buffer(h)), Some(c)) if h.same_region(&c)
        ));
        heap.free_handle(handle).unwrap();
    });

    assert_eq!(runtime.collect(), 1);
    runtime.process_releases();
    runtime.mutate(|gc, heap| {
        assert_eq!(heap.live_count(p), 0);
        assert!(heap.canonical(gc, p).is_none());
        assert!(heap.registry().is_empty());
    });
}

#[test]
fn test_null_address_is_never_registered() {
    let mut runtime = Runtime::new();
    runtime.mutate(|gc, heap| {
        let null = unsafe { heap.wrap(gc, 0, 100) }.unwrap();
        assert_eq!(null.len(), 0);
        assert!(heap.is_null(null));
        assert!(null.same_region(&heap.null()));
        assert_eq!(heap.address(gc, null, 0), 0);
        assert!(heap.registry().is_empty());
    });
}

#[test]
fn test_collection_without_processing_keeps_the_stale_entry() {
    let mut runtime = Runtime::new();
    let p = foreign_block();
    runtime.mutate(|gc, heap| {
        unsafe { heap.wrap(gc, p, 8).unwrap() };
    });
    runtime.collect();
    runtime.mutate(|gc, heap| {
        assert!(heap.canonical(gc, p).is_none());
        assert_eq!(heap.live_count(p), 1);
    });
    runtime.process_releases();
    runtime.mutate(|_gc, heap| assert_eq!(heap.live_count(p), 0));
}
