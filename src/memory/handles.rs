//! Handles that carry managed values across mutation scopes.
//!
//! A `'gc` value cannot escape `Runtime::mutate`, so callers that need to keep one (or merely
//! watch it, for weak handles) until a later mutation park it here and keep the plain
//! [`Handle`] instead.
use crate::{
    error::{RefError, Result},
    heap::Heap,
    value::{Value, WeakValue},
};
use gc_arena::{Collect, Collection, Mutation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub enum GcHandleKind {
    /// Does not keep the value alive; fetching after collection yields nothing.
    Weak,
    /// Roots the value until the handle is freed.
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub usize);

enum Entry<'gc> {
    Weak(WeakValue<'gc>),
    Normal(Value<'gc>),
}

unsafe impl<'gc> Collect for Entry<'gc> {
    fn trace(&self, cc: &Collection) {
        match self {
            Entry::Weak(w) => w.trace(cc),
            Entry::Normal(v) => v.trace(cc),
        }
    }
}

#[derive(Default)]
pub struct HandleTable<'gc> {
    entries: Vec<Option<Entry<'gc>>>,
}

unsafe impl<'gc> Collect for HandleTable<'gc> {
    fn trace(&self, cc: &Collection) {
        for entry in self.entries.iter().flatten() {
            entry.trace(cc);
        }
    }
}

impl<'gc> HandleTable<'gc> {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    pub fn alloc(&mut self, value: Value<'gc>, kind: GcHandleKind) -> Handle {
        let entry = match kind {
            GcHandleKind::Weak => Entry::Weak(value.downgrade()),
            GcHandleKind::Normal => Entry::Normal(value),
        };
        match self.entries.iter().position(Option::is_none) {
            Some(index) => {
                self.entries[index] = Some(entry);
                Handle(index)
            }
            None => {
                self.entries.push(Some(entry));
                Handle(self.entries.len() - 1)
            }
        }
    }

    /// `Ok(None)` when a weak handle's value has been collected.
    pub fn fetch(&self, gc: &Mutation<'gc>, handle: Handle) -> Result<Option<Value<'gc>>> {
        match self.entries.get(handle.0) {
            Some(Some(Entry::Normal(v))) => Ok(Some(*v)),
            Some(Some(Entry::Weak(w))) => Ok(w.upgrade(gc)),
            _ => Err(RefError::InvalidHandle(handle.0)),
        }
    }

    pub fn free(&mut self, handle: Handle) -> Result<()> {
        match self.entries.get_mut(handle.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(RefError::InvalidHandle(handle.0)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'gc> Heap<'gc> {
    pub fn alloc_handle(&mut self, value: Value<'gc>, kind: GcHandleKind) -> Handle {
        self.handles.alloc(value, kind)
    }

    pub fn fetch_handle(&self, gc: &Mutation<'gc>, handle: Handle) -> Result<Option<Value<'gc>>> {
        self.handles.fetch(gc, handle)
    }

    pub fn free_handle(&mut self, handle: Handle) -> Result<()> {
        self.handles.free(handle)
    }
}
