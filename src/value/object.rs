use crate::value::Value;
use gc_arena::{lock::RefLock, Collect, Collection, Gc, Mutation};
use std::fmt::{Debug, Formatter};

pub type ObjectInner<'gc> = RefLock<HostObject<'gc>>;
pub type ObjectRef<'gc> = Gc<'gc, ObjectInner<'gc>>;

/// A plain managed object: a class tag and an ordered property list.
///
/// These are the values that embedded references point at.
pub struct HostObject<'gc> {
    class: String,
    properties: Vec<(String, Value<'gc>)>,
}

unsafe impl<'gc> Collect for HostObject<'gc> {
    fn trace(&self, cc: &Collection) {
        for (_, value) in &self.properties {
            value.trace(cc);
        }
    }
}

impl<'gc> HostObject<'gc> {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            properties: vec![],
        }
    }

    pub fn alloc(gc: &Mutation<'gc>, class: impl Into<String>) -> ObjectRef<'gc> {
        Gc::new(gc, RefLock::new(Self::new(class)))
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<Value<'gc>> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    pub fn set(&mut self, name: &str, value: Value<'gc>) {
        match self.properties.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl Debug for HostObject<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct(&self.class);
        for (k, v) in &self.properties {
            s.field(k, v);
        }
        s.finish()
    }
}
