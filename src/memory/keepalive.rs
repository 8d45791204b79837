//! Pins: values a region must be outlived by, such as the target of a pinned pointer write.
//!
//! A pin `holder -> value` roots `value` until the release of `holder` has been processed.
//! Releases are applied only after the collector has reclaimed the holder, so the target is
//! always collected strictly later than the holder. Plain attachments that need no ordering
//! are traced through the region instead (see [`Region`](crate::value::Region)).
use crate::value::{Buffer, RegionId, Value};
use gc_arena::{Collect, Collection};
use std::collections::HashMap;

#[derive(Default)]
pub struct KeepAliveTable<'gc> {
    links: HashMap<RegionId, Vec<Value<'gc>>>,
}

unsafe impl<'gc> Collect for KeepAliveTable<'gc> {
    fn trace(&self, cc: &Collection) {
        for values in self.links.values() {
            values.trace(cc);
        }
    }
}

impl<'gc> KeepAliveTable<'gc> {
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
        }
    }

    /// Roots `value` until `holder`'s release is applied. Returns whether a pin was added.
    ///
    /// Scalars, pins from the null region and pins from a region to itself are dropped.
    pub fn link(&mut self, holder: &Buffer<'gc>, value: Value<'gc>) -> bool {
        if holder.region().is_null() {
            return false;
        }
        match value {
            Value::Buffer(target) if target.same_region(holder) || target.region().is_null() => {
                return false
            }
            Value::Buffer(_) | Value::Object(_) | Value::Str(_) => {}
            _ => return false,
        }

        let id = holder.region().id();
        tracing::trace!("region #{} now keeps {value:?} alive", id.0);
        self.links.entry(id).or_default().push(value);
        true
    }

    /// Drops every pin held by `holder`; returns how many there were.
    pub fn release(&mut self, holder: RegionId) -> usize {
        self.links.remove(&holder).map_or(0, |v| v.len())
    }

    pub fn len(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
