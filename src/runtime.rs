//! The owner context.
//!
//! A [`Runtime`] owns the arena and is the only place the registry and side tables are ever
//! touched. Collection only discovers dead regions; what they owned is undone later, when the
//! owner drains the release queue in [`Runtime::process_releases`]. Other threads get an
//! [`OwnerProxy`] and queue work instead of touching the heap.
use crate::{
    config::RuntimeConfig,
    heap::Heap,
    memory::Release,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use gc_arena::{Arena, Mutation, Rootable};

pub type HeapArena = Arena<Rootable![Heap<'_>]>;

/// Work sent to the owner from another thread.
pub type Task = Box<dyn for<'gc> FnOnce(&'gc Mutation<'gc>, &mut Heap<'gc>) + Send>;

pub struct Runtime {
    arena: HeapArena,
    releases: Receiver<Release>,
    tasks: Receiver<Task>,
    task_sender: Sender<Task>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn from_env() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let (outbox, releases) = unbounded();
        let (task_sender, tasks) = unbounded();
        tracing::debug!("starting runtime with {config:?}");
        Self {
            arena: HeapArena::new(|gc| Heap::new(gc, config, outbox)),
            releases,
            tasks,
            task_sender,
        }
    }

    pub fn mutate<R>(
        &mut self,
        f: impl for<'gc> FnOnce(&'gc Mutation<'gc>, &mut Heap<'gc>) -> R,
    ) -> R {
        self.arena.mutate_root(|gc, heap| f(gc, heap))
    }

    /// Runs a full collection cycle. Dead regions only post releases here; nothing they held
    /// is dropped until [`Runtime::process_releases`].
    pub fn collect(&mut self) -> usize {
        let mut marked = None;
        while marked.is_none() {
            marked = self.arena.mark_all();
        }
        let finalized = match marked {
            Some(marked) => marked.finalize(|fc, heap| heap.finalize_check(fc)),
            None => 0,
        };
        self.arena.collect_all();
        self.arena.mutate_root(|gc, heap| heap.prune(gc));
        tracing::debug!("collection finished, {finalized} regions finalized");
        finalized
    }

    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }

    /// Applies every release posted so far.
    pub fn process_releases(&mut self) -> usize {
        let releases: Vec<Release> = self.releases.try_iter().collect();
        let count = releases.len();
        if count > 0 {
            self.arena.mutate_root(|gc, heap| {
                for release in releases {
                    heap.apply_release(gc, release);
                }
            });
        }
        count
    }

    /// Runs queued tasks, then applies pending releases. Returns how many tasks ran.
    pub fn turn(&mut self) -> usize {
        let tasks: Vec<Task> = self.tasks.try_iter().collect();
        let count = tasks.len();
        for task in tasks {
            self.arena.mutate_root(|gc, heap| task(gc, heap));
        }
        self.process_releases();
        count
    }

    pub fn proxy(&self) -> OwnerProxy {
        OwnerProxy {
            tasks: self.task_sender.clone(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe handle that queues work for the owner's next [`Runtime::turn`].
#[derive(Clone)]
pub struct OwnerProxy {
    tasks: Sender<Task>,
}

impl OwnerProxy {
    /// Queues `f`. Returns `false` if the runtime is gone.
    pub fn submit(
        &self,
        f: impl for<'gc> FnOnce(&'gc Mutation<'gc>, &mut Heap<'gc>) + Send + 'static,
    ) -> bool {
        self.tasks.send(Box::new(f)).is_ok()
    }
}
