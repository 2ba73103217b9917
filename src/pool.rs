//! Object pools for command allocators and scratch spaces.
//!
//! Pools are arena-like: each frame draws objects out and parks them again
//! behind the frame's fence value. An object sits in one of two places, a
//! keyed free list or an in-flight list tagged with the fence value that
//! releases it. Reclamation runs from a cleanup registered on the fence, so
//! items return to the free list exactly once GPU work that used them is done.

use std::hash::Hash;
use std::sync::{Arc, Mutex};

use multimap::MultiMap;

use crate::gpu::command::CommandAllocator;
use crate::gpu::fence::Fence;
use crate::gpu::queue::QueueKind;
use crate::gpu::scratch::{ScratchKind, ScratchSpace};

/// Indicates that this object can be pooled in a [`Pool`].
pub trait Poolable {
    /// Key used to identify this pooled object in the object pool.
    type Key: Clone + Hash + PartialEq + Eq + Send;

    /// Called right before the object returns to the free list; resets
    /// internal state.
    fn on_release(&mut self);
}

type BoxedCreateFn<P> = Box<dyn Fn(&<P as Poolable>::Key) -> P + Send>;

struct PoolInner<P: Poolable> {
    free: MultiMap<P::Key, P>,
    in_flight: Vec<(u64, P::Key, P)>,
    create_fn: BoxedCreateFn<P>,
}

/// A pool of reusable objects, shared by cloning.
pub struct Pool<P: Poolable> {
    inner: Arc<Mutex<PoolInner<P>>>,
}

impl<P: Poolable> Clone for Pool<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Poolable> Pool<P> {
    /// Create a new pool. The callback is invoked whenever an acquire finds
    /// the free list for its key empty.
    pub fn new(create_fn: impl Fn(&P::Key) -> P + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                free: MultiMap::new(),
                in_flight: Vec::new(),
                create_fn: Box::new(create_fn),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PoolInner<P>) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    /// Grab an object from the pool, allocating a new one if the free list
    /// for `key` is empty.
    pub fn acquire(&self, key: &P::Key) -> P {
        self.with(|pool| match pool.free.get_vec_mut(key).and_then(Vec::pop) {
            Some(item) => item,
            None => (pool.create_fn)(key),
        })
    }

    /// Return an object to the free list immediately. Used on the frame
    /// failure path, where partially recorded work is discarded before it
    /// ever reaches a queue.
    pub fn release(&self, key: P::Key, mut item: P) {
        item.on_release();
        self.with(|pool| pool.free.insert(key, item));
    }

    /// Move items whose fence value has been reached back to the free list.
    pub fn reclaim(&self, completed: u64) {
        self.with(|pool| {
            let mut i = 0;
            while i < pool.in_flight.len() {
                if pool.in_flight[i].0 <= completed {
                    let (_, key, mut item) = pool.in_flight.swap_remove(i);
                    item.on_release();
                    pool.free.insert(key, item);
                } else {
                    i += 1;
                }
            }
        })
    }

    /// Number of objects currently parked behind a fence value.
    pub fn in_flight_count(&self) -> usize {
        self.with(|pool| pool.in_flight.len())
    }

    /// Number of objects on the free lists.
    pub fn free_count(&self) -> usize {
        self.with(|pool| pool.free.iter_all().map(|(_, items)| items.len()).sum())
    }
}

impl<P: Poolable + Send + 'static> Pool<P> {
    /// Park an object until `fence` reaches `value`, then return it to the
    /// free list. The reclaim is registered as a cleanup on the fence.
    pub fn retire(&self, key: P::Key, item: P, fence: &Fence, value: u64) {
        self.with(|pool| pool.in_flight.push((value, key, item)));
        let pool = self.clone();
        fence.on_completion(value, move || pool.reclaim(value));
    }
}

impl Poolable for CommandAllocator {
    type Key = QueueKind;

    fn on_release(&mut self) {
        self.reset();
    }
}

impl Poolable for ScratchSpace {
    type Key = ScratchKind;

    fn on_release(&mut self) {
        self.reset();
    }
}
