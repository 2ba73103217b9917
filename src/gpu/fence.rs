//! Fences for CPU-GPU synchronization.

use std::fmt;
use std::sync::{Arc, Mutex};

type CleanupFn = Box<dyn FnOnce() + Send>;

struct FenceInner {
    completed: u64,
    cleanups: Vec<(u64, CleanupFn)>,
}

/// A monotonic counter signaled by a command queue and observed by the CPU.
///
/// Cleanup closures can be registered against a future value; they run exactly
/// once, when the counter first reaches that value. Pools use this to return
/// command allocators and scratch spaces once the GPU is done with a frame.
#[derive(Clone)]
pub struct Fence {
    inner: Arc<Mutex<FenceInner>>,
}

impl Fence {
    /// Create a new fence with a completed value of zero.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FenceInner {
                completed: 0,
                cleanups: Vec::new(),
            })),
        }
    }

    /// The last value the fence completed.
    pub fn completed_value(&self) -> u64 {
        self.inner.lock().unwrap().completed
    }

    /// Whether the fence has reached `value`.
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    /// Register a closure to run when the fence reaches `value`. Runs
    /// immediately if the fence is already past it.
    pub fn on_completion(&self, value: u64, f: impl FnOnce() + Send + 'static) {
        let mut inner = self.inner.lock().unwrap();
        if inner.completed >= value {
            drop(inner);
            f();
        } else {
            inner.cleanups.push((value, Box::new(f)));
        }
    }

    /// Advance the fence to `value`. Values only move forward; signaling a
    /// value at or below the current one is a no-op. Due cleanup closures run
    /// on the signaling thread, outside the fence lock.
    pub fn signal(&self, value: u64) {
        let due = {
            let mut inner = self.inner.lock().unwrap();
            if value <= inner.completed {
                return;
            }
            inner.completed = value;
            let mut due = Vec::new();
            let mut i = 0;
            while i < inner.cleanups.len() {
                if inner.cleanups[i].0 <= value {
                    due.push(inner.cleanups.swap_remove(i).1);
                } else {
                    i += 1;
                }
            }
            due
        };
        for f in due {
            f();
        }
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("completed", &self.completed_value())
            .finish()
    }
}
