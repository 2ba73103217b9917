//! Descriptor heap with free-list handle recycling.

use std::sync::Mutex;

use anyhow::Result;

use crate::core::error::Error;

/// Handle into a [`DescriptorHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle(u32);

impl DescriptorHandle {
    /// Slot index of this handle inside its heap.
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
struct HeapInner {
    next: u32,
    free: Vec<u32>,
}

/// A fixed-capacity heap of descriptor slots.
///
/// Allocation pops the free list before growing into untouched capacity, so
/// transient per-frame handles keep reusing the same slots. Freeing a handle
/// twice corrupts the free list; callers own that invariant.
#[derive(Debug)]
pub struct DescriptorHeap {
    capacity: u32,
    inner: Mutex<HeapInner>,
}

impl DescriptorHeap {
    /// Create a heap with room for `capacity` descriptors.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            inner: Mutex::new(HeapInner {
                next: 0,
                free: Vec::new(),
            }),
        }
    }

    /// Total number of slots in the heap.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots currently handed out.
    pub fn allocated(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.next - inner.free.len() as u32
    }

    /// Allocate one descriptor slot.
    /// # Errors
    /// * Fails if every slot of the heap is in use.
    pub fn allocate(&self) -> Result<DescriptorHandle> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(index) = inner.free.pop() {
            return Ok(DescriptorHandle(index));
        }
        if inner.next == self.capacity {
            return Err(Error::DescriptorHeapFull.into());
        }
        let index = inner.next;
        inner.next += 1;
        Ok(DescriptorHandle(index))
    }

    /// Return a slot to the heap.
    pub fn free(&self, handle: DescriptorHandle) {
        self.inner.lock().unwrap().free.push(handle.0);
    }
}
