//! CPU-side shadow of per-subresource resource states.

use std::collections::HashMap;

use crate::gpu::resource::{GpuResource, ResourceId, ResourceState, Subresource};

#[derive(Debug, Clone)]
struct TrackedResource {
    resource: GpuResource,
    states: Vec<ResourceState>,
}

/// Tracks the state of every subresource of every resource the pipeline uses.
///
/// The table advances with CPU command recording, not with GPU execution: it
/// always reflects the state the GPU will observe once the currently enqueued
/// lists finish. That is deliberately ahead of the real GPU timeline and is
/// correct as long as barriers are emitted in submission order. Never replace
/// a table read with a query of actual GPU state.
#[derive(Debug, Clone, Default)]
pub struct ResourceStateTable {
    resources: HashMap<ResourceId, TrackedResource>,
}

impl ResourceStateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `resource` with every subresource in `state`.
    pub fn register(&mut self, resource: &GpuResource, state: ResourceState) {
        self.resources.insert(
            resource.id(),
            TrackedResource {
                resource: resource.clone(),
                states: vec![state; resource.subresource_count() as usize],
            },
        );
    }

    /// Whether `resource` has ever been registered or recorded.
    pub fn is_tracked(&self, resource: &GpuResource) -> bool {
        self.resources.contains_key(&resource.id())
    }

    /// The recorded state of one subresource, or `None` if the resource was
    /// never seen.
    pub fn read(&self, resource: &GpuResource, subresource: u32) -> Option<ResourceState> {
        self.resources
            .get(&resource.id())
            .and_then(|tracked| tracked.states.get(subresource as usize))
            .copied()
    }

    /// Record that the selected subresource(s) are now in `state`. Unseen
    /// resources are registered on the spot.
    pub fn record(&mut self, resource: &GpuResource, subresource: Subresource, state: ResourceState) {
        let tracked = self
            .resources
            .entry(resource.id())
            .or_insert_with(|| TrackedResource {
                resource: resource.clone(),
                states: vec![state; resource.subresource_count() as usize],
            });
        match subresource {
            Subresource::Index(index) => {
                if let Some(slot) = tracked.states.get_mut(index as usize) {
                    *slot = state;
                }
            }
            Subresource::All => {
                tracked.states.fill(state);
            }
        }
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the table tracks nothing.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop entries whose resource handle is no longer held anywhere else.
    /// Called from the resource release path so freed swapchain images and
    /// transient targets do not keep stale state alive.
    pub fn prune(&mut self) {
        self.resources.retain(|_, tracked| !tracked.resource.is_unique());
    }

    /// Copy of the table, taken at the start of a frame for failure rollback.
    pub fn snapshot(&self) -> ResourceStateTable {
        self.clone()
    }

    /// Replace the table contents with a previously taken snapshot.
    pub fn restore(&mut self, snapshot: ResourceStateTable) {
        *self = snapshot;
    }
}
