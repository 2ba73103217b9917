//! The contexts handed to a task's setup and execute phases.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::gpu::command::{Command, CommandAllocator, CommandList, TransitionBarrier};
use crate::gpu::descriptor::{DescriptorHandle, DescriptorHeap};
use crate::gpu::resource::{GpuResource, ResourceId, ResourceState, Subresource};
use crate::gpu::scratch::{ScratchKind, ScratchRange, ScratchSpace};
use crate::pool::Pool;
use crate::task::UsageRecord;

/// Per-frame transient state of one task node: what setup allocated and what
/// execute recorded. Reset every frame; drained back to the pools once the
/// frame fence completes.
#[derive(Debug, Default)]
pub(crate) struct TaskFrameState {
    pub constants: Option<ScratchSpace>,
    pub descriptors: Vec<DescriptorHandle>,
    pub allocator: Option<CommandAllocator>,
    pub list: Option<CommandList>,
}

/// Passed to [`GraphicsTask::setup`](crate::task::GraphicsTask::setup).
///
/// Collects the task's usage declarations and transient allocations. Setup is
/// GPU-pure: nothing here records commands or changes resource states.
pub struct SetupContext {
    frame_index: u64,
    back_buffer: GpuResource,
    descriptor_heap: Arc<DescriptorHeap>,
    scratch_pool: Pool<ScratchSpace>,
    usages: Vec<UsageRecord>,
    constants: Option<ScratchSpace>,
    descriptors: Vec<DescriptorHandle>,
}

impl SetupContext {
    pub(crate) fn new(
        frame_index: u64,
        back_buffer: GpuResource,
        descriptor_heap: Arc<DescriptorHeap>,
        scratch_pool: Pool<ScratchSpace>,
    ) -> Self {
        Self {
            frame_index,
            back_buffer,
            descriptor_heap,
            scratch_pool,
            usages: Vec::new(),
            constants: None,
            descriptors: Vec::new(),
        }
    }

    /// Index of the frame being set up.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The frame's back buffer.
    pub fn back_buffer(&self) -> &GpuResource {
        &self.back_buffer
    }

    /// Declare a raw usage record.
    pub fn declare(&mut self, usage: UsageRecord) {
        self.usages.push(usage);
    }

    /// Declare a single-state read of `resource`.
    pub fn read(&mut self, resource: &GpuResource, subresource: Subresource, state: ResourceState) {
        self.declare(UsageRecord {
            resource: resource.clone(),
            subresource,
            first_state: state,
            last_state: state,
            multiple_use: false,
        });
    }

    /// Declare a write of `resource` in `state`. Writers are never
    /// parallel-compatible with other users of the resource.
    pub fn write(&mut self, resource: &GpuResource, subresource: Subresource, state: ResourceState) {
        self.declare(UsageRecord {
            resource: resource.clone(),
            subresource,
            first_state: state,
            last_state: state,
            multiple_use: true,
        });
    }

    /// Declare that the task enters with `first` and leaves the resource in
    /// `last`, transitioning inside its own command list.
    pub fn transition(
        &mut self,
        resource: &GpuResource,
        subresource: Subresource,
        first: ResourceState,
        last: ResourceState,
    ) {
        self.declare(UsageRecord {
            resource: resource.clone(),
            subresource,
            first_state: first,
            last_state: last,
            multiple_use: true,
        });
    }

    /// Allocate a transient descriptor slot, freed once the frame's fence completes.
    pub fn allocate_descriptor(&mut self) -> Result<DescriptorHandle> {
        let handle = self.descriptor_heap.allocate()?;
        self.descriptors.push(handle);
        Ok(handle)
    }

    /// Allocate a transient constant range, valid for this frame only.
    pub fn allocate_constants(&mut self, size: u64) -> Result<ScratchRange> {
        let constants = self
            .constants
            .get_or_insert_with(|| self.scratch_pool.acquire(&ScratchKind::Constants));
        constants.allocate(size)
    }

    /// Sorted usage list plus the frame state carrying transient allocations.
    pub(crate) fn finish(mut self) -> (Vec<UsageRecord>, TaskFrameState) {
        // Sort by resource identity so compatibility merge walks are linear;
        // the subresource key keeps the order reproducible across runs.
        self.usages.sort_by_key(|usage| {
            (usage.resource.id(), match usage.subresource {
                Subresource::Index(index) => index,
                Subresource::All => u32::MAX,
            })
        });
        let state = TaskFrameState {
            constants: self.constants,
            descriptors: self.descriptors,
            allocator: None,
            list: None,
        };
        (self.usages, state)
    }
}

/// Passed to [`GraphicsTask::execute`](crate::task::GraphicsTask::execute).
/// Owns the one command list the task records.
pub struct RenderContext {
    frame_index: u64,
    back_buffer: GpuResource,
    list: CommandList,
    constants: Option<ScratchSpace>,
    scratch_pool: Pool<ScratchSpace>,
    declared: HashMap<(ResourceId, u32), ResourceState>,
}

impl RenderContext {
    pub(crate) fn new(
        frame_index: u64,
        back_buffer: GpuResource,
        list: CommandList,
        constants: Option<ScratchSpace>,
        scratch_pool: Pool<ScratchSpace>,
    ) -> Self {
        Self {
            frame_index,
            back_buffer,
            list,
            constants,
            scratch_pool,
            declared: HashMap::new(),
        }
    }

    /// Index of the frame being recorded.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The frame's back buffer.
    pub fn back_buffer(&self) -> &GpuResource {
        &self.back_buffer
    }

    /// Announce the state a resource must be in for the commands that follow.
    ///
    /// The first call per (resource, subresource) records no barrier: it
    /// declares the entry state the scheduler establishes ahead of this list.
    /// Later calls emit real transition barriers inside the list.
    pub fn set_resource_state(
        &mut self,
        resource: &GpuResource,
        subresource: Subresource,
        state: ResourceState,
    ) -> Result<()> {
        match subresource {
            Subresource::Index(index) => self.set_subresource_state(resource, index, state),
            Subresource::All => {
                for index in 0..resource.subresource_count() {
                    self.set_subresource_state(resource, index, state)?;
                }
                Ok(())
            }
        }
    }

    fn set_subresource_state(
        &mut self,
        resource: &GpuResource,
        index: u32,
        state: ResourceState,
    ) -> Result<()> {
        match self.declared.insert((resource.id(), index), state) {
            None => Ok(()),
            Some(previous) if previous == state => Ok(()),
            Some(previous) => self.list.record(Command::Transition(TransitionBarrier {
                resource: resource.clone(),
                subresource: index,
                from: previous,
                to: state,
            })),
        }
    }

    /// Record a render target clear.
    pub fn clear_target(&mut self, target: &GpuResource, color: [f32; 4]) -> Result<()> {
        self.list.record(Command::ClearTarget {
            target: target.clone(),
            color: color.map(f32::to_bits),
        })
    }

    /// Record a non-indexed draw.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.list.record(Command::Draw {
            vertex_count,
            instance_count,
        })
    }

    /// Record a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.list.record(Command::Dispatch {
            groups: [x, y, z],
        })
    }

    /// Record a full resource copy.
    pub fn copy_resource(&mut self, src: &GpuResource, dst: &GpuResource) -> Result<()> {
        self.list.record(Command::CopyResource {
            src: src.clone(),
            dst: dst.clone(),
        })
    }

    /// Allocate a transient constant range, valid for this frame only.
    pub fn allocate_constants(&mut self, size: u64) -> Result<ScratchRange> {
        let constants = self
            .constants
            .get_or_insert_with(|| self.scratch_pool.acquire(&ScratchKind::Constants));
        constants.allocate(size)
    }

    pub(crate) fn finish(mut self) -> (CommandList, Option<ScratchSpace>) {
        self.list.close();
        (self.list, self.constants)
    }
}
