#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;

use deimos::prelude::*;

/// Engine-side objects that outlive individual frames.
pub struct Engine {
    pub graphics_queue: Arc<CommandQueue>,
    pub compute_queue: Arc<CommandQueue>,
    pub copy_queue: Arc<CommandQueue>,
    pub allocators: Pool<CommandAllocator>,
    pub scratch: Pool<ScratchSpace>,
    pub descriptors: Arc<DescriptorHeap>,
    pub back_buffer: GpuResource,
    pub fence: Fence,
}

/// Creates the queues, pools and fence a scheduler test needs.
pub fn make_engine() -> Engine {
    Engine {
        graphics_queue: Arc::new(CommandQueue::new(QueueKind::Graphics)),
        compute_queue: Arc::new(CommandQueue::new(QueueKind::Compute)),
        copy_queue: Arc::new(CommandQueue::new(QueueKind::Copy)),
        allocators: Pool::new(|kind: &QueueKind| CommandAllocator::new(*kind)),
        scratch: Pool::new(|kind: &ScratchKind| ScratchSpace::new(*kind, 64 * 1024, 256)),
        descriptors: Arc::new(DescriptorHeap::new(256)),
        back_buffer: GpuResource::new("back_buffer", 1),
        fence: Fence::new(),
    }
}

impl Engine {
    /// Frame context for frame `index`, signaling the shared fence at `index + 1`.
    pub fn frame(&self, index: u64) -> FrameContext {
        FrameContext {
            frame_index: index,
            back_buffer: self.back_buffer.clone(),
            graphics_queue: self.graphics_queue.clone(),
            compute_queue: self.compute_queue.clone(),
            copy_queue: self.copy_queue.clone(),
            allocators: self.allocators.clone(),
            scratch: self.scratch.clone(),
            descriptors: self.descriptors.clone(),
            uploads: vec![],
            fence: self.fence.clone(),
            fence_value: index + 1,
        }
    }
}

/// Build a usage record.
pub fn usage(
    resource: &GpuResource,
    subresource: Subresource,
    first: ResourceState,
    last: ResourceState,
    multiple_use: bool,
) -> UsageRecord {
    UsageRecord {
        resource: resource.clone(),
        subresource,
        first_state: first,
        last_state: last,
        multiple_use,
    }
}

/// Single-state read of the whole resource.
pub fn read_usage(resource: &GpuResource, state: ResourceState) -> UsageRecord {
    usage(resource, Subresource::All, state, state, false)
}

/// Single-state write of the whole resource.
pub fn write_usage(resource: &GpuResource, state: ResourceState) -> UsageRecord {
    usage(resource, Subresource::All, state, state, true)
}

/// Sort a usage list the way the setup pass does.
pub fn sorted(mut usages: Vec<UsageRecord>) -> Vec<UsageRecord> {
    usages.sort_by(|a, b| a.resource.cmp(&b.resource));
    usages
}

/// A task that declares a fixed usage list and records a single draw,
/// optionally failing in either phase.
pub struct DeclaredTask {
    name: String,
    usages: Vec<UsageRecord>,
    fail_setup: bool,
    fail_execute: bool,
    transients: bool,
}

impl DeclaredTask {
    pub fn new(name: impl Into<String>, usages: Vec<UsageRecord>) -> Self {
        Self {
            name: name.into(),
            usages,
            fail_setup: false,
            fail_execute: false,
            transients: false,
        }
    }

    /// Also allocate a transient descriptor and constant range during setup.
    pub fn with_transients(mut self) -> Self {
        self.transients = true;
        self
    }

    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    pub fn failing_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }
}

impl GraphicsTask for DeclaredTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        if self.fail_setup {
            anyhow::bail!("induced setup failure");
        }
        for usage in &self.usages {
            ctx.declare(usage.clone());
        }
        if self.transients {
            ctx.allocate_descriptor()?;
            ctx.allocate_constants(256)?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut RenderContext) -> Result<()> {
        for usage in &self.usages {
            ctx.set_resource_state(&usage.resource, usage.subresource, usage.first_state)?;
        }
        if self.fail_execute {
            anyhow::bail!("induced execute failure");
        }
        ctx.draw(3, 1)?;
        for usage in &self.usages {
            if usage.last_state != usage.first_state {
                ctx.set_resource_state(&usage.resource, usage.subresource, usage.last_state)?;
            }
        }
        Ok(())
    }
}

/// The transition barriers of one command list.
pub fn transitions(list: &CommandList) -> Vec<TransitionBarrier> {
    list.commands()
        .iter()
        .filter_map(|command| match command {
            Command::Transition(barrier) => Some(barrier.clone()),
            _ => None,
        })
        .collect()
}

/// All transition barriers in a queue's submission stream, in order.
pub fn all_transitions(queue: &CommandQueue) -> Vec<TransitionBarrier> {
    queue
        .submitted_lists()
        .iter()
        .flat_map(|list| transitions(list))
        .collect()
}

/// Names of the lists a queue received, in submission order.
pub fn list_names(queue: &CommandQueue) -> Vec<String> {
    queue
        .submitted_lists()
        .iter()
        .map(|list| list.name().to_owned())
        .collect()
}
