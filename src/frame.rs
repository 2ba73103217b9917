//! Per-frame inputs handed to the scheduler by the engine.

use std::sync::Arc;

use crate::gpu::command::CommandAllocator;
use crate::gpu::descriptor::DescriptorHeap;
use crate::gpu::fence::Fence;
use crate::gpu::queue::{CommandQueue, QueueKind};
use crate::gpu::resource::GpuResource;
use crate::gpu::scratch::ScratchSpace;
use crate::pool::Pool;
use crate::task::upload::UploadDescription;

/// Everything the scheduler needs to run one frame.
///
/// The engine owns the queues, pools and fence across frames; the context
/// only borrows them for the duration of [`Scheduler::execute`](crate::scheduler::Scheduler::execute).
/// `fence_value` is the value the frame fence is signaled to once the frame's
/// submissions retire; it must be strictly greater than any previously used
/// value.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct FrameContext {
    /// Index of the frame being rendered.
    pub frame_index: u64,
    /// The swapchain image this frame renders into.
    pub back_buffer: GpuResource,
    /// Queue for graphics work. Also signals the frame fence.
    pub graphics_queue: Arc<CommandQueue>,
    /// Queue for async compute work.
    pub compute_queue: Arc<CommandQueue>,
    /// Queue for copy work, including the implicit upload task.
    pub copy_queue: Arc<CommandQueue>,
    /// Pool of command allocators, keyed by queue kind.
    #[derivative(Debug = "ignore")]
    pub allocators: Pool<CommandAllocator>,
    /// Pool of scratch spaces, keyed by scratch kind.
    #[derivative(Debug = "ignore")]
    pub scratch: Pool<ScratchSpace>,
    /// Heap for transient descriptor allocations.
    pub descriptors: Arc<DescriptorHeap>,
    /// Data to upload at the head of the frame.
    pub uploads: Vec<UploadDescription>,
    /// The frame fence; cleanup work is registered against it.
    pub fence: Fence,
    /// Value the fence reaches when this frame's GPU work is done.
    pub fence_value: u64,
}

impl FrameContext {
    /// The queue executing work of the given kind.
    pub fn queue(&self, kind: QueueKind) -> &Arc<CommandQueue> {
        match kind {
            QueueKind::Graphics => &self.graphics_queue,
            QueueKind::Compute => &self.compute_queue,
            QueueKind::Copy => &self.copy_queue,
        }
    }
}
