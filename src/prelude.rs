//! Re-exports the types needed for day-to-day use of the scheduler.

pub use crate::core::error::Error;
pub use crate::frame::FrameContext;
pub use crate::gpu::command::{Command, CommandAllocator, CommandList, TransitionBarrier};
pub use crate::gpu::descriptor::{DescriptorHandle, DescriptorHeap};
pub use crate::gpu::fence::Fence;
pub use crate::gpu::queue::{CommandQueue, QueueKind, QueueOp};
pub use crate::gpu::resource::{GpuResource, ResourceState, Subresource};
pub use crate::gpu::scratch::{ScratchKind, ScratchRange, ScratchSpace};
pub use crate::graph::pipeline::{Pipeline, TaskId};
pub use crate::graph::schedule::Schedule;
pub use crate::pool::{Pool, Poolable};
pub use crate::scheduler::{Scheduler, SchedulerCreateInfo};
pub use crate::task::upload::UploadDescription;
pub use crate::task::{GraphicsTask, RenderContext, SetupContext, UsageRecord};
