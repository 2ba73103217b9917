//! The command-stream layer the scheduler records against.
//!
//! This is the crate's model of an explicit GPU API: resources with
//! per-subresource states, command lists created from resettable allocators,
//! serial command queues, monotonic fences and transient descriptor/scratch
//! allocation. Everything is recorded as plain data, so a frame can be
//! scheduled, synchronized and inspected without a device; a backend consumes
//! the queues' submission streams.

pub mod command;
pub mod descriptor;
pub mod fence;
pub mod queue;
pub mod resource;
pub mod scratch;

pub use command::{Command, CommandAllocator, CommandList, TransitionBarrier};
pub use descriptor::{DescriptorHandle, DescriptorHeap};
pub use fence::Fence;
pub use queue::{CommandQueue, QueueKind, QueueOp};
pub use resource::{GpuResource, ResourceId, ResourceState, Subresource};
pub use scratch::{ScratchKind, ScratchRange, ScratchSpace};
