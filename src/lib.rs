//! Deimos is a frame scheduler for real-time render engines built on explicit
//! GPU APIs: the application owns command recording, resource transitions and
//! multi-queue synchronization, and deimos owns making that correct and fast
//! for a whole frame at a time.
//!
//! A frame is described as a [`Pipeline`]: a DAG of [`GraphicsTask`] nodes.
//! Every task first *declares* the resources it will touch and in which
//! states, then *records* one command list. From those declarations the
//! scheduler derives a deterministic execution order, the minimum set of
//! transition barriers between tasks, and which tasks may record and submit
//! concurrently without any barrier between them.
//!
//! # Example
//! ```
//! use anyhow::Result;
//! use deimos::prelude::*;
//!
//! struct TonemapPass {
//!     hdr: GpuResource,
//! }
//!
//! impl GraphicsTask for TonemapPass {
//!     fn name(&self) -> &str {
//!         "tonemap"
//!     }
//!
//!     fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
//!         let target = ctx.back_buffer().clone();
//!         ctx.read(&self.hdr, Subresource::All, ResourceState::ShaderResource);
//!         ctx.write(&target, Subresource::All, ResourceState::RenderTarget);
//!         Ok(())
//!     }
//!
//!     fn execute(&mut self, ctx: &mut RenderContext) -> Result<()> {
//!         let target = ctx.back_buffer().clone();
//!         ctx.set_resource_state(&self.hdr, Subresource::All, ResourceState::ShaderResource)?;
//!         ctx.set_resource_state(&target, Subresource::All, ResourceState::RenderTarget)?;
//!         ctx.draw(3, 1)
//!     }
//! }
//! ```

#[macro_use]
extern crate derivative;

pub mod core;
pub mod frame;
pub mod gpu;
pub mod graph;
pub mod pool;
pub mod prelude;
pub mod scheduler;
pub mod task;

pub use crate::core::error::Error;
pub use frame::FrameContext;
pub use gpu::{
    Command, CommandAllocator, CommandList, CommandQueue, DescriptorHandle, DescriptorHeap, Fence,
    GpuResource, QueueKind, QueueOp, ResourceId, ResourceState, ScratchKind, ScratchRange,
    ScratchSpace, Subresource, TransitionBarrier,
};
pub use graph::{
    build_schedule, can_execute_parallel, inject_barriers, update_states, Pipeline,
    ResourceStateTable, Schedule, TaskId,
};
pub use pool::{Pool, Poolable};
pub use scheduler::{Scheduler, SchedulerCreateInfo};
pub use task::upload::UploadDescription;
pub use task::{GraphicsTask, RenderContext, SetupContext, UsageRecord};
