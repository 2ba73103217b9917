//! Graphics tasks: the setup/execute contract and declared resource usages.
//!
//! A task goes through two phases every frame. *Setup* declares, ahead of any
//! recording, every resource the task will touch and in which states; it may
//! also grab transient descriptor slots and constant ranges. *Execute* then
//! records exactly one command list. The split is what lets the scheduler
//! gather all cross-task synchronization before recording starts and emit
//! barriers in one batch per task.

pub mod context;
pub mod upload;

use anyhow::Result;

pub use context::{RenderContext, SetupContext};

use crate::gpu::resource::{GpuResource, ResourceState, Subresource};

/// A task's declared use of one (resource, subresource) pair.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// The used resource.
    pub resource: GpuResource,
    /// Which subresource(s) the task touches.
    pub subresource: Subresource,
    /// State a preceding barrier batch must establish before the task's list runs.
    pub first_state: ResourceState,
    /// State the task leaves the subresource(s) in.
    pub last_state: ResourceState,
    /// True iff the task uses the resource in more than one distinct state
    /// internally, or writes it. Such a task is never parallel-compatible
    /// with any other user of the same resource.
    pub multiple_use: bool,
}

/// A node in the render pipeline.
///
/// Implementations are opaque to the scheduler: it only sees the usage list
/// produced by [`setup`](GraphicsTask::setup) and the command list recorded by
/// [`execute`](GraphicsTask::execute). Both phases run on worker threads.
pub trait GraphicsTask: Send {
    /// Name of the task, used in diagnostics and submission streams.
    fn name(&self) -> &str;

    /// Declare resource usages and acquire transient allocations.
    ///
    /// Must be pure with respect to the GPU: no command recording, no global
    /// state mutation beyond transient allocations through the context.
    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()>;

    /// Record the task's single command list through the context.
    fn execute(&mut self, ctx: &mut RenderContext) -> Result<()>;

    /// Drop rendering resources held by the task. Called from the resource
    /// release path before a swapchain resize.
    fn release_resources(&mut self) {}
}
