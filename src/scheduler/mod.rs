//! The frame scheduler: turns the bound pipeline into an ordered, synchronized
//! stream of command lists.
//!
//! Each frame runs six steps: a parallel setup pass collecting usage
//! declarations, schedule construction, a parallel record pass gated by the
//! DAG and the compatibility oracle, barrier-injected assembly in schedule
//! order, submission with fence-gated cleanup, and an implicit upload task at
//! the head of the frame. Any failure aborts the frame, rolls the shadow
//! state table back and presents a failure screen instead, keeping the fence
//! chain intact so the next frame can run.

mod worker;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::core::error::Error;
use crate::frame::FrameContext;
use crate::gpu::command::{Command, CommandAllocator};
use crate::gpu::fence::Fence;
use crate::gpu::queue::QueueKind;
use crate::gpu::resource::{GpuResource, ResourceState, Subresource};
use crate::gpu::scratch::ScratchKind;
use crate::graph::barrier::{inject_barriers, update_states};
use crate::graph::compat::can_execute_parallel;
use crate::graph::pipeline::{Pipeline, TaskId, TaskNode};
use crate::graph::schedule::{build_schedule, Schedule};
use crate::graph::state_table::ResourceStateTable;
use crate::task::context::{SetupContext, TaskFrameState};
use crate::task::upload::UploadTask;
use crate::task::{RenderContext, UsageRecord};
use crate::scheduler::worker::WorkerPool;

/// Configuration recognized at scheduler construction.
#[derive(Debug, Clone)]
pub struct SchedulerCreateInfo {
    /// Number of workers running setup and record jobs. Clamped to at least 1.
    pub worker_count: usize,
    /// Upper bound on simultaneously recording tasks. Defaults to `worker_count`.
    pub max_parallel_record: Option<usize>,
    /// RGBA color the failure screen clears the back buffer to.
    pub failure_color: [f32; 4],
}

impl Default for SchedulerCreateInfo {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_parallel_record: None,
            failure_color: [1.0, 0.0, 0.5, 1.0],
        }
    }
}

/// The frame scheduler.
///
/// Owns the bound [`Pipeline`] and the [`ResourceStateTable`], and is driven
/// from a single orchestrating thread; only task setup and execute bodies run
/// on the worker pool.
#[derive(Debug)]
pub struct Scheduler {
    pipeline: Option<Pipeline>,
    states: ResourceStateTable,
    workers: WorkerPool,
    max_parallel_record: usize,
    failure_color: [f32; 4],
    in_frame: bool,
    invalidated: bool,
}

impl Scheduler {
    /// Create a scheduler with the given configuration.
    pub fn new(info: SchedulerCreateInfo) -> Self {
        let worker_count = info.worker_count.max(1);
        Self {
            pipeline: None,
            states: ResourceStateTable::new(),
            workers: WorkerPool::new(worker_count),
            max_parallel_record: info.max_parallel_record.unwrap_or(worker_count).max(1),
            failure_color: info.failure_color,
            in_frame: false,
            invalidated: false,
        }
    }

    /// Bind a pipeline. The scheduler has exclusive access to it until
    /// [`Self::release_pipeline`].
    /// # Errors
    /// * Fails with [`Error::PipelineBusy`] while a frame is in flight.
    /// * Fails with [`Error::GraphHasCycle`] if the pipeline is not a valid DAG.
    pub fn set_pipeline(&mut self, pipeline: Pipeline) -> Result<()> {
        if self.in_frame {
            return Err(Error::PipelineBusy.into());
        }
        pipeline.validate()?;
        self.invalidated = false;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Read-only access to the bound pipeline.
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Reclaim ownership of the pipeline, leaving the scheduler empty.
    /// # Errors
    /// * Fails with [`Error::PipelineBusy`] while a frame is in flight.
    /// * Fails with [`Error::EmptyPipeline`] if no pipeline is bound.
    pub fn release_pipeline(&mut self) -> Result<Pipeline> {
        if self.in_frame {
            return Err(Error::PipelineBusy.into());
        }
        self.pipeline.take().ok_or_else(|| Error::EmptyPipeline.into())
    }

    /// Instruct every task to drop its rendering resources and forget cached
    /// state. Call before a swapchain resize so old back buffers can be freed
    /// before new ones are allocated.
    /// # Errors
    /// * Fails with [`Error::PipelineBusy`] while a frame is in flight.
    pub fn release_resources(&mut self) -> Result<()> {
        if self.in_frame {
            return Err(Error::PipelineBusy.into());
        }
        if let Some(pipeline) = &self.pipeline {
            for id in pipeline.task_ids() {
                let mut node = pipeline.node(id).lock().unwrap();
                node.task.release_resources();
                node.usages.clear();
                node.frame = TaskFrameState::default();
            }
        }
        self.states.prune();
        Ok(())
    }

    /// Seed the shadow state table with the current state of a resource.
    /// Resources the table has never seen are otherwise assumed to already be
    /// in whatever state their first user declares, with a warning.
    /// # Errors
    /// * Fails with [`Error::PipelineBusy`] while a frame is in flight.
    pub fn register_resource(&mut self, resource: &GpuResource, state: ResourceState) -> Result<()> {
        if self.in_frame {
            return Err(Error::PipelineBusy.into());
        }
        self.states.register(resource, state);
        Ok(())
    }

    /// The shadow state table, reflecting the state the GPU will observe once
    /// everything enqueued so far finishes.
    pub fn state_table(&self) -> &ResourceStateTable {
        &self.states
    }

    /// Whether a frame is currently executing.
    pub fn is_frame_in_flight(&self) -> bool {
        self.in_frame
    }

    /// Run one frame of the bound pipeline.
    ///
    /// On failure the frame is aborted: partially recorded lists are
    /// discarded, allocators reset, the state table rolls back to its
    /// pre-frame snapshot, and a failure screen clearing the back buffer is
    /// submitted in the frame's place so the fence chain stays intact. The
    /// original error is returned. A submission failure additionally
    /// invalidates the pipeline until it is replaced.
    pub fn execute(&mut self, context: FrameContext) -> Result<()> {
        if self.in_frame {
            return Err(Error::PipelineBusy.into());
        }
        if self.invalidated {
            return Err(Error::PipelineInvalidated.into());
        }
        if self.pipeline.is_none() {
            return Err(Error::EmptyPipeline.into());
        }

        self.in_frame = true;
        let snapshot = self.states.snapshot();
        let result = self.run_frame(&context);
        self.in_frame = false;

        match result {
            Ok(()) => Ok(()),
            Err(error) => {
                self.states.restore(snapshot);
                if matches!(error.downcast_ref::<Error>(), Some(Error::SubmissionFailed { .. })) {
                    self.invalidated = true;
                }
                log::error!("frame {} aborted: {:#}", context.frame_index, error);
                self.render_failure_screen(&context);
                Err(error)
            }
        }
    }

    fn run_frame(&mut self, context: &FrameContext) -> Result<()> {
        let upload_node = (!context.uploads.is_empty()).then(|| {
            Mutex::new(TaskNode::new(Box::new(UploadTask::new(context.uploads.clone()))))
        });

        let result = self.run_frame_inner(context, upload_node.as_ref());
        if result.is_err() {
            if let Some(upload) = &upload_node {
                discard_node_frame(&mut upload.lock().unwrap().frame, context);
            }
            if let Some(pipeline) = &self.pipeline {
                for id in pipeline.task_ids() {
                    discard_node_frame(&mut pipeline.node(id).lock().unwrap().frame, context);
                }
            }
        }
        result
    }

    fn run_frame_inner(
        &mut self,
        context: &FrameContext,
        upload_node: Option<&Mutex<TaskNode>>,
    ) -> Result<()> {
        let max_parallel = self.max_parallel_record;
        let Self {
            pipeline,
            states,
            workers,
            ..
        } = self;
        let pipeline = pipeline.as_ref().ok_or(Error::EmptyPipeline)?;

        // 1. Setup pass, in parallel over the worker pool.
        let failures = workers.run_indexed(pipeline.task_count(), |index| {
            let mut node = pipeline.node(TaskId(index as u32)).lock().unwrap();
            run_setup(&mut node, context)
        });
        if let Some((index, source)) = failures.into_iter().next() {
            let task = pipeline.task_name(TaskId(index as u32)).unwrap_or_default();
            return Err(Error::SetupFailed {
                task,
                source,
            }
            .into());
        }
        if let Some(upload) = upload_node {
            let mut node = upload.lock().unwrap();
            let name = node.name.clone();
            run_setup(&mut node, context).map_err(|source| Error::SetupFailed {
                task: name,
                source,
            })?;
        }

        // 2. Schedule.
        let schedule: Schedule = build_schedule(pipeline)?;

        // 3. Record pass. Slot 0 is the implicit upload task when the frame
        // has pending uploads; every other task implicitly depends on it.
        let mut slots: Vec<&Mutex<TaskNode>> = Vec::with_capacity(schedule.len() + 1);
        let mut queues: Vec<QueueKind> = Vec::with_capacity(schedule.len() + 1);
        if let Some(upload) = upload_node {
            slots.push(upload);
            queues.push(QueueKind::Copy);
        }
        let upload_slots = slots.len();
        slots.extend(schedule.order().iter().map(|&id| pipeline.node(id)));
        queues.extend(schedule.order().iter().map(|&id| pipeline.preferred_queue(id)));

        let mut position_of = vec![0usize; pipeline.task_count()];
        for (position, &id) in schedule.order().iter().enumerate() {
            position_of[id.index()] = upload_slots + position;
        }
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); upload_slots];
        for &id in schedule.order() {
            let mut list: Vec<usize> = pipeline
                .predecessors(id)
                .iter()
                .map(|pred| position_of[pred.index()])
                .collect();
            list.extend(0..upload_slots);
            preds.push(list);
        }

        let usage_lists: Vec<Vec<UsageRecord>> = slots
            .iter()
            .map(|slot| slot.lock().unwrap().usages.clone())
            .collect();
        let slot_count = slots.len();
        let mut compat = vec![vec![true; slot_count]; slot_count];
        for i in 0..slot_count {
            for j in 0..i {
                let ok = can_execute_parallel(&usage_lists[i], &usage_lists[j]);
                compat[i][j] = ok;
                compat[j][i] = ok;
            }
        }

        let failures = workers.run_gated(
            slot_count,
            max_parallel,
            |slot, done, running| {
                preds[slot].iter().all(|&pred| done[pred])
                    && running
                        .iter()
                        .enumerate()
                        .all(|(other, &active)| !active || compat[slot][other])
            },
            |slot| {
                let mut node = slots[slot].lock().unwrap();
                run_record(&mut node, queues[slot], context)
            },
        );
        if let Some((slot, source)) = failures.into_iter().next() {
            let task = slots[slot].lock().unwrap().name.clone();
            return Err(Error::ExecuteFailed {
                task,
                source,
            }
            .into());
        }

        // 4 & 5. Assemble the submission stream and enqueue it.
        let mut patch_allocators = HashMap::new();
        let result = assemble_and_submit(context, &slots, &queues, &preds, states, &mut patch_allocators);
        match result {
            Ok(()) => {
                for (kind, allocator) in patch_allocators {
                    context
                        .allocators
                        .retire(kind, allocator, &context.fence, context.fence_value);
                }
                context.graphics_queue.signal(&context.fence, context.fence_value);
                Ok(())
            }
            Err(error) => {
                for (kind, allocator) in patch_allocators {
                    context.allocators.release(kind, allocator);
                }
                Err(error)
            }
        }
    }

    // Records and submits the minimal frame replacing an aborted one: clear
    // the back buffer to the failure color and hand it to present. Runs
    // against the restored state table so its transitions keep the shadow
    // state consistent with what actually reaches the queue.
    fn render_failure_screen(&mut self, context: &FrameContext) {
        let usages = vec![UsageRecord {
            resource: context.back_buffer.clone(),
            subresource: Subresource::All,
            first_state: ResourceState::RenderTarget,
            last_state: ResourceState::Present,
            multiple_use: true,
        }];
        let barriers = inject_barriers(&usages, &mut self.states);

        let mut allocator = context.allocators.acquire(&QueueKind::Graphics);
        let mut list = allocator.create_list("_failure_screen");
        let recorded = (|| -> Result<()> {
            for barrier in barriers {
                list.record(Command::Transition(barrier))?;
            }
            let mut ctx = RenderContext::new(
                context.frame_index,
                context.back_buffer.clone(),
                list,
                None,
                context.scratch.clone(),
            );
            ctx.set_resource_state(&context.back_buffer, Subresource::All, ResourceState::RenderTarget)?;
            ctx.clear_target(&context.back_buffer, self.failure_color)?;
            ctx.set_resource_state(&context.back_buffer, Subresource::All, ResourceState::Present)?;
            let (list, _) = ctx.finish();
            context.graphics_queue.submit(list)?;
            Ok(())
        })();

        match recorded {
            Ok(()) => {
                update_states(&usages, &mut self.states);
                context.allocators.retire(
                    QueueKind::Graphics,
                    allocator,
                    &context.fence,
                    context.fence_value,
                );
            }
            Err(error) => {
                log::error!("failure screen could not be submitted: {:#}", error);
                context.allocators.release(QueueKind::Graphics, allocator);
            }
        }
        // Keep the fence chain intact either way so later frames can run.
        context.graphics_queue.signal(&context.fence, context.fence_value);
    }
}

fn run_setup(node: &mut TaskNode, context: &FrameContext) -> Result<()> {
    let mut ctx = SetupContext::new(
        context.frame_index,
        context.back_buffer.clone(),
        context.descriptors.clone(),
        context.scratch.clone(),
    );
    node.task.setup(&mut ctx)?;
    let (usages, frame) = ctx.finish();
    node.usages = usages;
    node.frame = frame;
    Ok(())
}

fn run_record(node: &mut TaskNode, queue: QueueKind, context: &FrameContext) -> Result<()> {
    let mut allocator = context.allocators.acquire(&queue);
    let list = allocator.create_list(node.name.clone());
    let constants = node.frame.constants.take();
    let mut ctx = RenderContext::new(
        context.frame_index,
        context.back_buffer.clone(),
        list,
        constants,
        context.scratch.clone(),
    );
    let result = node.task.execute(&mut ctx);
    let (list, constants) = ctx.finish();
    node.frame.constants = constants;
    node.frame.allocator = Some(allocator);
    node.frame.list = Some(list);
    result
}

fn assemble_and_submit(
    context: &FrameContext,
    slots: &[&Mutex<TaskNode>],
    queues: &[QueueKind],
    preds: &[Vec<usize>],
    states: &mut ResourceStateTable,
    patch_allocators: &mut HashMap<QueueKind, CommandAllocator>,
) -> Result<()> {
    // A slot must signal when some successor executes on a different queue.
    let mut needs_signal = vec![false; slots.len()];
    for slot in 0..slots.len() {
        for &pred in &preds[slot] {
            if queues[pred] != queues[slot] {
                needs_signal[pred] = true;
            }
        }
    }

    let sync_fence = Fence::new();
    let mut signaled_at = vec![0u64; slots.len()];
    let mut next_sync = 0u64;

    for slot in 0..slots.len() {
        let mut node = slots[slot].lock().unwrap();
        let node = &mut *node;
        let queue = context.queue(queues[slot]);

        if let Some(init) = node.init.as_mut() {
            init();
        }
        for &pred in &preds[slot] {
            if queues[pred] != queues[slot] {
                queue.wait(&sync_fence, signaled_at[pred]);
            }
        }

        let barriers = inject_barriers(&node.usages, states);
        if !barriers.is_empty() {
            // A list is only submittable to a queue matching the allocator it
            // came from, so patch lists draw from an allocator of the slot's
            // own queue kind.
            let patch_allocator = patch_allocators
                .entry(queues[slot])
                .or_insert_with(|| context.allocators.acquire(&queues[slot]));
            let mut patch = patch_allocator.create_list(format!("{}.barriers", node.name));
            for barrier in barriers {
                patch.record(Command::Transition(barrier))?;
            }
            patch.close();
            queue.submit(patch).map_err(|source| Error::SubmissionFailed {
                list: format!("{}.barriers", node.name),
                source,
            })?;
        }

        let list = node
            .frame
            .list
            .take()
            .ok_or(Error::Uncategorized("record pass left no command list"))?;
        queue.submit(list).map_err(|source| Error::SubmissionFailed {
            list: node.name.clone(),
            source,
        })?;
        update_states(&node.usages, states);

        if needs_signal[slot] {
            next_sync += 1;
            queue.signal(&sync_fence, next_sync);
            signaled_at[slot] = next_sync;
        }

        if let Some(cleanup) = &node.cleanup {
            let cleanup = cleanup.clone();
            context
                .fence
                .on_completion(context.fence_value, move || cleanup());
        }
        if let Some(allocator) = node.frame.allocator.take() {
            context
                .allocators
                .retire(allocator.kind(), allocator, &context.fence, context.fence_value);
        }
        if let Some(constants) = node.frame.constants.take() {
            context.scratch.retire(
                ScratchKind::Constants,
                constants,
                &context.fence,
                context.fence_value,
            );
        }
        if !node.frame.descriptors.is_empty() {
            let heap = context.descriptors.clone();
            let handles = std::mem::take(&mut node.frame.descriptors);
            context.fence.on_completion(context.fence_value, move || {
                for handle in handles {
                    heap.free(handle);
                }
            });
        }
    }

    Ok(())
}

fn discard_node_frame(frame: &mut TaskFrameState, context: &FrameContext) {
    if let Some(allocator) = frame.allocator.take() {
        let kind = allocator.kind();
        context.allocators.release(kind, allocator);
    }
    if let Some(constants) = frame.constants.take() {
        context.scratch.release(ScratchKind::Constants, constants);
    }
    for handle in frame.descriptors.drain(..) {
        context.descriptors.free(handle);
    }
    frame.list = None;
}
