use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;

use deimos::prelude::*;

mod framework;

use framework::{all_transitions, list_names, make_engine, read_usage, write_usage, DeclaredTask};

fn make_scheduler() -> Scheduler {
    Scheduler::new(SchedulerCreateInfo {
        worker_count: 2,
        ..Default::default()
    })
}

#[test]
pub fn single_task_single_resource() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new(
        "draw",
        vec![write_usage(&texture, ResourceState::RenderTarget)],
    )));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    assert_eq!(list_names(&engine.graphics_queue), vec!["draw.barriers", "draw"]);
    let transitions = all_transitions(&engine.graphics_queue);
    assert_eq!(
        transitions,
        vec![TransitionBarrier {
            resource: texture.clone(),
            subresource: 0,
            from: ResourceState::Common,
            to: ResourceState::RenderTarget,
        }]
    );
    assert_eq!(
        scheduler.state_table().read(&texture, 0),
        Some(ResourceState::RenderTarget)
    );
    assert!(engine.fence.is_complete(1));
    Ok(())
}

#[test]
pub fn linear_chain_re_transitions() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    let a = pipeline.add_task(Box::new(DeclaredTask::new(
        "a",
        vec![write_usage(&texture, ResourceState::RenderTarget)],
    )));
    let b = pipeline.add_task(Box::new(DeclaredTask::new(
        "b",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));
    pipeline.add_dependency(a, b)?;

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    assert_eq!(
        list_names(&engine.graphics_queue),
        vec!["a.barriers", "a", "b.barriers", "b"]
    );
    let transitions = all_transitions(&engine.graphics_queue);
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].from, ResourceState::Common);
    assert_eq!(transitions[0].to, ResourceState::RenderTarget);
    assert_eq!(transitions[1].from, ResourceState::RenderTarget);
    assert_eq!(transitions[1].to, ResourceState::ShaderResource);
    Ok(())
}

#[test]
pub fn compatible_pair_shares_one_barrier_batch() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new(
        "a",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));
    pipeline.add_task(Box::new(DeclaredTask::new(
        "b",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    // One barrier establishes the shared state; the second list follows
    // without any intervening batch.
    assert_eq!(list_names(&engine.graphics_queue), vec!["a.barriers", "a", "b"]);
    assert_eq!(all_transitions(&engine.graphics_queue).len(), 1);
    Ok(())
}

#[test]
pub fn incompatible_pair_is_serialized() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new(
        "a",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));
    pipeline.add_task(Box::new(DeclaredTask::new(
        "b",
        vec![write_usage(&texture, ResourceState::UnorderedAccess)],
    )));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    assert_eq!(
        list_names(&engine.graphics_queue),
        vec!["a.barriers", "a", "b.barriers", "b"]
    );
    let transitions = all_transitions(&engine.graphics_queue);
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[1].from, ResourceState::ShaderResource);
    assert_eq!(transitions[1].to, ResourceState::UnorderedAccess);
    Ok(())
}

#[test]
pub fn lookahead_clusters_compatible_tasks() -> Result<()> {
    // a and c read the same texture, b writes it. With all three ready the
    // builder emits c right after a so their shared barrier batch covers both.
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new(
        "a",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));
    pipeline.add_task(Box::new(DeclaredTask::new(
        "b",
        vec![write_usage(&texture, ResourceState::UnorderedAccess)],
    )));
    pipeline.add_task(Box::new(DeclaredTask::new(
        "c",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    assert_eq!(
        list_names(&engine.graphics_queue),
        vec!["a.barriers", "a", "c", "b.barriers", "b"]
    );
    Ok(())
}

#[test]
pub fn execute_failure_renders_failure_screen() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);
    let other = GpuResource::new("other", 1);
    let failure_color = [1.0, 0.0, 0.5, 1.0];

    let mut pipeline = Pipeline::new();
    let ok = pipeline.add_task(Box::new(DeclaredTask::new(
        "ok",
        vec![write_usage(&texture, ResourceState::RenderTarget)],
    )));
    let bad = pipeline.add_task(Box::new(
        DeclaredTask::new("bad", vec![write_usage(&other, ResourceState::UnorderedAccess)])
            .failing_execute(),
    ));
    pipeline.add_dependency(ok, bad)?;

    let mut scheduler = Scheduler::new(SchedulerCreateInfo {
        worker_count: 2,
        max_parallel_record: None,
        failure_color,
    });
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.register_resource(&other, ResourceState::Common)?;
    scheduler.register_resource(&engine.back_buffer, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;

    let error = scheduler.execute(engine.frame(0)).unwrap_err();
    match error.downcast_ref::<Error>() {
        Some(Error::ExecuteFailed {
            task, ..
        }) => assert_eq!(task, "bad"),
        other => panic!("expected ExecuteFailed, got {other:?}"),
    }

    // Task usages from the aborted frame leave no trace in the table.
    assert_eq!(
        scheduler.state_table().read(&texture, 0),
        Some(ResourceState::Common)
    );
    assert_eq!(
        scheduler.state_table().read(&other, 0),
        Some(ResourceState::Common)
    );

    // The only submission is the failure screen, and the fence chain is intact.
    assert_eq!(list_names(&engine.graphics_queue), vec!["_failure_screen"]);
    let lists = engine.graphics_queue.submitted_lists();
    let commands = lists[0].commands();
    assert_eq!(
        commands[0],
        Command::Transition(TransitionBarrier {
            resource: engine.back_buffer.clone(),
            subresource: 0,
            from: ResourceState::Common,
            to: ResourceState::RenderTarget,
        })
    );
    assert_eq!(
        commands[1],
        Command::ClearTarget {
            target: engine.back_buffer.clone(),
            color: failure_color.map(f32::to_bits),
        }
    );
    assert_eq!(
        commands[2],
        Command::Transition(TransitionBarrier {
            resource: engine.back_buffer.clone(),
            subresource: 0,
            from: ResourceState::RenderTarget,
            to: ResourceState::Present,
        })
    );
    assert!(engine.fence.is_complete(1));
    assert_eq!(engine.allocators.in_flight_count(), 0);

    // The next frame runs normally.
    // (The failing task fails again, so swap the pipeline for a clean one.)
    let mut clean = Pipeline::new();
    clean.add_task(Box::new(DeclaredTask::new(
        "ok",
        vec![write_usage(&texture, ResourceState::RenderTarget)],
    )));
    scheduler.set_pipeline(clean)?;
    scheduler.execute(engine.frame(1))?;
    assert!(engine.fence.is_complete(2));
    Ok(())
}

#[test]
pub fn setup_failure_aborts_frame() -> Result<()> {
    let engine = make_engine();

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new("broken", vec![]).failing_setup()));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&engine.back_buffer, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;

    let error = scheduler.execute(engine.frame(0)).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::SetupFailed { .. })
    ));
    assert_eq!(list_names(&engine.graphics_queue), vec!["_failure_screen"]);
    assert!(engine.fence.is_complete(1));
    Ok(())
}

#[test]
pub fn uploads_flow_through_barrier_injection() -> Result<()> {
    let engine = make_engine();
    let staging = GpuResource::new("staging", 1);
    let target = GpuResource::new("mesh_data", 1);

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new(
        "consume",
        vec![read_usage(&target, ResourceState::ShaderResource)],
    )));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&staging, ResourceState::CopySource)?;
    scheduler.register_resource(&target, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;

    let mut frame = engine.frame(0);
    frame.uploads.push(UploadDescription {
        staging: staging.clone(),
        target: target.clone(),
        subresource: Subresource::All,
        post_state: ResourceState::ShaderResource,
    });
    scheduler.execute(frame)?;

    // The upload runs on the copy queue: one injected barrier batch brings
    // the target to copy-dest, the in-list transition hands it over to its
    // post-upload state.
    assert_eq!(
        list_names(&engine.copy_queue),
        vec!["_upload.barriers", "_upload"]
    );
    let copy_lists = engine.copy_queue.submitted_lists();
    assert_eq!(
        framework::transitions(&copy_lists[0]),
        vec![TransitionBarrier {
            resource: target.clone(),
            subresource: 0,
            from: ResourceState::Common,
            to: ResourceState::CopyDest,
        }]
    );
    assert!(copy_lists[1].commands().contains(&Command::CopyResource {
        src: staging.clone(),
        dst: target.clone(),
    }));
    assert_eq!(
        framework::transitions(&copy_lists[1]),
        vec![TransitionBarrier {
            resource: target.clone(),
            subresource: 0,
            from: ResourceState::CopyDest,
            to: ResourceState::ShaderResource,
        }]
    );

    // The consumer needs no further barrier, but must wait for the copy
    // queue before its list runs.
    assert_eq!(list_names(&engine.graphics_queue), vec!["consume"]);
    let waited = engine
        .graphics_queue
        .with_stream(|stream| matches!(stream[0], QueueOp::Wait { .. }));
    assert!(waited, "cross-queue edge must insert a fence wait");
    let signaled = engine
        .copy_queue
        .with_stream(|stream| stream.iter().any(|op| matches!(op, QueueOp::Signal { .. })));
    assert!(signaled, "copy queue must signal for the cross-queue edge");

    assert_eq!(
        scheduler.state_table().read(&target, 0),
        Some(ResourceState::ShaderResource)
    );
    Ok(())
}

#[test]
pub fn queue_preference_routes_submission() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    let produce = pipeline.add_task(Box::new(DeclaredTask::new(
        "produce",
        vec![write_usage(&texture, ResourceState::UnorderedAccess)],
    )));
    let reduce = pipeline.add_task(Box::new(DeclaredTask::new(
        "reduce",
        vec![read_usage(&texture, ResourceState::ShaderResource)],
    )));
    pipeline.add_dependency_on_queue(produce, reduce, QueueKind::Compute)?;

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    // The successor and its barrier batch land on the requested queue.
    assert_eq!(
        list_names(&engine.graphics_queue),
        vec!["produce.barriers", "produce"]
    );
    assert_eq!(
        list_names(&engine.compute_queue),
        vec!["reduce.barriers", "reduce"]
    );
    assert_eq!(
        all_transitions(&engine.compute_queue),
        vec![TransitionBarrier {
            resource: texture.clone(),
            subresource: 0,
            from: ResourceState::UnorderedAccess,
            to: ResourceState::ShaderResource,
        }]
    );

    // The edge crosses queues, so the producer signals and the consumer waits.
    let waited = engine
        .compute_queue
        .with_stream(|stream| matches!(stream[0], QueueOp::Wait { .. }));
    assert!(waited, "cross-queue edge must insert a fence wait");
    let signaled = engine
        .graphics_queue
        .with_stream(|stream| stream.iter().any(|op| matches!(op, QueueOp::Signal { .. })));
    assert!(signaled, "producer queue must signal for the cross-queue edge");
    Ok(())
}

#[test]
pub fn transient_allocations_return_on_fence_completion() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(
        DeclaredTask::new("draw", vec![write_usage(&texture, ResourceState::RenderTarget)])
            .with_transients(),
    ));

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    // The queue model retires work at submission, so the frame fence has
    // already completed and everything is back in the pools.
    assert_eq!(engine.allocators.in_flight_count(), 0);
    assert!(engine.allocators.free_count() >= 2, "task + patch allocator");
    assert_eq!(engine.scratch.in_flight_count(), 0);
    assert!(engine.scratch.free_count() >= 1);
    assert_eq!(engine.descriptors.allocated(), 0);
    Ok(())
}

#[test]
pub fn init_and_cleanup_closures_run() -> Result<()> {
    let engine = make_engine();
    let texture = GpuResource::new("texture", 1);

    let init_runs = Arc::new(AtomicUsize::new(0));
    let cleanup_runs = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new();
    let draw = pipeline.add_task(Box::new(DeclaredTask::new(
        "draw",
        vec![write_usage(&texture, ResourceState::RenderTarget)],
    )));
    let counter = init_runs.clone();
    pipeline.set_init(draw, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })?;
    let counter = cleanup_runs.clone();
    pipeline.set_cleanup(draw, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })?;

    let mut scheduler = make_scheduler();
    scheduler.register_resource(&texture, ResourceState::Common)?;
    scheduler.set_pipeline(pipeline)?;
    scheduler.execute(engine.frame(0))?;

    assert_eq!(init_runs.load(Ordering::SeqCst), 1);
    assert_eq!(cleanup_runs.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
pub fn submission_streams_are_deterministic() -> Result<()> {
    let x = GpuResource::new("x", 1);
    let y = GpuResource::new("y", 1);

    let build = || -> Result<(framework::Engine, Scheduler)> {
        let engine = make_engine();
        let mut pipeline = Pipeline::new();
        let a = pipeline.add_task(Box::new(DeclaredTask::new(
            "a",
            vec![write_usage(&x, ResourceState::RenderTarget)],
        )));
        let b = pipeline.add_task(Box::new(DeclaredTask::new(
            "b",
            vec![
                read_usage(&x, ResourceState::ShaderResource),
                write_usage(&y, ResourceState::UnorderedAccess),
            ],
        )));
        pipeline.add_dependency(a, b)?;

        let mut scheduler = make_scheduler();
        scheduler.register_resource(&x, ResourceState::Common)?;
        scheduler.register_resource(&y, ResourceState::Common)?;
        scheduler.set_pipeline(pipeline)?;
        Ok((engine, scheduler))
    };

    let (engine1, mut scheduler1) = build()?;
    let (engine2, mut scheduler2) = build()?;
    scheduler1.execute(engine1.frame(0))?;
    scheduler2.execute(engine2.frame(0))?;

    let lists1 = engine1.graphics_queue.submitted_lists();
    let lists2 = engine2.graphics_queue.submitted_lists();
    assert_eq!(lists1.len(), lists2.len());
    for (one, two) in lists1.iter().zip(&lists2) {
        assert_eq!(one.name(), two.name());
        assert_eq!(one.commands(), two.commands());
    }
    Ok(())
}

#[test]
pub fn lifecycle_errors_are_surfaced() {
    let engine = make_engine();
    let mut scheduler = make_scheduler();

    let error = scheduler.execute(engine.frame(0)).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::EmptyPipeline)
    ));

    let error = scheduler.release_pipeline().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::EmptyPipeline)
    ));
}

#[test]
pub fn release_resources_prunes_dead_state() -> Result<()> {
    let mut scheduler = make_scheduler();
    scheduler.set_pipeline(Pipeline::new())?;

    let keep = GpuResource::new("keep", 1);
    scheduler.register_resource(&keep, ResourceState::Common)?;
    {
        let transient = GpuResource::new("transient", 1);
        scheduler.register_resource(&transient, ResourceState::Common)?;
        assert!(scheduler.state_table().is_tracked(&transient));
    }

    scheduler.release_resources()?;
    assert!(scheduler.state_table().is_tracked(&keep));
    assert_eq!(scheduler.state_table().len(), 1);
    Ok(())
}

#[test]
pub fn pipeline_ownership_round_trips() -> Result<()> {
    let mut pipeline = Pipeline::new();
    pipeline.add_task(Box::new(DeclaredTask::new("a", vec![])));

    let mut scheduler = make_scheduler();
    scheduler.set_pipeline(pipeline)?;
    assert!(scheduler.pipeline().is_some());

    let reclaimed = scheduler.release_pipeline()?;
    assert_eq!(reclaimed.task_count(), 1);
    assert!(scheduler.pipeline().is_none());
    Ok(())
}
