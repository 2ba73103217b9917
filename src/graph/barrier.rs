//! Barrier injection: the minimum transitions establishing a task's entry states.

use crate::gpu::command::TransitionBarrier;
use crate::gpu::resource::{GpuResource, ResourceState, Subresource};
use crate::graph::state_table::ResourceStateTable;
use crate::task::UsageRecord;

/// Compute the transition batch that must precede a task's command list.
///
/// For every usage the table state is compared against the declared entry
/// state; a barrier is emitted only when they differ, so a batch never
/// contains a `from == to` transition. All-subresource usages fan out to one
/// comparison per subresource index.
///
/// A usage of a resource the table has never seen is handled locally: the
/// current state is assumed to equal the entry state, no barrier is emitted,
/// and a warning is surfaced. The resource is registered so the assumption is
/// recorded.
pub fn inject_barriers(usages: &[UsageRecord], table: &mut ResourceStateTable) -> Vec<TransitionBarrier> {
    let mut barriers = Vec::new();
    for usage in usages {
        if !table.is_tracked(&usage.resource) {
            log::warn!(
                "resource `{}` has no recorded state, assuming `{:?}`",
                usage.resource.name(),
                usage.first_state
            );
            table.register(&usage.resource, usage.first_state);
        }
        match usage.subresource {
            Subresource::Index(index) => {
                push_transition(table, &usage.resource, index, usage.first_state, &mut barriers);
            }
            Subresource::All => {
                for index in 0..usage.resource.subresource_count() {
                    push_transition(table, &usage.resource, index, usage.first_state, &mut barriers);
                }
            }
        }
    }
    barriers
}

fn push_transition(
    table: &ResourceStateTable,
    resource: &GpuResource,
    subresource: u32,
    target: ResourceState,
    out: &mut Vec<TransitionBarrier>,
) {
    let Some(current) = table.read(resource, subresource) else {
        return;
    };
    if current != target {
        out.push(TransitionBarrier {
            resource: resource.clone(),
            subresource,
            from: current,
            to: target,
        });
    }
}

/// Advance the table past a task: every used subresource now shows the state
/// the task leaves it in. Runs after the task's list joined the submission
/// stream, in schedule order.
pub fn update_states(usages: &[UsageRecord], table: &mut ResourceStateTable) {
    for usage in usages {
        table.record(&usage.resource, usage.subresource, usage.last_state);
    }
}
