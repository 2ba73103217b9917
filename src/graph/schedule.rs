//! Deterministic, parallelism-friendly schedule construction.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::core::error::Error;
use crate::graph::compat::can_execute_parallel;
use crate::graph::pipeline::{Pipeline, TaskId};
use crate::task::UsageRecord;

/// A linear task order consistent with the pipeline DAG.
///
/// Adjacent tasks may additionally be tagged parallel-compatible; such a pair
/// records concurrently and submits without a barrier boundary between their
/// lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    order: Vec<TaskId>,
    parallel_with_previous: Vec<bool>,
}

impl Schedule {
    /// The scheduled task order.
    pub fn order(&self) -> &[TaskId] {
        &self.order
    }

    /// Whether the task at `position` may record and submit concurrently with
    /// the task before it. Position 0 is never parallel with anything.
    pub fn is_parallel_with_previous(&self, position: usize) -> bool {
        self.parallel_with_previous.get(position).copied().unwrap_or(false)
    }

    /// Number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the schedule holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Build the frame's schedule from the pipeline DAG.
///
/// Kahn's algorithm with a deterministic priority: among simultaneously ready
/// tasks the lowest id wins, except that a ready task whose usage list is
/// parallel-compatible with the previously emitted task is preferred. The
/// look-ahead clusters compatible siblings so barrier injection can elide
/// transitions between them. Given the same DAG shape and ids, the result is
/// identical on every run.
pub fn build_schedule(pipeline: &Pipeline) -> Result<Schedule> {
    let count = pipeline.task_count();

    // One snapshot of each usage list; nodes are locked once and never nested.
    let usages: Vec<Vec<UsageRecord>> = pipeline
        .task_ids()
        .map(|id| pipeline.node(id).lock().unwrap().usages.clone())
        .collect();

    let mut indegree = vec![0usize; count];
    for id in pipeline.task_ids() {
        indegree[id.index()] = pipeline.predecessors(id).len();
    }

    let mut ready: BTreeSet<TaskId> = pipeline
        .task_ids()
        .filter(|id| indegree[id.index()] == 0)
        .collect();

    let mut order: Vec<TaskId> = Vec::with_capacity(count);
    while let Some(&first) = ready.iter().next() {
        let pick = match order.last() {
            Some(&previous) => ready
                .iter()
                .copied()
                .find(|&id| clusters_with(pipeline, &usages, previous, id))
                .unwrap_or(first),
            None => first,
        };
        ready.remove(&pick);
        order.push(pick);
        for successor in pipeline.successors(pick) {
            let remaining = &mut indegree[successor.index()];
            *remaining -= 1;
            if *remaining == 0 {
                ready.insert(successor);
            }
        }
    }

    if order.len() != count {
        return Err(Error::GraphHasCycle.into());
    }

    let mut parallel_with_previous = vec![false; order.len()];
    for position in 1..order.len() {
        let previous = order[position - 1];
        let current = order[position];
        parallel_with_previous[position] = clusters_with(pipeline, &usages, previous, current);
    }

    Ok(Schedule {
        order,
        parallel_with_previous,
    })
}

// A pair clusters when their usages cannot conflict and no DAG edge demands
// GPU-side ordering between them.
fn clusters_with(
    pipeline: &Pipeline,
    usages: &[Vec<UsageRecord>],
    previous: TaskId,
    candidate: TaskId,
) -> bool {
    !pipeline.has_edge(previous, candidate)
        && can_execute_parallel(&usages[previous.index()], &usages[candidate.index()])
}
