//! The render pipeline: an owned DAG of graphics tasks.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use petgraph::algo::is_cyclic_directed;
use petgraph::dot::Dot;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::prelude::EdgeRef;
use petgraph::Direction;

use crate::core::error::Error;
use crate::gpu::queue::QueueKind;
use crate::task::context::TaskFrameState;
use crate::task::{GraphicsTask, UsageRecord};

/// Identifies a task in a [`Pipeline`]. Ids are assigned in insertion order
/// and stay stable for the lifetime of the pipeline; the scheduler uses them
/// to break scheduling ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    fn node(self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

/// A task plus its per-frame scheduling state. Nodes sit behind a mutex so
/// the setup and record passes can work on disjoint nodes from worker
/// threads.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct TaskNode {
    pub name: String,
    #[derivative(Debug = "ignore")]
    pub task: Box<dyn GraphicsTask>,
    /// Usage list from the most recent setup pass, sorted by resource identity.
    pub usages: Vec<UsageRecord>,
    pub frame: TaskFrameState,
    #[derivative(Debug = "ignore")]
    pub init: Option<Box<dyn FnMut() + Send>>,
    #[derivative(Debug = "ignore")]
    pub cleanup: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl TaskNode {
    pub fn new(task: Box<dyn GraphicsTask>) -> Self {
        Self {
            name: task.name().to_owned(),
            task,
            usages: Vec::new(),
            frame: TaskFrameState::default(),
            init: None,
            cleanup: None,
        }
    }
}

/// A DAG of graphics tasks, where an edge `A -> B` means B must start only
/// after A completed on the GPU.
///
/// The graph is acyclic by construction: adding an edge that would close a
/// cycle fails and leaves the pipeline unchanged. While a pipeline is bound
/// to a scheduler it is exclusively owned by it; reclaim ownership with
/// [`Scheduler::release_pipeline`](crate::scheduler::Scheduler::release_pipeline).
#[derive(Debug, Default)]
pub struct Pipeline {
    nodes: Vec<Mutex<TaskNode>>,
    graph: Graph<TaskId, Option<QueueKind>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task to the pipeline and return its id.
    pub fn add_task(&mut self, task: Box<dyn GraphicsTask>) -> TaskId {
        let id = TaskId(self.nodes.len() as u32);
        self.nodes.push(Mutex::new(TaskNode::new(task)));
        self.graph.add_node(id);
        id
    }

    /// Declare that `after` must start only once `before` completed on the GPU.
    /// # Errors
    /// * Fails with [`Error::DanglingEdge`] if either id is not part of this pipeline.
    /// * Fails with [`Error::GraphHasCycle`] if the edge would close a cycle.
    pub fn add_dependency(&mut self, before: TaskId, after: TaskId) -> Result<()> {
        self.add_edge(before, after, None)
    }

    /// Like [`Self::add_dependency`], additionally requesting that `after`
    /// executes on a queue of the given kind.
    pub fn add_dependency_on_queue(
        &mut self,
        before: TaskId,
        after: TaskId,
        queue: QueueKind,
    ) -> Result<()> {
        self.add_edge(before, after, Some(queue))
    }

    fn add_edge(&mut self, before: TaskId, after: TaskId, queue: Option<QueueKind>) -> Result<()> {
        if before.index() >= self.nodes.len() || after.index() >= self.nodes.len() {
            return Err(Error::DanglingEdge.into());
        }
        if before == after {
            return Err(Error::GraphHasCycle.into());
        }
        let edge = self.graph.add_edge(before.node(), after.node(), queue);
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(Error::GraphHasCycle.into());
        }
        Ok(())
    }

    /// Attach a closure that runs on the orchestrating thread right before
    /// the task's command list is handed to its queue.
    pub fn set_init(&mut self, id: TaskId, f: impl FnMut() + Send + 'static) -> Result<()> {
        let node = self.nodes.get(id.index()).ok_or(Error::NodeNotFound)?;
        node.lock().unwrap().init = Some(Box::new(f));
        Ok(())
    }

    /// Attach a closure that runs once the frame fence covering the task's
    /// submission completes.
    pub fn set_cleanup(&mut self, id: TaskId, f: impl Fn() + Send + Sync + 'static) -> Result<()> {
        let node = self.nodes.get(id.index()).ok_or(Error::NodeNotFound)?;
        node.lock().unwrap().cleanup = Some(Arc::new(f));
        Ok(())
    }

    /// Number of tasks in the pipeline.
    pub fn task_count(&self) -> usize {
        self.nodes.len()
    }

    /// Name of a task, if the id belongs to this pipeline.
    pub fn task_name(&self, id: TaskId) -> Option<String> {
        self.nodes
            .get(id.index())
            .map(|node| node.lock().unwrap().name.clone())
    }

    /// All task ids in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> {
        (0..self.nodes.len() as u32).map(TaskId)
    }

    /// Check the pipeline invariant: either empty or a valid DAG. Edges are
    /// validated on insertion already, so this only re-checks acyclicity.
    pub fn validate(&self) -> Result<()> {
        if is_cyclic_directed(&self.graph) {
            return Err(Error::GraphHasCycle.into());
        }
        Ok(())
    }

    /// Render the DAG in graphviz dot format for debugging.
    pub fn dot(&self) -> String {
        let named = self.graph.map(
            |node, _| {
                self.nodes[node.index()].lock().unwrap().name.clone()
            },
            |_, queue| match queue {
                Some(kind) => format!("{kind:?}"),
                None => String::new(),
            },
        );
        format!("{}", Dot::new(&named))
    }

    pub(crate) fn node(&self, id: TaskId) -> &Mutex<TaskNode> {
        &self.nodes[id.index()]
    }

    pub(crate) fn predecessors(&self, id: TaskId) -> Vec<TaskId> {
        let mut preds: Vec<TaskId> = self
            .graph
            .neighbors_directed(id.node(), Direction::Incoming)
            .map(|node| TaskId(node.index() as u32))
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    pub(crate) fn successors(&self, id: TaskId) -> Vec<TaskId> {
        let mut succs: Vec<TaskId> = self
            .graph
            .neighbors_directed(id.node(), Direction::Outgoing)
            .map(|node| TaskId(node.index() as u32))
            .collect();
        succs.sort();
        succs.dedup();
        succs
    }

    pub(crate) fn has_edge(&self, before: TaskId, after: TaskId) -> bool {
        self.graph.find_edge(before.node(), after.node()).is_some()
    }

    /// The queue `id` should execute on: the first queue request among its
    /// incoming edges, scanning predecessors in id order. Graphics if nothing
    /// asks otherwise.
    pub(crate) fn preferred_queue(&self, id: TaskId) -> QueueKind {
        let mut edges: Vec<(TaskId, QueueKind)> = self
            .graph
            .edges_directed(id.node(), Direction::Incoming)
            .filter_map(|edge| {
                edge.weight()
                    .map(|kind| (TaskId(edge.source().index() as u32), kind))
            })
            .collect();
        edges.sort_by_key(|(source, _)| *source);
        edges
            .first()
            .map(|(_, kind)| *kind)
            .unwrap_or(QueueKind::Graphics)
    }
}
