//! Exposes the deimos error type

use thiserror::Error;

/// Error type that deimos can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Render pipeline contains a cycle and is impossible to schedule.
    #[error("Render pipeline contains a cycle.")]
    GraphHasCycle,
    /// A dependency edge references a task that is not part of the pipeline.
    #[error("Dependency edge references a task that does not exist.")]
    DanglingEdge,
    /// Node not found in graph. Generally this should not happen.
    #[error("Implementation error. Node not found. Please open an issue.")]
    NodeNotFound,
    /// Lifecycle operation requested while a frame is in flight.
    #[error("Operation not allowed while a frame is in flight.")]
    PipelineBusy,
    /// The scheduler has no pipeline bound.
    #[error("No pipeline is bound to the scheduler.")]
    EmptyPipeline,
    /// A task failed in its setup phase. The frame was aborted.
    #[error("Task `{task}` failed during setup: {source}")]
    SetupFailed {
        /// Name of the failing task.
        task: String,
        /// The error returned by the task.
        source: anyhow::Error,
    },
    /// A task failed while recording its command list. The frame was aborted.
    #[error("Task `{task}` failed during execution: {source}")]
    ExecuteFailed {
        /// Name of the failing task.
        task: String,
        /// The error returned by the task.
        source: anyhow::Error,
    },
    /// The command queue rejected a command list. The pipeline is invalidated
    /// until replaced.
    #[error("Command queue rejected command list `{list}`: {source}")]
    SubmissionFailed {
        /// Name of the rejected command list.
        list: String,
        /// The error returned by the queue.
        source: anyhow::Error,
    },
    /// A frame was attempted on a pipeline invalidated by an earlier submission
    /// failure.
    #[error("Pipeline was invalidated by a submission failure and must be replaced.")]
    PipelineInvalidated,
    /// Scratch space exhausted. Scratch spaces have a fixed capacity for the
    /// duration of a frame.
    #[error("Scratch space out of memory.")]
    ScratchOutOfMemory,
    /// Descriptor heap has no free handles left.
    #[error("Descriptor heap is full.")]
    DescriptorHeapFull,
    /// A command was recorded into a command list that is already closed.
    #[error("Command list is already closed.")]
    ListClosed,
    /// A command list was submitted without being closed first.
    #[error("Command list must be closed before submission.")]
    ListNotClosed,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}
