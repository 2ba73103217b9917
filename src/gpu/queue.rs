//! Command queues: serial submission, fence signals and cross-queue waits.

use std::sync::Mutex;

use anyhow::Result;

use crate::core::error::Error;
use crate::gpu::command::CommandList;
use crate::gpu::fence::Fence;

/// The kind of work a command queue executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueKind {
    /// Graphics queue. Accepts draw, dispatch and copy work.
    #[default]
    Graphics,
    /// Async compute queue.
    Compute,
    /// Copy/transfer queue.
    Copy,
}

/// One entry in a queue's submission stream.
#[derive(Debug)]
pub enum QueueOp {
    /// A command list, executed after every earlier entry on this queue.
    Execute(CommandList),
    /// Signal `fence` to `value` once all earlier entries completed.
    Signal {
        /// The signaled fence.
        fence: Fence,
        /// The value the fence is advanced to.
        value: u64,
    },
    /// Hold execution of later entries until `fence` reaches `value`.
    Wait {
        /// The awaited fence.
        fence: Fence,
        /// The value that releases the wait.
        value: u64,
    },
}

/// A GPU command queue.
///
/// Lists submitted to the same queue execute in submission order. Ordering
/// between queues only exists through fence signals and waits. The submission
/// stream is retained and can be inspected; it is what a device backend
/// translates and replays.
#[derive(Debug)]
pub struct CommandQueue {
    kind: QueueKind,
    stream: Mutex<Vec<QueueOp>>,
}

impl CommandQueue {
    /// Create a new queue of the given kind.
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            stream: Mutex::new(Vec::new()),
        }
    }

    /// The kind of work this queue executes.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Submit a closed command list.
    /// # Errors
    /// * Fails if the list was not closed.
    pub fn submit(&self, list: CommandList) -> Result<()> {
        if !list.is_closed() {
            return Err(Error::ListNotClosed.into());
        }
        self.stream.lock().unwrap().push(QueueOp::Execute(list));
        Ok(())
    }

    /// Enqueue a fence signal behind everything submitted so far.
    ///
    /// The queue model completes work at submission time, so the fence
    /// advances immediately; a device backend would defer this until the GPU
    /// retires the preceding lists.
    pub fn signal(&self, fence: &Fence, value: u64) {
        self.stream.lock().unwrap().push(QueueOp::Signal {
            fence: fence.clone(),
            value,
        });
        fence.signal(value);
    }

    /// Enqueue a wait: later submissions execute only once `fence` reaches `value`.
    pub fn wait(&self, fence: &Fence, value: u64) {
        self.stream.lock().unwrap().push(QueueOp::Wait {
            fence: fence.clone(),
            value,
        });
    }

    /// Run `f` over the submission stream recorded so far.
    pub fn with_stream<R>(&self, f: impl FnOnce(&[QueueOp]) -> R) -> R {
        let stream = self.stream.lock().unwrap();
        f(&stream)
    }

    /// The command lists submitted so far, in submission order.
    pub fn submitted_lists(&self) -> Vec<CommandList> {
        self.with_stream(|stream| {
            stream
                .iter()
                .filter_map(|op| match op {
                    QueueOp::Execute(list) => Some(list.clone()),
                    _ => None,
                })
                .collect()
        })
    }
}
