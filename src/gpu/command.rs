//! Command lists, allocators and the commands they record.

use anyhow::Result;

use crate::core::error::Error;
use crate::gpu::queue::QueueKind;
use crate::gpu::resource::{GpuResource, ResourceState};

/// A transition barrier announcing that one subresource changes state.
///
/// `from` and `to` are always different: redundant barriers are filtered out
/// before they are ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBarrier {
    /// The resource being transitioned.
    pub resource: GpuResource,
    /// The affected subresource index.
    pub subresource: u32,
    /// State the subresource is currently in.
    pub from: ResourceState,
    /// State the subresource will be in after the barrier.
    pub to: ResourceState,
}

/// A single recorded GPU command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resource transition barrier.
    Transition(TransitionBarrier),
    /// Clear a render target to a solid color. Bit pattern of the color is
    /// preserved so recorded streams compare exactly.
    ClearTarget {
        /// The target being cleared.
        target: GpuResource,
        /// Clear color, RGBA bit patterns.
        color: [u32; 4],
    },
    /// Non-indexed draw.
    Draw {
        /// Number of vertices.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
    },
    /// Compute dispatch.
    Dispatch {
        /// Thread group counts.
        groups: [u32; 3],
    },
    /// Full resource copy.
    CopyResource {
        /// Copy source.
        src: GpuResource,
        /// Copy destination.
        dst: GpuResource,
    },
}

/// A recorded sequence of GPU commands, submitted to a queue as a unit.
///
/// Lists are append-only while open and immutable once closed. A queue only
/// accepts closed lists.
#[derive(Debug, Clone)]
pub struct CommandList {
    name: String,
    commands: Vec<Command>,
    closed: bool,
}

impl CommandList {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            closed: false,
        }
    }

    /// Name of this list, for debugging and submission diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a command to the list.
    /// # Errors
    /// * Fails if the list was already closed.
    pub fn record(&mut self, command: Command) -> Result<()> {
        if self.closed {
            return Err(Error::ListClosed.into());
        }
        self.commands.push(command);
        Ok(())
    }

    /// Close the list. After this no more commands can be recorded.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether the list has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The recorded command stream.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

/// Backs the memory of recorded command lists.
///
/// An allocator is owned by one recording thread for the duration of one
/// task's execute phase, and is returned to its pool once the GPU fence for
/// the frame completes. Resetting reclaims the memory of every list created
/// from it, so it must only happen after that fence.
#[derive(Debug)]
pub struct CommandAllocator {
    kind: QueueKind,
    resets: u64,
}

impl CommandAllocator {
    /// Create a new allocator for lists targeting `kind` queues.
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            resets: 0,
        }
    }

    /// The queue kind lists from this allocator are recorded for.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Open a new command list backed by this allocator.
    pub fn create_list(&mut self, name: impl Into<String>) -> CommandList {
        CommandList::new(name)
    }

    /// Reclaim all memory of lists created from this allocator.
    pub fn reset(&mut self) {
        self.resets += 1;
    }

    /// How many times this allocator has been reset.
    pub fn reset_count(&self) -> u64 {
        self.resets
    }
}
