//! The pipeline DAG and the analyses that turn it into a frame: schedule
//! construction, parallel-compatibility checks, shadow state tracking and
//! barrier injection.

pub mod barrier;
pub mod compat;
pub mod pipeline;
pub mod schedule;
pub mod state_table;

pub use barrier::{inject_barriers, update_states};
pub use compat::can_execute_parallel;
pub use pipeline::{Pipeline, TaskId};
pub use schedule::{build_schedule, Schedule};
pub use state_table::ResourceStateTable;
