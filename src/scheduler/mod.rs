//! Scheduler module facade.
//!
//! The task control block lives in `task.rs`; the scheduler core is
//! implemented in `roundrobin.rs` and re-exported here so
//! `crate::scheduler::*` call sites stay clean.

mod roundrobin;
mod task;

pub use roundrobin::*;
pub use task::{Task, TaskEntryFn, TaskState};
