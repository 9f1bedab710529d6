//! Persisted record types shared across processes.

mod inbox;
mod loop_state;
mod task;

pub use inbox::{Inbox, InboxMessage};
pub use loop_state::{LoopPhase, LoopState};
pub use task::{TaskRecord, TaskStatus};
