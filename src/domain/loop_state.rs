//! Loop state records for continuation loops.
//!
//! One record per session, one loop at a time. The record is the only
//! authoritative state of a loop; the driver re-reads it before every
//! decision, which is what makes restarts and cross-process cancellation
//! safe.

use serde::{Deserialize, Serialize};

use crate::id::now_ms;

/// Persisted state of a session's continuation loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopState {
    /// True while the loop may still drive turns
    pub active: bool,

    /// Why the loop is (or stopped being) active
    pub phase: LoopPhase,

    /// Turns driven so far; never exceeds `max_iterations` while active
    pub iteration: u32,

    /// Iteration cap before the loop reports exhaustion
    pub max_iterations: u32,

    /// Exact token the loop watches for inside a promise marker
    pub completion_promise: String,

    /// Unix timestamp in milliseconds
    pub started_at: i64,

    /// Original task text the loop was started with
    pub prompt: String,

    /// Owning session, if the host runtime attached one
    pub session_id: Option<String>,

    /// Aggressive continuation: remind the agent of remaining budget
    pub ultrawork_mode: bool,
}

impl LoopState {
    /// Create a fresh active loop state.
    pub fn new(prompt: &str, completion_promise: &str, max_iterations: u32) -> Self {
        Self {
            active: true,
            phase: LoopPhase::Active,
            iteration: 0,
            max_iterations,
            completion_promise: completion_promise.to_string(),
            started_at: now_ms(),
            prompt: prompt.to_string(),
            session_id: None,
            ultrawork_mode: false,
        }
    }

    /// Move to a terminal phase and deactivate.
    pub fn finish(&mut self, phase: LoopPhase) {
        self.active = false;
        self.phase = phase;
    }
}

/// Loop lifecycle phases. Active is the only non-terminal phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoopPhase {
    /// Driving turns
    Active,
    /// Completion promise detected
    Completed,
    /// Iteration cap reached without the promise
    Exhausted,
    /// Explicitly stopped, or recovered from a dead session
    Cancelled,
}

impl LoopPhase {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopPhase::Active => "active",
            LoopPhase::Completed => "completed",
            LoopPhase::Exhausted => "exhausted",
            LoopPhase::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopPhase::Active)
    }
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
