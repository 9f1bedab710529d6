//! Continuation loops: marker detection and the turn-by-turn driver.

pub mod driver;
pub mod marker;

pub use driver::{LoopDriver, StartOptions, TurnDecision};
pub use marker::{contains_promise, find_markers};
