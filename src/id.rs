//! ID generation utilities for huddle
//!
//! Provides functions for generating unique identifiers for tasks and
//! inbox messages.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a unique task ID
///
/// Format: `{timestamp_ms}-{random_hex}`
/// Example: `1738300800123-a1b2`
pub fn generate_task_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{:04x}", timestamp, random)
}

/// Generate a message ID for an inbox entry
///
/// Format: `msg-{timestamp_ms}-{random_hex}`
pub fn generate_message_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("msg-{}-{:04x}", timestamp, random)
}
