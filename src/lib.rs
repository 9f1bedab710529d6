//! Huddle - coordination substrate for long-running AI-agent sessions
//!
//! Huddle keeps an agent session "working" across inference turns until an
//! explicit completion promise appears, delegates units of work to other
//! agent instances (foreground or background), and lets multiple concurrent
//! processes share task lists and team inboxes through crash-safe JSON files.

pub mod config;
pub mod delegate;
pub mod domain;
pub mod error;
pub mod id;
pub mod loops;
pub mod repo;
pub mod runtime;
pub mod store;
pub mod tracker;

pub use error::{HuddleError, Result};
