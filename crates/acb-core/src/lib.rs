//! Core pairing and session engine for the anonymous chat bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! `Notifier` port (trait) implemented in the adapter crate; everything with
//! real concurrency hazards (matching, teardown, bans) is serialized behind
//! one engine-owned critical section here.

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod persist;
pub mod ports;
pub mod queues;
pub mod registry;
pub mod session;

pub use errors::{Error, Result};
