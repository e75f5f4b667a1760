//! Request deduplication subsystem.
//!
//! # Data Flow
//! ```text
//! caller A ─┐
//! caller B ─┼─▶ inflight.rs: key registered? ──yes──▶ await shared outcome
//! caller C ─┘                              └─no───▶ start operation, register key
//!                                                    → settle → unregister → notify all
//! ```
//!
//! # Design Decisions
//! - At most one physical operation per key in flight
//! - Every waiter receives the identical outcome, success or failure
//! - A slow or failing operation never blocks later attempts once settled

pub mod inflight;

pub use inflight::RequestDeduplicator;
