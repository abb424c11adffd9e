//! # Queuectl REST
//!
//! Read-only HTTP dashboard for queuectl: a JSON status endpoint and a
//! self-refreshing HTML page over the same snapshot. It never mutates
//! the queue.

pub mod controllers;
pub mod router;
pub mod state;

pub use router::*;
pub use state::*;
