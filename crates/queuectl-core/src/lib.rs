//! # Queuectl Core
//!
//! Error definitions and result aliases shared by every layer of queuectl.

pub mod error;
pub mod result;

pub use error::*;
pub use result::*;
