//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is in use.
//!
//! # Tasks
//! - Expired-entry sweep: removes stale and corrupt entries from the medium

mod sweep;

pub use sweep::spawn_sweep_task;
