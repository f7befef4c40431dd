//! Reactivity Controller
//!
//! - `scheduler.rs` - One pending deadline per timer slot
//! - `plan.rs` - Pure trigger -> directive planning

pub mod scheduler;
pub mod plan;

pub use scheduler::*;
pub use plan::*;
