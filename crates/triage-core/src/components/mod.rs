//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod hospital;
mod lifecycle;
mod patient;

pub use hospital::*;
pub use lifecycle::*;
pub use patient::*;
