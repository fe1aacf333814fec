//! Systems - logic that operates on components

mod admission;
mod allocation;
mod lifecycle;
mod removal;
mod sickness;

pub use admission::*;
pub use allocation::*;
pub use lifecycle::*;
pub use removal::*;
pub use sickness::*;
