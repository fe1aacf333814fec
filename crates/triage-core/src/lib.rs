//! Triage Core - Mass-Casualty Hospital Simulation Engine
//!
//! An ECS-based simulation of a hospital receiving a stream of patients,
//! where an automated allocation engine and a human operator share the
//! triage decisions for a small number of ward and ICU beds.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Beds and patients
//! - **Components**: Pure data attached to entities (Vitals, TriageStatus, Phase, etc.)
//! - **Systems**: Logic that queries and updates components
//!
//! Participants talk through a [`messages::MessageBus`] and change the world
//! only through [`actions::Action`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use triage_core::prelude::*;
//!
//! let config = SimulationConfig::from_file("scenario.json")?;
//! let mut engine = TriageEngine::new(config)?;
//!
//! while !engine.is_done() {
//!     let report = engine.tick()?;
//!     for record in report.records() {
//!         println!("{}", serde_json::to_string(&record)?);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod actions;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod query;
pub mod records;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{DecisionPolicy, SimulationConfig};
    pub use crate::engine::{OperatorView, TriageEngine};
    pub use crate::error::{EngineError, OperatorError};
    pub use crate::records::{LogRecord, TickReport};
    pub use triage_logic::attributes::CareTier;
}
