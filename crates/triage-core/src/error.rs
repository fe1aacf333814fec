//! Error types for the triage engine.
//!
//! Action failures are recoverable and handled locally by the caller.
//! Engine errors abort the run.

use hecs::Entity;
use thiserror::Error;
use triage_logic::attributes::CareTier;

/// Why an [`Action`](crate::actions::Action) could not be applied.
/// The world is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// A required parameter is missing or malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The bed was claimed by someone else first. Retry another bed.
    #[error("bed {bed:?} is already occupied")]
    BedOccupied { bed: Entity },

    /// The referenced entity no longer exists.
    #[error("entity {entity:?} not found")]
    NotFound { entity: Entity },
}

/// Fatal engine failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A patient needs a bed of a tier that has none left. The hospital
    /// layout cannot support the scenario.
    #[error("no free {tier} bed left for patient {patient}")]
    CapacityExhausted { tier: CareTier, patient: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Problems loading or validating a [`SimulationConfig`](crate::config::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("cannot parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

/// Rejected human operator input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("patient {0:?} is not in the hospital")]
    UnknownPatient(Entity),

    #[error("patient {0} has already been triaged")]
    AlreadyTriaged(String),

    #[error("patient {0} is not assigned to the operator")]
    WrongOwner(String),

    #[error("claiming patients is disabled under the fully automated policy")]
    ClaimsDisabled,

    #[error("{0} is not a triage decision")]
    InvalidTier(CareTier),

    #[error("no unreserved {0} bed is available")]
    NoCapacity(CareTier),
}

pub type EngineResult<T> = Result<T, EngineError>;
