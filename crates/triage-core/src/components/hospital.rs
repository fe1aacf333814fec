//! Hospital components: beds and where a patient currently is.

use hecs::Entity;
use serde::{Deserialize, Serialize};
use triage_logic::attributes::CareTier;

/// A bed (or intake chair) of one care tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bed {
    pub tier: CareTier,
    /// Stable number within the whole hospital, assigned at layout time.
    pub number: u32,
    pub occupant: Option<Entity>,
}

impl Bed {
    pub fn new(tier: CareTier, number: u32) -> Self {
        Self {
            tier,
            number,
            occupant: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Number of entrances patients arrive through.
pub const ENTRANCE_COUNT: u8 = 2;

/// Physical whereabouts of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Just arrived, standing in an entrance until an intake chair is claimed.
    Entrance(u8),
    InBed(Entity),
    WalkingToExit { ticks_remaining: u64 },
    AtExit,
}

impl Location {
    pub fn bed(&self) -> Option<Entity> {
        match self {
            Location::InBed(bed) => Some(*bed),
            _ => None,
        }
    }

    pub fn is_leaving(&self) -> bool {
        matches!(self, Location::WalkingToExit { .. } | Location::AtExit)
    }
}

/// Where a patient is in the building, as it appears in status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Whereabouts {
    Entrance,
    Bed,
    Leaving,
    Exit,
}

impl From<Location> for Whereabouts {
    fn from(location: Location) -> Self {
        match location {
            Location::Entrance(_) => Whereabouts::Entrance,
            Location::InBed(_) => Whereabouts::Bed,
            Location::WalkingToExit { .. } => Whereabouts::Leaving,
            Location::AtExit => Whereabouts::Exit,
        }
    }
}
