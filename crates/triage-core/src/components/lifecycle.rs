//! Patient lifecycle phase.
//!
//! ```text
//! (queued) -> WaitingRoomUnassigned -> ProvisionallyAssigned -> Finalized
//!                     |                         |                  |
//!                     +------------+------------+------------------+
//!                                  v
//!                        Deceased | Recovered -> PendingRemoval -> (despawned)
//! ```
//!
//! Queued patients live in the admission planner and have no entity yet.
//! Removed patients are despawned.

use serde::{Deserialize, Serialize};
use triage_logic::attributes::CareTier;

/// Why a patient left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Deceased,
    Recovered,
    /// Sent home and walked out.
    Discharged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingRoomUnassigned,
    ProvisionallyAssigned { tier: CareTier },
    /// Binding decision received. Immutable from here on.
    Finalized { tier: CareTier },
    Deceased { tick_of_death: u64 },
    Recovered,
    /// Removal requested from the hospital manager.
    PendingRemoval { reason: RemovalReason },
}

impl Phase {
    /// Still waiting for a binding decision.
    pub fn is_awaiting_triage(&self) -> bool {
        matches!(
            self,
            Phase::WaitingRoomUnassigned | Phase::ProvisionallyAssigned { .. }
        )
    }

    /// Counts towards run completion.
    pub fn is_completed(&self) -> bool {
        !self.is_awaiting_triage()
    }

    /// Health no longer matters: dead, recovered or on the way out.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Deceased { .. } | Phase::Recovered | Phase::PendingRemoval { .. }
        )
    }

    pub fn finalized_tier(&self) -> Option<CareTier> {
        match self {
            Phase::Finalized { tier } => Some(*tier),
            _ => None,
        }
    }
}
