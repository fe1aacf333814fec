//! Patient components: identity, vitals, care and triage bookkeeping.

use serde::{Deserialize, Serialize};
use triage_logic::attributes::{CareTier, Symptoms};
use triage_logic::scoring::Influences;
use triage_logic::sickness::PatientOffsets;

/// Marker and identity of a patient entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    /// Admission order, starting at 0. Used as the patient id in records.
    pub number: u32,
    pub name: String,
}

/// Health and the sickness update schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    /// `None` until the first sickness update.
    pub health: Option<f64>,
    pub symptoms: Symptoms,
    pub offsets: PatientOffsets,
    /// Earliest tick of the next sickness update.
    pub next_update: u64,
}

impl Vitals {
    pub fn new(symptoms: Symptoms, offsets: PatientOffsets) -> Self {
        Self {
            health: None,
            symptoms,
            offsets,
            next_update: 0,
        }
    }
}

/// Care a patient is receiving and the care it has been sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Care {
    /// Care currently received. Drives the sickness model.
    pub receiving: Option<CareTier>,
    /// Care the patient is heading for.
    pub target: CareTier,
}

impl Default for Care {
    fn default() -> Self {
        Self {
            receiving: None,
            target: CareTier::WaitingRoom,
        }
    }
}

/// Who currently owns the triage decision for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Robot,
    Person,
}

/// Who made a binding triage decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMaker {
    Agent,
    Human,
}

/// Triage bookkeeping shared by the engine and the operator.
///
/// The countdown lives here rather than in [`Phase`](super::Phase) so it is
/// visible to the operator while the patient waits.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageStatus {
    pub countdown: u32,
    pub original_countdown: u32,
    pub assigned_to: Option<Owner>,
    /// Latest automated proposal.
    pub planned_decision: Option<CareTier>,
    pub influences: Influences,
    pub can_be_triaged_by_agent: bool,
    /// Names of the patients competing for the same care when deferred.
    pub care_contending_patients: Vec<String>,
    /// Set once, when a binding decision arrives.
    pub triaged: bool,
    pub triaged_by: Option<DecisionMaker>,
}

impl TriageStatus {
    pub fn new(countdown: u32) -> Self {
        Self {
            countdown,
            original_countdown: countdown,
            assigned_to: None,
            planned_decision: None,
            influences: Influences::new(),
            can_be_triaged_by_agent: true,
            care_contending_patients: Vec::new(),
            triaged: false,
            triaged_by: None,
        }
    }

    pub fn owned_by(&self, owner: Owner) -> bool {
        self.assigned_to == Some(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_is_unowned_and_untriaged() {
        let status = TriageStatus::new(8);
        assert_eq!(status.countdown, 8);
        assert_eq!(status.original_countdown, 8);
        assert!(!status.triaged);
        assert!(status.can_be_triaged_by_agent);
        assert!(!status.owned_by(Owner::Robot));
        assert!(!status.owned_by(Owner::Person));
    }

    #[test]
    fn test_owner_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Owner::Person).unwrap(), "\"person\"");
        assert_eq!(serde_json::to_string(&DecisionMaker::Agent).unwrap(), "\"agent\"");
    }
}
