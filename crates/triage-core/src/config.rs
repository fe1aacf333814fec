//! Scenario configuration.
//!
//! Loaded from JSON. Every section has defaults so a scenario file only
//! needs to name what it changes, plus the patient roster.

use std::path::Path;

use serde::{Deserialize, Serialize};
use triage_logic::attributes::PatientProfile;
use triage_logic::elicitation::ElicitedRules;

use crate::error::ConfigError;

/// Who makes automated triage decisions and what is left to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// The engine decides every patient greedily by score.
    FullyAutomated,
    /// The engine defers uncertain contention to the operator and never
    /// touches patients the operator owns.
    #[default]
    Shared,
}

/// One point of the admission schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningKeypoint {
    /// Keypoint becomes active once the run passes this second.
    pub second: f64,
    /// Gap between admissions while this keypoint is active.
    #[serde(default = "default_seconds_per_patient")]
    pub seconds_per_patient: f64,
}

fn default_seconds_per_patient() -> f64 {
    10_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientsConfig {
    pub max_patients: usize,
    pub patient_planning: Vec<PlanningKeypoint>,
    pub roster: Vec<PatientProfile>,
    pub deceased_fade_after_ticks: u64,
    pub update_sickness_every_x_ticks: u64,
    pub initial_static_ticks: u64,
}

impl Default for PatientsConfig {
    fn default() -> Self {
        Self {
            max_patients: 0,
            patient_planning: vec![PlanningKeypoint {
                second: 0.0,
                seconds_per_patient: 10.0,
            }],
            roster: Vec::new(),
            deceased_fade_after_ticks: 5,
            update_sickness_every_x_ticks: 1,
            initial_static_ticks: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HospitalConfig {
    pub waiting_room_beds: usize,
    pub ward_beds: usize,
    pub icu_beds: usize,
    /// Ticks a discharged patient takes to reach the exit.
    pub exit_walk_ticks: u64,
}

impl Default for HospitalConfig {
    fn default() -> Self {
        Self {
            waiting_room_beds: 6,
            ward_beds: 4,
            icu_beds: 2,
            exit_walk_ticks: 5,
        }
    }
}

/// Full scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub random_seed: u64,
    /// Simulated seconds per tick.
    pub tick_duration: f64,
    /// Ticks a provisional automated decision waits before it binds.
    pub triage_countdown: u32,
    pub triage_agent_uncertainty_threshold: f64,
    pub policy: DecisionPolicy,
    pub user_elicitation: ElicitedRules,
    pub patients: PatientsConfig,
    pub hospital: HospitalConfig,
    /// Ticks to keep running after the last patient completed.
    pub completion_grace_ticks: u64,
    pub status_snapshot_every_ticks: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            tick_duration: 1.0,
            triage_countdown: 10,
            triage_agent_uncertainty_threshold: 0.5,
            policy: DecisionPolicy::Shared,
            user_elicitation: ElicitedRules::none(),
            patients: PatientsConfig::default(),
            hospital: HospitalConfig::default(),
            completion_grace_ticks: 75,
            status_snapshot_every_ticks: 10,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Uncertainty threshold the allocation primitive runs with.
    pub fn allocation_threshold(&self) -> Option<f64> {
        match self.policy {
            DecisionPolicy::FullyAutomated => None,
            DecisionPolicy::Shared => Some(self.triage_agent_uncertainty_threshold),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid { reason });

        if !(self.tick_duration > 0.0) {
            return invalid(format!("tick_duration must be positive, got {}", self.tick_duration));
        }
        if !(self.triage_agent_uncertainty_threshold >= 0.0) {
            return invalid(format!(
                "triage_agent_uncertainty_threshold must be non-negative, got {}",
                self.triage_agent_uncertainty_threshold
            ));
        }
        if self.patients.max_patients > self.patients.roster.len() {
            return invalid(format!(
                "max_patients is {} but the roster only has {} entries",
                self.patients.max_patients,
                self.patients.roster.len()
            ));
        }
        if self.hospital.waiting_room_beds == 0 {
            return invalid("the waiting room needs at least one bed".to_string());
        }
        if self.patients.update_sickness_every_x_ticks == 0 {
            return invalid("update_sickness_every_x_ticks must be at least 1".to_string());
        }
        if self.status_snapshot_every_ticks == 0 {
            return invalid("status_snapshot_every_ticks must be at least 1".to_string());
        }
        let planning = &self.patients.patient_planning;
        if planning.windows(2).any(|w| w[0].second > w[1].second) {
            return invalid("patient_planning keypoints must be sorted by second".to_string());
        }
        if planning.iter().any(|k| !(k.seconds_per_patient > 0.0)) {
            return invalid("seconds_per_patient must be positive".to_string());
        }
        Ok(())
    }
}
