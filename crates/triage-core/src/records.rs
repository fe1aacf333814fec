//! Structured records emitted by each tick.
//!
//! Records are plain serializable data. The engine returns them in a
//! [`TickReport`]; writing them anywhere is the caller's business.

use std::collections::BTreeMap;

use serde::Serialize;
use triage_logic::attributes::{CareTier, PatientProfile, Symptoms};
use triage_logic::elicitation::ElicitedRules;
use triage_logic::scoring::Influences;
use triage_logic::sickness::PatientOffsets;

use crate::components::{DecisionMaker, RemovalReason, Whereabouts};

/// A binding decision was applied to a patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageDecisionRecord {
    pub tick: u64,
    pub patient_id: u32,
    pub patient_name: String,
    pub decision: CareTier,
    pub health: Option<f64>,
    pub symptoms: Symptoms,
    pub decided_by: DecisionMaker,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientStatusEntry {
    pub patient_id: u32,
    pub patient_name: String,
    pub symptoms: Symptoms,
    pub health: Option<f64>,
    /// Care currently received, if any.
    pub care: Option<CareTier>,
    pub whereabouts: Whereabouts,
}

/// Periodic snapshot of everyone in the hospital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientStatusRecord {
    pub tick: u64,
    pub patients: Vec<PatientStatusEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPatientRecord {
    pub tick: u64,
    pub patient_id: u32,
    pub entrance: u8,
    #[serde(flatten)]
    pub profile: PatientProfile,
    pub offsets: PatientOffsets,
    pub initial_health: f64,
}

/// Scores, decisions and rule contributions behind one engine pass.
/// Patients are keyed by their number.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EngineExplanationRecord {
    pub tick: u64,
    pub user_elicitation_rules: ElicitedRules,
    pub triage_scores: BTreeMap<u32, f64>,
    pub triage_decisions: BTreeMap<u32, CareTier>,
    pub influences: BTreeMap<u32, Influences>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovalRecord {
    pub tick: u64,
    pub patient_id: u32,
    pub patient_name: String,
    pub reason: Option<RemovalReason>,
}

/// Everything one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub decisions: Vec<TriageDecisionRecord>,
    pub status: Option<PatientStatusRecord>,
    pub new_patients: Vec<NewPatientRecord>,
    pub explanation: Option<EngineExplanationRecord>,
    pub removals: Vec<RemovalRecord>,
}

/// A record tagged with its kind, for line-oriented sinks.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LogRecord<'a> {
    TriageDecision(&'a TriageDecisionRecord),
    PatientStatus(&'a PatientStatusRecord),
    NewPatient(&'a NewPatientRecord),
    EngineExplanation(&'a EngineExplanationRecord),
    Removal(&'a RemovalRecord),
}

impl TickReport {
    /// All records of the tick in emission order.
    pub fn records(&self) -> Vec<LogRecord<'_>> {
        let mut out = Vec::new();
        out.extend(self.decisions.iter().map(LogRecord::TriageDecision));
        out.extend(self.explanation.iter().map(LogRecord::EngineExplanation));
        out.extend(self.removals.iter().map(LogRecord::Removal));
        out.extend(self.new_patients.iter().map(LogRecord::NewPatient));
        out.extend(self.status.iter().map(LogRecord::PatientStatus));
        out
    }
}
