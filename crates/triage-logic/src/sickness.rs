//! Sickness progression model.
//!
//! Health runs from 0 (deceased) to 100 (recovered). Each update moves it by
//! a fitness term plus a care term, each shifted by a per-patient offset, and
//! re-derives the symptom bucket from the new value. The model does not clamp;
//! crossing 0 or 100 is handled by the lifecycle.

use serde::{Deserialize, Serialize};

use crate::attributes::{CareTier, Fitness, Symptoms};

/// Health at or below which a patient is deceased.
pub const DECEASED_HEALTH: f64 = 0.0;

/// Health at or above which a patient is recovered.
pub const RECOVERED_HEALTH: f64 = 100.0;

/// Standard deviation of the per-patient fitness offset.
pub const FITNESS_OFFSET_STD: f64 = 0.4;

/// Standard deviation of the per-patient care offset.
pub const CARE_OFFSET_STD: f64 = 0.8;

/// Health thresholds and the symptom bucket below each, highest first.
const SYMPTOM_THRESHOLDS: [(f64, Symptoms); 5] = [
    (100.0, Symptoms::VeryLow),
    (80.0, Symptoms::Low),
    (60.0, Symptoms::Medium),
    (40.0, Symptoms::High),
    (20.0, Symptoms::VeryHigh),
];

/// Natural variance of one patient's response to fitness and treatment.
/// Drawn once at admission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientOffsets {
    pub fitness: f64,
    pub care: f64,
}

/// Health and symptom state after an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SicknessState {
    pub health: f64,
    pub symptoms: Symptoms,
}

/// Starting health: 100 minus ten per severity step.
pub fn initial_health(symptoms: Symptoms) -> f64 {
    100.0 - 10.0 * symptoms.severity_ordinal() as f64
}

/// Per-update health change from fitness.
pub fn fitness_effect(fitness: Fitness) -> f64 {
    match fitness {
        Fitness::VeryLow => -2.0,
        Fitness::Low => -1.0,
        Fitness::Medium => 0.0,
        Fitness::High => 1.0,
        Fitness::VeryHigh => 2.0,
    }
}

/// Per-update health change from the care being received.
pub fn care_effect(care: CareTier) -> f64 {
    match care {
        CareTier::Home => -2.0,
        CareTier::WaitingRoom => -1.0,
        CareTier::Ward => 0.0,
        CareTier::Icu => 3.0,
    }
}

/// Symptom bucket for a health value: the lowest threshold not exceeded.
/// Health above 100 maps to the mildest bucket.
pub fn symptoms_for_health(health: f64) -> Symptoms {
    SYMPTOM_THRESHOLDS
        .iter()
        .rev()
        .find(|(threshold, _)| health <= *threshold)
        .map(|(_, symptoms)| *symptoms)
        .unwrap_or(Symptoms::VeryLow)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Advance one patient's sickness by one update.
///
/// With no care assigned the patient is static and the inputs come back
/// unchanged. Otherwise health moves by the fitness and care terms and is
/// rounded to two decimals.
pub fn update(
    health: f64,
    symptoms: Symptoms,
    fitness: Fitness,
    care: Option<CareTier>,
    offsets: PatientOffsets,
) -> SicknessState {
    let Some(care) = care else {
        return SicknessState { health, symptoms };
    };

    let delta = (fitness_effect(fitness) + offsets.fitness) + (care_effect(care) + offsets.care);
    let health = round2(health + delta);

    SicknessState {
        health,
        symptoms: symptoms_for_health(health),
    }
}

pub fn is_deceased(health: f64) -> bool {
    health <= DECEASED_HEALTH
}

pub fn is_recovered(health: f64) -> bool {
    health >= RECOVERED_HEALTH
}
