//! Pure triage logic for the hospital simulation.
//!
//! Everything here is independent of the tick engine: functions take plain
//! data and return results, so the scoring and allocation rules can be
//! unit-tested in isolation and reused by any driver.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`attributes`] | Symptoms, fitness, demographics, care tiers, roster profiles |
//! | [`elicitation`] | Operator-elicited priority rules (integer-coded knobs) |
//! | [`sickness`] | Health progression under fitness and care |
//! | [`scoring`] | Triage score and per-rule influence explanations |
//! | [`allocation`] | Ranked bed allocation with uncertainty clustering |

pub mod allocation;
pub mod attributes;
pub mod elicitation;
pub mod scoring;
pub mod sickness;
