//! Patient lifecycle - inbox handling, bed intents, walking out

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};
use triage_logic::attributes::CareTier;
use triage_logic::sickness;

use crate::actions::Action;
use crate::components::{Bed, Care, Location, Owner, Patient, Phase, RemovalReason, TriageStatus, Vitals};
use crate::error::{EngineError, EngineResult};
use crate::messages::{Address, MessageBus, MessageContent};
use crate::query::{self, BedFilter};
use crate::records::TriageDecisionRecord;

/// Timing that governs how patients leave.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleParams {
    /// Ticks a deceased patient stays visible before removal is requested.
    pub deceased_fade_after_ticks: u64,
    pub exit_walk_ticks: u64,
}

fn patients_in_order(world: &World) -> Vec<Entity> {
    let mut patients: Vec<(u32, Entity)> = world
        .query::<&Patient>()
        .iter()
        .map(|(e, p)| (p.number, e))
        .collect();
    patients.sort_unstable();
    patients.into_iter().map(|(_, e)| e).collect()
}

/// Let every patient handle the messages delivered this tick.
///
/// Returns a record for each binding decision that finalized a patient.
pub fn inbox_system(world: &mut World, bus: &mut MessageBus, tick: u64) -> Vec<TriageDecisionRecord> {
    let mut records = Vec::new();

    for entity in patients_in_order(world) {
        let address = Address::Patient(entity);
        let inbox = bus.take_inbox(address);
        if inbox.is_empty() {
            continue;
        }
        let Ok((patient, vitals, care, status, phase)) =
            world.query_one_mut::<(&Patient, &Vitals, &mut Care, &mut TriageStatus, &mut Phase)>(entity)
        else {
            continue;
        };

        let mut unhandled = Vec::new();
        for message in inbox {
            match message.content {
                MessageContent::TriageDecision {
                    decision,
                    triaged_by,
                } => {
                    if status.triaged || !phase.is_awaiting_triage() {
                        debug!(patient = %patient.name, ?phase, "ignoring triage decision");
                        continue;
                    }
                    *phase = Phase::Finalized { tier: decision };
                    care.target = decision;
                    care.receiving = Some(decision);
                    status.triaged = true;
                    status.triaged_by = Some(triaged_by);
                    status.planned_decision = Some(decision);
                    info!(patient = %patient.name, %decision, ?triaged_by, "patient triaged");
                    records.push(TriageDecisionRecord {
                        tick,
                        patient_id: patient.number,
                        patient_name: patient.name.clone(),
                        decision,
                        health: vitals.health,
                        symptoms: vitals.symptoms,
                        decided_by: triaged_by,
                    });
                }
                MessageContent::ResetCounter { counter_value } => {
                    status.countdown = counter_value;
                }
                MessageContent::Reassign { assigned_to } => {
                    if !status.triaged {
                        status.assigned_to = Some(assigned_to);
                        status.countdown = status.original_countdown;
                        if assigned_to == Owner::Person {
                            status.can_be_triaged_by_agent = false;
                        }
                    }
                }
                MessageContent::AgentRemovalRequest => unhandled.push(message),
            }
        }
        bus.restore(address, unhandled);
    }

    records
}

fn set_phase(world: &World, entity: Entity, next: Phase) {
    if let Ok(mut phase) = world.get::<&mut Phase>(entity) {
        *phase = next;
    }
}

fn request_removal(world: &World, bus: &mut MessageBus, entity: Entity, reason: RemovalReason) {
    bus.send(
        Address::HospitalManager,
        Address::Patient(entity),
        MessageContent::AgentRemovalRequest,
    );
    set_phase(world, entity, Phase::PendingRemoval { reason });
}

fn random_free_bed(world: &World, tier: CareTier, patient: &str, rng: &mut StdRng) -> EngineResult<Entity> {
    query::beds_matching(world, BedFilter::free_of(tier))
        .choose(rng)
        .copied()
        .ok_or_else(|| EngineError::CapacityExhausted {
            tier,
            patient: patient.to_string(),
        })
}

/// Snapshot of the patient state the lifecycle decisions read.
struct PatientView {
    name: String,
    health: Option<f64>,
    phase: Phase,
    location: Location,
    bed_tier: Option<CareTier>,
}

fn view(world: &World, entity: Entity) -> Option<PatientView> {
    let patient = world.get::<&Patient>(entity).ok()?;
    let vitals = world.get::<&Vitals>(entity).ok()?;
    let phase = world.get::<&Phase>(entity).ok()?;
    let location = world.get::<&Location>(entity).ok()?;
    let bed_tier = location
        .bed()
        .and_then(|bed| world.get::<&Bed>(bed).ok().map(|b| b.tier));
    Some(PatientView {
        name: patient.name.clone(),
        health: vitals.health,
        phase: *phase,
        location: *location,
        bed_tier,
    })
}

/// Decide what every patient wants to do this tick.
///
/// Death, recovery and removal requests are applied to the patient
/// directly. Bed moves come back as actions for the caller to resolve.
pub fn lifecycle_system(
    world: &mut World,
    bus: &mut MessageBus,
    tick: u64,
    params: LifecycleParams,
    rng: &mut StdRng,
) -> EngineResult<Vec<Action>> {
    let mut actions = Vec::new();
    let leave = |patient| Action::UnassignBed {
        patient,
        walk_ticks: params.exit_walk_ticks,
    };

    for entity in patients_in_order(world) {
        let Some(patient) = view(world, entity) else {
            continue;
        };

        match patient.phase {
            Phase::PendingRemoval { .. } => continue,
            Phase::Deceased { tick_of_death } => {
                if tick.saturating_sub(tick_of_death) > params.deceased_fade_after_ticks {
                    request_removal(world, bus, entity, RemovalReason::Deceased);
                }
                continue;
            }
            _ => {}
        }

        if patient.health.is_some_and(sickness::is_deceased) {
            info!(patient = %patient.name, tick, "patient deceased");
            set_phase(world, entity, Phase::Deceased { tick_of_death: tick });
            continue;
        }

        if patient.health.is_some_and(sickness::is_recovered) {
            if patient.phase != Phase::Recovered {
                info!(patient = %patient.name, tick, "patient recovered");
                set_phase(world, entity, Phase::Recovered);
                if let Ok(mut care) = world.get::<&mut Care>(entity) {
                    care.target = CareTier::Home;
                }
                actions.push(leave(entity));
            } else if patient.location == Location::AtExit {
                request_removal(world, bus, entity, RemovalReason::Recovered);
            }
            continue;
        }

        match patient.phase {
            Phase::Finalized { tier: CareTier::Home } => match patient.location {
                Location::AtExit => request_removal(world, bus, entity, RemovalReason::Discharged),
                Location::WalkingToExit { .. } => {}
                _ => actions.push(leave(entity)),
            },
            Phase::Finalized { tier } => {
                if patient.bed_tier != Some(tier) {
                    let bed = random_free_bed(world, tier, &patient.name, rng)?;
                    actions.push(Action::AssignBed {
                        patient: entity,
                        bed: Some(bed),
                    });
                }
            }
            _ => {
                if matches!(patient.location, Location::Entrance(_)) {
                    let chair = random_free_bed(world, CareTier::WaitingRoom, &patient.name, rng)?;
                    actions.push(Action::AssignBed {
                        patient: entity,
                        bed: Some(chair),
                    });
                }
            }
        }
    }

    Ok(actions)
}

/// Advance everyone walking to the exit by one tick.
pub fn walk_system(world: &mut World) {
    for (_, location) in world.query_mut::<&mut Location>() {
        if let Location::WalkingToExit { ticks_remaining } = *location {
            *location = if ticks_remaining == 0 {
                Location::AtExit
            } else {
                Location::WalkingToExit {
                    ticks_remaining: ticks_remaining - 1,
                }
            };
        }
    }
}
