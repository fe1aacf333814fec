//! World mutations requested by the participants of a tick.
//!
//! Every action goes through [`dispatch`]: a feasibility check against the
//! current world, then the commit. A failed check leaves the world as it
//! was, so two patients racing for the same bed in one tick resolve to one
//! success and one [`ActionError::BedOccupied`].

use hecs::{Entity, World};
use triage_logic::attributes::CareTier;
use triage_logic::scoring::Influences;

use crate::components::{
    Bed, Care, Location, Owner, Patient, Phase, RemovalReason, TriageStatus, Vitals, ENTRANCE_COUNT,
};
use crate::error::ActionError;
use crate::query;
use crate::systems::Admission;

/// Engine proposal for one patient, applied by [`Action::SetPlannedDecisions`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub patient: Entity,
    pub planned_decision: Option<CareTier>,
    pub influences: Influences,
    pub assigned_to: Owner,
    pub can_be_triaged_by_agent: bool,
    pub care_contending_patients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Move `patient` into `bed`, releasing any bed it held.
    AssignBed { patient: Entity, bed: Option<Entity> },
    /// Release the patient's bed and start the walk to the exit.
    UnassignBed { patient: Entity, walk_ticks: u64 },
    /// Despawn a patient, freeing its bed.
    RemovePatient { patient: Option<Entity> },
    /// Record the engine's provisional decisions and explanations.
    SetPlannedDecisions { updates: Vec<PlannedUpdate> },
    /// Materialize an admitted patient at an entrance.
    AddPatient { admission: Admission, entrance: u8, countdown: u32 },
}

/// What a successful action did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied,
    Spawned(Entity),
    Removed {
        number: u32,
        name: String,
        reason: Option<RemovalReason>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AssignBed { .. } => "assign_bed",
            Action::UnassignBed { .. } => "unassign_bed",
            Action::RemovePatient { .. } => "remove_patient",
            Action::SetPlannedDecisions { .. } => "set_planned_decisions",
            Action::AddPatient { .. } => "add_patient",
        }
    }
}

/// Check and apply one action.
pub fn dispatch(world: &mut World, action: Action) -> Result<ActionOutcome, ActionError> {
    match action {
        Action::AssignBed { patient, bed } => {
            let bed = check_assign_bed(world, patient, bed)?;
            commit_assign_bed(world, patient, bed)
        }
        Action::UnassignBed {
            patient,
            walk_ticks,
        } => {
            require_patient(world, patient)?;
            commit_unassign_bed(world, patient, walk_ticks)
        }
        Action::RemovePatient { patient } => {
            let patient = patient.ok_or_else(|| invalid("no patient given for removal"))?;
            require_patient(world, patient)?;
            commit_remove_patient(world, patient)
        }
        Action::SetPlannedDecisions { updates } => {
            check_planned_decisions(&updates)?;
            commit_planned_decisions(world, updates)
        }
        Action::AddPatient {
            admission,
            entrance,
            countdown,
        } => {
            check_add_patient(world, entrance)?;
            Ok(commit_add_patient(world, admission, entrance, countdown))
        }
    }
}

fn invalid(reason: &str) -> ActionError {
    ActionError::InvalidRequest {
        reason: reason.to_string(),
    }
}

fn not_found(entity: Entity) -> impl Fn(hecs::ComponentError) -> ActionError {
    move |_| ActionError::NotFound { entity }
}

fn require_patient(world: &World, patient: Entity) -> Result<(), ActionError> {
    world
        .get::<&Patient>(patient)
        .map(|_| ())
        .map_err(not_found(patient))
}

// ── Beds ───────────────────────────────────────────────────────────────

fn check_assign_bed(world: &World, patient: Entity, bed: Option<Entity>) -> Result<Entity, ActionError> {
    let bed = bed.ok_or_else(|| invalid("no bed given to assign"))?;
    require_patient(world, patient)?;
    let target = world.get::<&Bed>(bed).map_err(not_found(bed))?;
    if target.occupant.is_some_and(|o| o != patient) {
        return Err(ActionError::BedOccupied { bed });
    }
    Ok(bed)
}

fn commit_assign_bed(world: &mut World, patient: Entity, bed: Entity) -> Result<ActionOutcome, ActionError> {
    let previous = world.get::<&Location>(patient).map_err(not_found(patient))?.bed();
    let tier = world.get::<&Bed>(bed).map_err(not_found(bed))?.tier;

    if let Some(old) = previous.filter(|old| *old != bed) {
        if let Ok(mut old_bed) = world.get::<&mut Bed>(old) {
            old_bed.occupant = None;
        }
    }
    world.get::<&mut Bed>(bed).map_err(not_found(bed))?.occupant = Some(patient);
    *world.get::<&mut Location>(patient).map_err(not_found(patient))? = Location::InBed(bed);
    world.get::<&mut Care>(patient).map_err(not_found(patient))?.receiving = Some(tier);
    Ok(ActionOutcome::Applied)
}

fn release_bed(world: &World, patient: Entity) {
    let bed = world.get::<&Location>(patient).ok().and_then(|l| l.bed());
    if let Some(bed) = bed {
        if let Ok(mut bed) = world.get::<&mut Bed>(bed) {
            if bed.occupant == Some(patient) {
                bed.occupant = None;
            }
        }
    }
}

fn commit_unassign_bed(world: &mut World, patient: Entity, walk_ticks: u64) -> Result<ActionOutcome, ActionError> {
    // Patients sent home keep home care on the way out.
    let receiving = world
        .get::<&Phase>(patient)
        .map_err(not_found(patient))?
        .finalized_tier();
    release_bed(world, patient);
    *world.get::<&mut Location>(patient).map_err(not_found(patient))? = Location::WalkingToExit {
        ticks_remaining: walk_ticks,
    };
    world.get::<&mut Care>(patient).map_err(not_found(patient))?.receiving = receiving;
    Ok(ActionOutcome::Applied)
}

// ── Removal ────────────────────────────────────────────────────────────

fn commit_remove_patient(world: &mut World, patient: Entity) -> Result<ActionOutcome, ActionError> {
    let (number, name) = {
        let p = world.get::<&Patient>(patient).map_err(not_found(patient))?;
        (p.number, p.name.clone())
    };
    let reason = match world.get::<&Phase>(patient).map(|p| *p) {
        Ok(Phase::PendingRemoval { reason }) => Some(reason),
        _ => None,
    };
    release_bed(world, patient);
    world
        .despawn(patient)
        .map_err(|_| ActionError::NotFound { entity: patient })?;
    Ok(ActionOutcome::Removed {
        number,
        name,
        reason,
    })
}

// ── Planned decisions ──────────────────────────────────────────────────

fn check_planned_decisions(updates: &[PlannedUpdate]) -> Result<(), ActionError> {
    let mut seen = std::collections::HashSet::new();
    if updates.iter().all(|u| seen.insert(u.patient)) {
        Ok(())
    } else {
        Err(invalid("a patient appears twice in one set of planned decisions"))
    }
}

fn commit_planned_decisions(world: &mut World, updates: Vec<PlannedUpdate>) -> Result<ActionOutcome, ActionError> {
    for update in updates {
        // Patients may have been removed since the engine looked.
        let Ok((status, phase)) = world.query_one_mut::<(&mut TriageStatus, &mut Phase)>(update.patient) else {
            continue;
        };

        if let Some(planned) = update.planned_decision {
            status.planned_decision = Some(planned);
            if phase.is_awaiting_triage() {
                *phase = Phase::ProvisionallyAssigned { tier: planned };
            }
        }
        status.influences = update.influences;
        // The engine never takes a patient back from the operator.
        if !status.owned_by(Owner::Person) {
            status.assigned_to = Some(update.assigned_to);
        }
        status.can_be_triaged_by_agent = update.can_be_triaged_by_agent;
        status.care_contending_patients = update.care_contending_patients;
    }
    Ok(ActionOutcome::Applied)
}

// ── Admission ──────────────────────────────────────────────────────────

fn check_add_patient(world: &World, entrance: u8) -> Result<(), ActionError> {
    if entrance >= ENTRANCE_COUNT {
        return Err(ActionError::InvalidRequest {
            reason: format!("entrance {entrance} does not exist"),
        });
    }
    if !query::entrance_is_free(world, entrance) {
        return Err(ActionError::InvalidRequest {
            reason: format!("entrance {entrance} is occupied"),
        });
    }
    Ok(())
}

fn commit_add_patient(world: &mut World, admission: Admission, entrance: u8, countdown: u32) -> ActionOutcome {
    let Admission {
        number,
        profile,
        offsets,
    } = admission;
    let entity = world.spawn((
        Patient {
            number,
            name: profile.name.clone(),
        },
        Vitals::new(profile.symptoms, offsets),
        Care::default(),
        TriageStatus::new(countdown),
        Phase::WaitingRoomUnassigned,
        Location::Entrance(entrance),
        profile,
    ));
    ActionOutcome::Spawned(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_logic::attributes::{Fitness, Gender, HomeSituation, PatientProfile, Profession, Symptoms};
    use triage_logic::sickness::PatientOffsets;

    fn admission(number: u32) -> Admission {
        Admission {
            number,
            profile: PatientProfile {
                name: format!("P{number}"),
                gender: Gender::Male,
                age: 40,
                profession: Profession::new("Kok"),
                fitness: Fitness::Medium,
                symptoms: Symptoms::High,
                home_situation: HomeSituation::new("Alleenstaand"),
                description: String::new(),
            },
            offsets: PatientOffsets::default(),
        }
    }

    fn add(world: &mut World, number: u32, entrance: u8) -> Entity {
        match dispatch(
            world,
            Action::AddPatient {
                admission: admission(number),
                entrance,
                countdown: 5,
            },
        ) {
            Ok(ActionOutcome::Spawned(e)) => e,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_second_claim_on_bed_fails_without_mutation() {
        let mut world = World::new();
        let bed = world.spawn((Bed::new(CareTier::WaitingRoom, 0),));
        let a = add(&mut world, 0, 0);
        let b = add(&mut world, 1, 1);

        dispatch(&mut world, Action::AssignBed { patient: a, bed: Some(bed) }).unwrap();
        let err = dispatch(&mut world, Action::AssignBed { patient: b, bed: Some(bed) }).unwrap_err();
        assert_eq!(err, ActionError::BedOccupied { bed });

        assert_eq!(world.get::<&Bed>(bed).unwrap().occupant, Some(a));
        assert_eq!(*world.get::<&Location>(b).unwrap(), Location::Entrance(1));
        assert_eq!(world.get::<&Care>(a).unwrap().receiving, Some(CareTier::WaitingRoom));
        assert_eq!(world.get::<&Care>(b).unwrap().receiving, None);
    }

    #[test]
    fn test_assign_moves_between_beds() {
        let mut world = World::new();
        let chair = world.spawn((Bed::new(CareTier::WaitingRoom, 0),));
        let icu = world.spawn((Bed::new(CareTier::Icu, 1),));
        let p = add(&mut world, 0, 0);

        dispatch(&mut world, Action::AssignBed { patient: p, bed: Some(chair) }).unwrap();
        dispatch(&mut world, Action::AssignBed { patient: p, bed: Some(icu) }).unwrap();
        assert!(world.get::<&Bed>(chair).unwrap().is_free());
        assert_eq!(world.get::<&Bed>(icu).unwrap().occupant, Some(p));
        assert_eq!(world.get::<&Care>(p).unwrap().receiving, Some(CareTier::Icu));
    }

    #[test]
    fn test_unassign_keeps_home_care_for_sent_home_patients() {
        let mut world = World::new();
        let chair = world.spawn((Bed::new(CareTier::WaitingRoom, 0),));
        let home = add(&mut world, 0, 0);
        let recovered = add(&mut world, 1, 1);
        dispatch(&mut world, Action::AssignBed { patient: home, bed: Some(chair) }).unwrap();
        *world.get::<&mut Phase>(home).unwrap() = Phase::Finalized { tier: CareTier::Home };
        *world.get::<&mut Phase>(recovered).unwrap() = Phase::Recovered;

        for patient in [home, recovered] {
            dispatch(&mut world, Action::UnassignBed { patient, walk_ticks: 3 }).unwrap();
        }
        assert!(world.get::<&Bed>(chair).unwrap().is_free());
        assert_eq!(world.get::<&Care>(home).unwrap().receiving, Some(CareTier::Home));
        assert_eq!(world.get::<&Care>(recovered).unwrap().receiving, None);
        assert_eq!(
            *world.get::<&Location>(home).unwrap(),
            Location::WalkingToExit { ticks_remaining: 3 }
        );
    }

    #[test]
    fn test_invalid_and_missing_targets() {
        let mut world = World::new();
        let p = add(&mut world, 0, 0);
        assert!(matches!(
            dispatch(&mut world, Action::AssignBed { patient: p, bed: None }),
            Err(ActionError::InvalidRequest { .. })
        ));
        assert!(matches!(
            dispatch(&mut world, Action::RemovePatient { patient: None }),
            Err(ActionError::InvalidRequest { .. })
        ));

        let ghost = world.spawn(());
        world.despawn(ghost).unwrap();
        assert_eq!(
            dispatch(&mut world, Action::RemovePatient { patient: Some(ghost) }),
            Err(ActionError::NotFound { entity: ghost })
        );
        assert_eq!(
            dispatch(&mut world, Action::AssignBed { patient: p, bed: Some(ghost) }),
            Err(ActionError::NotFound { entity: ghost })
        );
    }

    #[test]
    fn test_occupied_entrance_rejected() {
        let mut world = World::new();
        add(&mut world, 0, 0);
        let result = dispatch(
            &mut world,
            Action::AddPatient {
                admission: admission(1),
                entrance: 0,
                countdown: 5,
            },
        );
        assert!(matches!(result, Err(ActionError::InvalidRequest { .. })));
        assert!(matches!(
            dispatch(
                &mut world,
                Action::AddPatient {
                    admission: admission(1),
                    entrance: 2,
                    countdown: 5
                }
            ),
            Err(ActionError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_remove_frees_bed() {
        let mut world = World::new();
        let bed = world.spawn((Bed::new(CareTier::Ward, 0),));
        let p = add(&mut world, 3, 0);
        dispatch(&mut world, Action::AssignBed { patient: p, bed: Some(bed) }).unwrap();
        *world.get::<&mut Phase>(p).unwrap() = Phase::PendingRemoval {
            reason: RemovalReason::Recovered,
        };

        let outcome = dispatch(&mut world, Action::RemovePatient { patient: Some(p) }).unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Removed {
                number: 3,
                name: "P3".to_string(),
                reason: Some(RemovalReason::Recovered)
            }
        );
        assert!(world.get::<&Bed>(bed).unwrap().is_free());
        assert!(!world.contains(p));
    }

    #[test]
    fn test_planned_decisions_never_take_from_operator() {
        let mut world = World::new();
        let p = add(&mut world, 0, 0);
        world.get::<&mut TriageStatus>(p).unwrap().assigned_to = Some(Owner::Person);

        let update = PlannedUpdate {
            patient: p,
            planned_decision: Some(CareTier::Ward),
            influences: Influences::new(),
            assigned_to: Owner::Robot,
            can_be_triaged_by_agent: true,
            care_contending_patients: Vec::new(),
        };
        dispatch(&mut world, Action::SetPlannedDecisions { updates: vec![update.clone()] }).unwrap();

        let status = world.get::<&TriageStatus>(p).unwrap();
        assert_eq!(status.assigned_to, Some(Owner::Person));
        assert_eq!(status.planned_decision, Some(CareTier::Ward));
        drop(status);
        assert_eq!(
            *world.get::<&Phase>(p).unwrap(),
            Phase::ProvisionallyAssigned { tier: CareTier::Ward }
        );

        let dup = Action::SetPlannedDecisions {
            updates: vec![update.clone(), update],
        };
        assert!(matches!(dispatch(&mut world, dup), Err(ActionError::InvalidRequest { .. })));
    }
}
