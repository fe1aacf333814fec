//! World-state lookups by predicate.
//!
//! Every lookup returns a `Vec` ordered by the entity's stable number, so
//! callers never branch on "one match" versus "many".

use hecs::{Entity, World};
use triage_logic::attributes::CareTier;

use crate::components::{Bed, Location, Owner, Patient, Phase, TriageStatus};
use crate::messages::MessageBus;

/// Attribute equalities a bed must satisfy. `None` matches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct BedFilter {
    pub tier: Option<CareTier>,
    pub free: Option<bool>,
}

impl BedFilter {
    pub fn free_of(tier: CareTier) -> Self {
        Self {
            tier: Some(tier),
            free: Some(true),
        }
    }
}

pub fn beds_matching(world: &World, filter: BedFilter) -> Vec<Entity> {
    let mut beds: Vec<(u32, Entity)> = world
        .query::<&Bed>()
        .iter()
        .filter(|(_, bed)| filter.tier.map_or(true, |t| bed.tier == t))
        .filter(|(_, bed)| filter.free.map_or(true, |f| bed.is_free() == f))
        .map(|(entity, bed)| (bed.number, entity))
        .collect();
    beds.sort_unstable();
    beds.into_iter().map(|(_, e)| e).collect()
}

pub fn free_beds(world: &World, tier: CareTier) -> usize {
    world
        .query::<&Bed>()
        .iter()
        .filter(|(_, bed)| bed.tier == tier && bed.is_free())
        .count()
}

pub fn occupied_beds(world: &World, tier: CareTier) -> usize {
    world
        .query::<&Bed>()
        .iter()
        .filter(|(_, bed)| bed.tier == tier && !bed.is_free())
        .count()
}

/// Attribute equalities a patient must satisfy. `None` matches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientFilter {
    pub triaged: Option<bool>,
    pub owner: Option<Owner>,
    pub awaiting_triage: Option<bool>,
    pub entrance: Option<u8>,
}

/// Matching patients in admission order.
pub fn patients_matching(world: &World, filter: PatientFilter) -> Vec<Entity> {
    let mut patients: Vec<(u32, Entity)> = world
        .query::<(&Patient, &TriageStatus, &Phase, &Location)>()
        .iter()
        .filter(|(_, (_, status, _, _))| filter.triaged.map_or(true, |t| status.triaged == t))
        .filter(|(_, (_, status, _, _))| filter.owner.map_or(true, |o| status.owned_by(o)))
        .filter(|(_, (_, _, phase, _))| {
            filter
                .awaiting_triage
                .map_or(true, |a| phase.is_awaiting_triage() == a)
        })
        .filter(|(_, (_, _, _, location))| {
            filter
                .entrance
                .map_or(true, |k| **location == Location::Entrance(k))
        })
        .map(|(entity, (patient, _, _, _))| (patient.number, entity))
        .collect();
    patients.sort_unstable();
    patients.into_iter().map(|(_, e)| e).collect()
}

/// Untriaged patients still in need of a decision, in admission order.
pub fn triage_candidates(world: &World) -> Vec<Entity> {
    patients_matching(
        world,
        PatientFilter {
            triaged: Some(false),
            awaiting_triage: Some(true),
            ..PatientFilter::default()
        },
    )
}

pub fn entrance_is_free(world: &World, entrance: u8) -> bool {
    patients_matching(
        world,
        PatientFilter {
            entrance: Some(entrance),
            ..PatientFilter::default()
        },
    )
    .is_empty()
}

/// Patients finalized to `tier` that have not yet taken a bed of it.
pub fn finalized_awaiting_bed(world: &World, tier: CareTier) -> usize {
    world
        .query::<(&Phase, &Location)>()
        .iter()
        .filter(|(_, (phase, location))| {
            phase.finalized_tier() == Some(tier)
                && location
                    .bed()
                    .and_then(|bed| world.get::<&Bed>(bed).ok().map(|b| b.tier))
                    != Some(tier)
        })
        .count()
}

/// Beds of `tier` not yet promised to anyone.
///
/// Free beds, minus finalized patients still to claim one, minus binding
/// decisions still travelling on the bus.
pub fn unreserved_beds(world: &World, bus: &MessageBus, tier: CareTier) -> usize {
    free_beds(world, tier)
        .saturating_sub(finalized_awaiting_bed(world, tier))
        .saturating_sub(bus.decisions_in_flight(tier))
}

pub fn patient_name(world: &World, patient: Entity) -> Option<String> {
    world.get::<&Patient>(patient).ok().map(|p| p.name.clone())
}

pub fn patient_number(world: &World, patient: Entity) -> Option<u32> {
    world.get::<&Patient>(patient).ok().map(|p| p.number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Care, DecisionMaker, Vitals};
    use crate::messages::{Address, MessageContent};
    use triage_logic::attributes::Symptoms;
    use triage_logic::sickness::PatientOffsets;

    fn spawn_patient(world: &mut World, number: u32, phase: Phase, location: Location) -> Entity {
        world.spawn((
            Patient {
                number,
                name: format!("patient {number}"),
            },
            TriageStatus::new(5),
            phase,
            location,
            Care::default(),
            Vitals::new(Symptoms::Medium, PatientOffsets::default()),
        ))
    }

    #[test]
    fn test_beds_matching_filters_and_orders() {
        let mut world = World::new();
        let b2 = world.spawn((Bed::new(CareTier::Icu, 2),));
        let b1 = world.spawn((Bed::new(CareTier::Icu, 1),));
        let w = world.spawn((Bed::new(CareTier::Ward, 3),));

        assert_eq!(beds_matching(&world, BedFilter::free_of(CareTier::Icu)), vec![b1, b2]);
        assert_eq!(beds_matching(&world, BedFilter::default()), vec![b1, b2, w]);

        world.get::<&mut Bed>(b1).unwrap().occupant = Some(w);
        assert_eq!(beds_matching(&world, BedFilter::free_of(CareTier::Icu)), vec![b2]);
        assert_eq!(free_beds(&world, CareTier::Icu), 1);
        assert_eq!(occupied_beds(&world, CareTier::Icu), 1);
        assert!(beds_matching(&world, BedFilter::free_of(CareTier::Home)).is_empty());
    }

    #[test]
    fn test_candidates_in_admission_order() {
        let mut world = World::new();
        let late = spawn_patient(&mut world, 4, Phase::WaitingRoomUnassigned, Location::Entrance(0));
        let early = spawn_patient(
            &mut world,
            1,
            Phase::ProvisionallyAssigned { tier: CareTier::Ward },
            Location::Entrance(1),
        );
        spawn_patient(&mut world, 2, Phase::Deceased { tick_of_death: 1 }, Location::AtExit);

        assert_eq!(triage_candidates(&world), vec![early, late]);
        assert!(!entrance_is_free(&world, 0));
        assert!(!entrance_is_free(&world, 1));
    }

    #[test]
    fn test_unreserved_beds_subtracts_promises() {
        let mut world = World::new();
        let chair = world.spawn((Bed::new(CareTier::WaitingRoom, 0),));
        for n in 1..=3 {
            world.spawn((Bed::new(CareTier::Icu, n),));
        }
        let finalized = spawn_patient(
            &mut world,
            0,
            Phase::Finalized { tier: CareTier::Icu },
            Location::InBed(chair),
        );
        world.get::<&mut Bed>(chair).unwrap().occupant = Some(finalized);
        let waiting = spawn_patient(&mut world, 1, Phase::WaitingRoomUnassigned, Location::Entrance(0));

        let mut bus = MessageBus::new();
        assert_eq!(unreserved_beds(&world, &bus, CareTier::Icu), 2);

        bus.send(
            Address::Patient(waiting),
            Address::Operator,
            MessageContent::TriageDecision {
                decision: CareTier::Icu,
                triaged_by: DecisionMaker::Human,
            },
        );
        assert_eq!(unreserved_beds(&world, &bus, CareTier::Icu), 1);
        assert_eq!(unreserved_beds(&world, &bus, CareTier::Ward), 0);
    }
}
