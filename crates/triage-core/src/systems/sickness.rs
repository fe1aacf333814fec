//! Sickness system - advances health on the configured schedule

use crate::components::{Care, Owner, Phase, TriageStatus, Vitals};
use hecs::World;
use triage_logic::attributes::PatientProfile;
use triage_logic::sickness;

/// When sickness updates happen for one patient.
#[derive(Debug, Clone, Copy)]
pub struct SicknessSchedule {
    /// Ticks health stays at its starting value after the first update.
    pub initial_static_ticks: u64,
    pub update_every: u64,
}

/// Set starting health on a patient's first tick, then apply the sickness
/// model each time the schedule comes round. Stops once a patient has
/// died or recovered.
pub fn sickness_system(world: &mut World, tick: u64, schedule: SicknessSchedule) {
    for (_, (vitals, care, profile, phase)) in
        world.query_mut::<(&mut Vitals, &Care, &PatientProfile, &Phase)>()
    {
        if phase.is_terminal() {
            continue;
        }
        match vitals.health {
            None => {
                vitals.health = Some(sickness::initial_health(vitals.symptoms));
                vitals.next_update = tick + schedule.initial_static_ticks + schedule.update_every;
            }
            Some(health) if sickness::is_deceased(health) || sickness::is_recovered(health) => {}
            Some(health) if tick >= vitals.next_update => {
                let state = sickness::update(
                    health,
                    vitals.symptoms,
                    profile.fitness,
                    care.receiving,
                    vitals.offsets,
                );
                vitals.health = Some(state.health);
                vitals.symptoms = state.symptoms;
                vitals.next_update = tick + schedule.update_every;
            }
            Some(_) => {}
        }
    }
}

/// Tick down the automated countdown of every untriaged patient the
/// engine owns.
pub fn countdown_system(world: &mut World) {
    for (_, (status, phase)) in world.query_mut::<(&mut TriageStatus, &Phase)>() {
        if status.owned_by(Owner::Robot) && !status.triaged && phase.is_awaiting_triage() {
            status.countdown = status.countdown.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_logic::attributes::{CareTier, Fitness, Gender, HomeSituation, Profession, Symptoms};
    use triage_logic::sickness::PatientOffsets;

    fn profile(fitness: Fitness) -> PatientProfile {
        PatientProfile {
            name: "Jan".to_string(),
            gender: Gender::Male,
            age: 50,
            profession: Profession::new("Kok"),
            fitness,
            symptoms: Symptoms::High,
            home_situation: HomeSituation::new("Alleenstaand"),
            description: String::new(),
        }
    }

    fn spawn(world: &mut World, fitness: Fitness, receiving: Option<CareTier>) -> hecs::Entity {
        world.spawn((
            Vitals::new(Symptoms::High, PatientOffsets::default()),
            Care {
                receiving,
                target: CareTier::WaitingRoom,
            },
            profile(fitness),
            Phase::WaitingRoomUnassigned,
            TriageStatus::new(3),
        ))
    }

    const SCHEDULE: SicknessSchedule = SicknessSchedule {
        initial_static_ticks: 2,
        update_every: 1,
    };

    #[test]
    fn test_health_static_until_schedule() {
        let mut world = World::new();
        let p = spawn(&mut world, Fitness::Medium, Some(CareTier::WaitingRoom));

        sickness_system(&mut world, 0, SCHEDULE);
        assert_eq!(world.get::<&Vitals>(p).unwrap().health, Some(30.0));
        assert_eq!(world.get::<&Vitals>(p).unwrap().next_update, 3);

        for tick in 1..3 {
            sickness_system(&mut world, tick, SCHEDULE);
        }
        assert_eq!(world.get::<&Vitals>(p).unwrap().health, Some(30.0));

        sickness_system(&mut world, 3, SCHEDULE);
        sickness_system(&mut world, 4, SCHEDULE);
        assert_eq!(world.get::<&Vitals>(p).unwrap().health, Some(28.0));
    }

    #[test]
    fn test_no_care_means_no_change() {
        let mut world = World::new();
        let p = spawn(&mut world, Fitness::VeryLow, None);
        for tick in 0..20 {
            sickness_system(&mut world, tick, SCHEDULE);
        }
        assert_eq!(world.get::<&Vitals>(p).unwrap().health, Some(30.0));
    }

    #[test]
    fn test_received_care_moves_health() {
        let mut world = World::new();
        let home = spawn(&mut world, Fitness::Medium, Some(CareTier::Home));
        let icu = spawn(&mut world, Fitness::Medium, Some(CareTier::Icu));
        for tick in 0..5 {
            sickness_system(&mut world, tick, SCHEDULE);
        }
        // two updates, at ticks 3 and 4
        assert_eq!(world.get::<&Vitals>(home).unwrap().health, Some(26.0));
        assert_eq!(world.get::<&Vitals>(icu).unwrap().health, Some(36.0));
    }

    #[test]
    fn test_updates_stop_at_death() {
        let mut world = World::new();
        let p = spawn(&mut world, Fitness::VeryLow, Some(CareTier::Home));
        for tick in 0..200 {
            sickness_system(&mut world, tick, SCHEDULE);
        }
        let vitals = *world.get::<&Vitals>(p).unwrap();
        let health = vitals.health.unwrap();
        assert!(sickness::is_deceased(health));
        assert!(health > -4.0);
        assert_eq!(vitals.symptoms, Symptoms::VeryHigh);
    }

    #[test]
    fn test_countdown_only_for_engine_owned() {
        let mut world = World::new();
        let robot = spawn(&mut world, Fitness::Medium, None);
        let person = spawn(&mut world, Fitness::Medium, None);
        let unowned = spawn(&mut world, Fitness::Medium, None);
        world.get::<&mut TriageStatus>(robot).unwrap().assigned_to = Some(Owner::Robot);
        world.get::<&mut TriageStatus>(person).unwrap().assigned_to = Some(Owner::Person);

        for _ in 0..5 {
            countdown_system(&mut world);
        }
        assert_eq!(world.get::<&TriageStatus>(robot).unwrap().countdown, 0);
        assert_eq!(world.get::<&TriageStatus>(person).unwrap().countdown, 3);
        assert_eq!(world.get::<&TriageStatus>(unowned).unwrap().countdown, 3);
    }
}
