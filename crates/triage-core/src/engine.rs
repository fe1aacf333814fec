//! Triage engine - main entry point for running the simulation

use std::collections::HashSet;

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};
use triage_logic::attributes::{CareTier, PatientProfile};
use triage_logic::sickness;

use crate::actions::{dispatch, Action, ActionOutcome};
use crate::components::*;
use crate::config::{DecisionPolicy, SimulationConfig};
use crate::error::{ActionError, EngineError, EngineResult, OperatorError};
use crate::messages::{Address, MessageBus, MessageContent};
use crate::query;
use crate::records::*;
use crate::systems::*;

/// A patient waiting on the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorView {
    pub patient: Entity,
    pub number: u32,
    pub name: String,
    pub planned_decision: Option<CareTier>,
    pub care_contending_patients: Vec<String>,
    pub health: Option<f64>,
}

/// Main simulation engine
pub struct TriageEngine {
    /// ECS world containing beds and patients
    pub world: World,
    config: SimulationConfig,
    bus: MessageBus,
    rng: StdRng,

    planner: AdmissionPlanner,
    allocator: AllocationEngine,
    manager: HospitalManager,

    /// Index of the next tick to run.
    tick: u64,
    /// Numbers of patients that reached a completed phase.
    completed: HashSet<u32>,
    all_completed_at: Option<u64>,
}

impl TriageEngine {
    /// Build the hospital described by `config`.
    pub fn new(config: SimulationConfig) -> EngineResult<Self> {
        config.validate()?;

        let mut world = World::new();
        let mut number = 0;
        for (tier, count) in [
            (CareTier::WaitingRoom, config.hospital.waiting_room_beds),
            (CareTier::Ward, config.hospital.ward_beds),
            (CareTier::Icu, config.hospital.icu_beds),
        ] {
            for _ in 0..count {
                world.spawn((Bed::new(tier, number),));
                number += 1;
            }
        }
        info!(
            waiting_room = config.hospital.waiting_room_beds,
            ward = config.hospital.ward_beds,
            icu = config.hospital.icu_beds,
            policy = ?config.policy,
            "hospital ready"
        );

        Ok(Self {
            world,
            bus: MessageBus::new(),
            rng: StdRng::seed_from_u64(config.random_seed),
            planner: AdmissionPlanner::new(&config)?,
            allocator: AllocationEngine::new(&config),
            manager: HospitalManager::new(),
            tick: 0,
            completed: HashSet::new(),
            all_completed_at: None,
            config,
        })
    }

    /// Run one tick.
    ///
    /// Messages sent during a tick are seen by their receivers in the next.
    pub fn tick(&mut self) -> EngineResult<TickReport> {
        let now = self.tick;
        let mut report = TickReport {
            tick: now,
            ..TickReport::default()
        };
        self.bus.deliver();

        // Patients
        countdown_system(&mut self.world);
        sickness_system(
            &mut self.world,
            now,
            SicknessSchedule {
                initial_static_ticks: self.config.patients.initial_static_ticks,
                update_every: self.config.patients.update_sickness_every_x_ticks,
            },
        );
        report.decisions = inbox_system(&mut self.world, &mut self.bus, now);

        // Hospital manager
        self.manager.collect_requests(&mut self.bus);

        // Allocation engine
        let round = self.allocator.decide(&self.world, &mut self.bus, now);
        report.explanation = Some(round.explanation);

        // Actions
        if let Some(action) = round.action {
            self.apply(action);
        }
        if let Some(action) = self.manager.next_removal() {
            if let Some(removal) = self.remove(action, now) {
                report.removals.push(removal);
            }
        }
        let intents = lifecycle_system(
            &mut self.world,
            &mut self.bus,
            now,
            LifecycleParams {
                deceased_fade_after_ticks: self.config.patients.deceased_fade_after_ticks,
                exit_walk_ticks: self.config.hospital.exit_walk_ticks,
            },
            &mut self.rng,
        )
        .inspect_err(|e| error!(tick = now, "{e}"))?;
        for action in intents {
            self.apply(action);
        }
        self.planner.plan(now, self.config.tick_duration, &mut self.rng);
        if let Some(action) = self.planner.next_spawn(&self.world, &mut self.rng) {
            if let Some(record) = self.admit(action, now) {
                report.new_patients.push(record);
            }
        }

        walk_system(&mut self.world);
        self.track_completion(now);
        if now % self.config.status_snapshot_every_ticks == 0 {
            report.status = Some(self.status_snapshot(now));
        }

        self.tick += 1;
        Ok(report)
    }

    /// Run until done or `max_ticks` have elapsed, collecting every report.
    pub fn run(&mut self, max_ticks: u64) -> EngineResult<Vec<TickReport>> {
        let mut reports = Vec::new();
        while !self.is_done() && self.tick < max_ticks {
            reports.push(self.tick()?);
        }
        Ok(reports)
    }

    fn apply(&mut self, action: Action) {
        let name = action.name();
        match dispatch(&mut self.world, action) {
            Ok(_) => {}
            Err(ActionError::BedOccupied { bed }) => {
                debug!(?bed, "bed taken this tick, retrying next tick");
            }
            Err(e) => warn!(action = name, "{e}"),
        }
    }

    fn remove(&mut self, action: Action, now: u64) -> Option<RemovalRecord> {
        let Action::RemovePatient {
            patient: Some(patient),
        } = action
        else {
            return None;
        };
        match dispatch(&mut self.world, action) {
            Ok(ActionOutcome::Removed {
                number,
                name,
                reason,
            }) => {
                self.bus.discard(Address::Patient(patient));
                info!(patient = %name, ?reason, "patient removed");
                Some(RemovalRecord {
                    tick: now,
                    patient_id: number,
                    patient_name: name,
                    reason,
                })
            }
            Ok(_) => None,
            Err(e) => {
                warn!(?patient, "dropping removal request: {e}");
                None
            }
        }
    }

    fn admit(&mut self, action: Action, now: u64) -> Option<NewPatientRecord> {
        let Action::AddPatient { entrance, .. } = action else {
            return None;
        };
        let entity = match dispatch(&mut self.world, action) {
            Ok(ActionOutcome::Spawned(entity)) => entity,
            Ok(_) => return None,
            Err(e) => {
                warn!(entrance, "admission failed: {e}");
                return None;
            }
        };

        let patient = self.world.get::<&Patient>(entity).ok()?;
        let profile = self.world.get::<&PatientProfile>(entity).ok()?;
        let vitals = self.world.get::<&Vitals>(entity).ok()?;
        info!(patient = %patient.name, entrance, "patient admitted");
        Some(NewPatientRecord {
            tick: now,
            patient_id: patient.number,
            entrance,
            profile: (*profile).clone(),
            offsets: vitals.offsets,
            initial_health: sickness::initial_health(profile.symptoms),
        })
    }

    fn track_completion(&mut self, now: u64) {
        for (_, (patient, phase)) in self.world.query::<(&Patient, &Phase)>().iter() {
            if phase.is_completed() && self.completed.insert(patient.number) {
                debug!(patient = %patient.name, ?phase, "patient completed");
            }
        }
        let max = self.config.patients.max_patients;
        if max > 0 && self.completed.len() >= max && self.all_completed_at.is_none() {
            info!(tick = now, "all patients completed");
            self.all_completed_at = Some(now);
        }
    }

    fn status_snapshot(&self, now: u64) -> PatientStatusRecord {
        let mut patients: Vec<PatientStatusEntry> = self
            .world
            .query::<(&Patient, &Vitals, &Care, &Location)>()
            .iter()
            .map(|(_, (patient, vitals, care, location))| PatientStatusEntry {
                patient_id: patient.number,
                patient_name: patient.name.clone(),
                symptoms: vitals.symptoms,
                health: vitals.health,
                care: care.receiving,
                whereabouts: Whereabouts::from(*location),
            })
            .collect();
        patients.sort_by_key(|p| p.patient_id);
        PatientStatusRecord { tick: now, patients }
    }

    // ── Operator ───────────────────────────────────────────────────────

    /// Post a binding decision for a patient the operator owns.
    pub fn submit_human_decision(&mut self, patient: Entity, tier: CareTier) -> Result<(), OperatorError> {
        if tier == CareTier::WaitingRoom {
            return Err(OperatorError::InvalidTier(tier));
        }
        let (name, owned, open) = {
            let p = self
                .world
                .get::<&Patient>(patient)
                .map_err(|_| OperatorError::UnknownPatient(patient))?;
            let status = self
                .world
                .get::<&TriageStatus>(patient)
                .map_err(|_| OperatorError::UnknownPatient(patient))?;
            let phase = self
                .world
                .get::<&Phase>(patient)
                .map_err(|_| OperatorError::UnknownPatient(patient))?;
            (
                p.name.clone(),
                status.owned_by(Owner::Person),
                !status.triaged && phase.is_awaiting_triage(),
            )
        };
        if !open || self.bus.has_decision_for(patient) {
            return Err(OperatorError::AlreadyTriaged(name));
        }
        if !owned {
            return Err(OperatorError::WrongOwner(name));
        }
        if tier.is_limited() && query::unreserved_beds(&self.world, &self.bus, tier) == 0 {
            return Err(OperatorError::NoCapacity(tier));
        }

        info!(patient = %name, %tier, "operator decision");
        self.bus.send(
            Address::Patient(patient),
            Address::Operator,
            MessageContent::TriageDecision {
                decision: tier,
                triaged_by: DecisionMaker::Human,
            },
        );
        Ok(())
    }

    /// Take a patient away from the automated countdown.
    pub fn claim_patient(&mut self, patient: Entity) -> Result<(), OperatorError> {
        if self.config.policy == DecisionPolicy::FullyAutomated {
            return Err(OperatorError::ClaimsDisabled);
        }
        let (name, owned, open) = {
            let p = self
                .world
                .get::<&Patient>(patient)
                .map_err(|_| OperatorError::UnknownPatient(patient))?;
            let status = self
                .world
                .get::<&TriageStatus>(patient)
                .map_err(|_| OperatorError::UnknownPatient(patient))?;
            let phase = self
                .world
                .get::<&Phase>(patient)
                .map_err(|_| OperatorError::UnknownPatient(patient))?;
            (
                p.name.clone(),
                status.owned_by(Owner::Person),
                !status.triaged && phase.is_awaiting_triage(),
            )
        };
        if !open || self.bus.has_decision_for(patient) {
            return Err(OperatorError::AlreadyTriaged(name));
        }
        if owned {
            return Ok(());
        }
        info!(patient = %name, "operator claimed patient");
        self.bus.send(
            Address::Patient(patient),
            Address::Operator,
            MessageContent::Reassign {
                assigned_to: Owner::Person,
            },
        );
        Ok(())
    }

    /// Untriaged patients the operator owns, in admission order.
    pub fn operator_queue(&self) -> Vec<OperatorView> {
        let mut queue: Vec<OperatorView> = self
            .world
            .query::<(&Patient, &Vitals, &TriageStatus, &Phase)>()
            .iter()
            .filter(|(_, (_, _, status, phase))| {
                status.owned_by(Owner::Person) && !status.triaged && phase.is_awaiting_triage()
            })
            .map(|(entity, (patient, vitals, status, _))| OperatorView {
                patient: entity,
                number: patient.number,
                name: patient.name.clone(),
                planned_decision: status.planned_decision,
                care_contending_patients: status.care_contending_patients.clone(),
                health: vitals.health,
            })
            .collect();
        queue.sort_by_key(|v| v.number);
        queue
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Share of the expected patients that reached a completed phase.
    pub fn progress(&self) -> f64 {
        let max = self.config.patients.max_patients;
        if max == 0 {
            return 0.0;
        }
        (self.completed.len() as f64 / max as f64).min(1.0)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Every patient completed and the grace period has passed.
    pub fn is_done(&self) -> bool {
        self.all_completed_at
            .is_some_and(|t| self.tick.saturating_sub(t) > self.config.completion_grace_ticks)
    }

    pub fn free_beds(&self, tier: CareTier) -> usize {
        query::free_beds(&self.world, tier)
    }

    pub fn occupied_beds(&self, tier: CareTier) -> usize {
        query::occupied_beds(&self.world, tier)
    }

    pub fn unreserved_beds(&self, tier: CareTier) -> usize {
        query::unreserved_beds(&self.world, &self.bus, tier)
    }

    pub fn patient_count(&self) -> usize {
        self.world.query::<&Patient>().iter().count()
    }

    /// Patients admitted so far, including those already removed.
    pub fn admitted_count(&self) -> usize {
        self.planner.spawned()
    }

    /// Entity of the patient with admission number `number`, if present.
    pub fn patient_by_number(&self, number: u32) -> Option<Entity> {
        self.world
            .query::<&Patient>()
            .iter()
            .find(|(_, p)| p.number == number)
            .map(|(e, _)| e)
    }
}
