//! Admission planner - turns the time-keyed schedule into patient spawns

use std::collections::VecDeque;

use hecs::World;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use tracing::debug;
use triage_logic::attributes::{CareTier, PatientProfile};
use triage_logic::sickness::{PatientOffsets, CARE_OFFSET_STD, FITNESS_OFFSET_STD};

use crate::actions::Action;
use crate::components::ENTRANCE_COUNT;
use crate::config::{PlanningKeypoint, SimulationConfig};
use crate::error::ConfigError;
use crate::query;

/// Ticks after a spawn during which no other patient is spawned.
pub const SPAWN_COOLDOWN_TICKS: u32 = 3;

/// A patient waiting to be materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub number: u32,
    pub profile: PatientProfile,
    pub offsets: PatientOffsets,
}

#[derive(Debug, Clone)]
pub struct AdmissionPlanner {
    planning: Vec<PlanningKeypoint>,
    roster: Vec<PatientProfile>,
    max_patients: usize,
    triage_countdown: u32,

    current_keypoint: Option<usize>,
    next_spawn_second: f64,
    queue: VecDeque<Admission>,
    generated: usize,
    spawned: usize,
    cooldown: u32,
    last_entrance: Option<u8>,

    fitness_offset: Normal<f64>,
    care_offset: Normal<f64>,
}

impl AdmissionPlanner {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let normal = |std: f64| {
            Normal::new(0.0, std).map_err(|e| ConfigError::Invalid {
                reason: format!("offset distribution: {e}"),
            })
        };
        Ok(Self {
            planning: config.patients.patient_planning.clone(),
            roster: config.patients.roster.clone(),
            max_patients: config.patients.max_patients,
            triage_countdown: config.triage_countdown,
            current_keypoint: None,
            next_spawn_second: 0.0,
            queue: VecDeque::new(),
            generated: 0,
            spawned: 0,
            cooldown: 0,
            last_entrance: None,
            fitness_offset: normal(FITNESS_OFFSET_STD)?,
            care_offset: normal(CARE_OFFSET_STD)?,
        })
    }

    /// Queue the next roster entry when the schedule calls for one.
    pub fn plan(&mut self, tick: u64, tick_duration: f64, rng: &mut StdRng) {
        let second = tick as f64 * tick_duration;
        let Some(index) = self.planning.iter().rposition(|k| second > k.second) else {
            return;
        };
        if self.spawned + self.queue.len() >= self.max_patients {
            return;
        }
        if self.current_keypoint == Some(index) && second <= self.next_spawn_second {
            return;
        }

        self.current_keypoint = Some(index);
        let Some(profile) = self.roster.get(self.generated).cloned() else {
            return;
        };
        let offsets = PatientOffsets {
            fitness: self.fitness_offset.sample(rng),
            care: self.care_offset.sample(rng),
        };
        debug!(number = self.generated, name = %profile.name, "patient queued for admission");
        self.queue.push_back(Admission {
            number: self.generated as u32,
            profile,
            offsets,
        });
        self.generated += 1;
        self.next_spawn_second = second + self.planning[index].seconds_per_patient;
    }

    /// Spawn the head of the queue if a chair is free, the cooldown has
    /// passed and an entrance is clear.
    pub fn next_spawn(&mut self, world: &World, rng: &mut StdRng) -> Option<Action> {
        let ready = !self.queue.is_empty()
            && query::free_beds(world, CareTier::WaitingRoom) > 0
            && self.cooldown == 0;
        if !ready {
            self.cooldown = self.cooldown.saturating_sub(1);
            return None;
        }

        let free: Vec<u8> = (0..ENTRANCE_COUNT)
            .filter(|k| query::entrance_is_free(world, *k))
            .collect();
        let entrance = match (free.as_slice(), self.last_entrance) {
            ([first, second], Some(last)) => {
                if *first != last {
                    *first
                } else {
                    *second
                }
            }
            _ => *free.choose(rng)?,
        };

        let admission = self.queue.pop_front()?;
        self.last_entrance = Some(entrance);
        self.spawned += 1;
        self.cooldown = SPAWN_COOLDOWN_TICKS;
        Some(Action::AddPatient {
            admission,
            entrance,
            countdown: self.triage_countdown,
        })
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    pub fn last_entrance(&self) -> Option<u8> {
        self.last_entrance
    }
}
