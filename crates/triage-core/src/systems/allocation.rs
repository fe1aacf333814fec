//! Allocation engine - scores the waiting room and proposes care each tick
//!
//! Every tick the engine re-scores each untriaged patient it may decide
//! for, runs the allocation primitive against the beds nobody has been
//! promised yet, and:
//!
//! - hands uncertainty clusters to the operator,
//! - resets the countdown of any patient whose proposal changed,
//! - sends a binding decision once a patient's countdown has run out.

use std::collections::{HashMap, HashSet};

use hecs::{Entity, World};
use tracing::{debug, info};
use triage_logic::allocation::{allocate, Candidate, FreeCapacity};
use triage_logic::attributes::{CareTier, PatientProfile};
use triage_logic::elicitation::ElicitedRules;
use triage_logic::scoring::{Influences, ScoreInput, TriageScorer};

use crate::actions::{Action, PlannedUpdate};
use crate::components::{DecisionMaker, Owner, Patient, Phase, TriageStatus, Vitals};
use crate::config::{DecisionPolicy, SimulationConfig};
use crate::messages::{Address, MessageBus, MessageContent};
use crate::query;
use crate::records::EngineExplanationRecord;

/// Output of one engine pass.
#[derive(Debug, Clone)]
pub struct AllocationRound {
    /// Proposals to apply this tick, if there were any candidates.
    pub action: Option<Action>,
    pub explanation: EngineExplanationRecord,
    pub deferred: usize,
    pub finalized: usize,
}

/// What the engine reads about one candidate.
struct CandidateView {
    entity: Entity,
    number: u32,
    name: String,
    owner: Option<Owner>,
    countdown: u32,
    planned: Option<CareTier>,
}

#[derive(Debug)]
pub struct AllocationEngine {
    scorer: TriageScorer,
    policy: DecisionPolicy,
    threshold: Option<f64>,
    triage_countdown: u32,
    previous_decisions: HashMap<Entity, CareTier>,
}

impl AllocationEngine {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            scorer: TriageScorer::new(config.user_elicitation),
            policy: config.policy,
            threshold: config.allocation_threshold(),
            triage_countdown: config.triage_countdown,
            previous_decisions: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &ElicitedRules {
        self.scorer.rules()
    }

    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    fn candidates(&self, world: &World) -> Vec<(CandidateView, f64, Influences)> {
        let mut views: Vec<(CandidateView, f64, Influences)> = world
            .query::<(&Patient, &PatientProfile, &Vitals, &TriageStatus, &Phase)>()
            .iter()
            .filter(|(_, (_, _, _, status, phase))| !status.triaged && phase.is_awaiting_triage())
            .filter(|(_, (_, _, _, status, _))| {
                self.policy == DecisionPolicy::FullyAutomated || !status.owned_by(Owner::Person)
            })
            .map(|(entity, (patient, profile, vitals, status, _))| {
                let triage = self.scorer.score(&ScoreInput {
                    symptoms: vitals.symptoms,
                    fitness: profile.fitness,
                    age: profile.age,
                    profession: &profile.profession,
                    gender: profile.gender,
                    home_situation: &profile.home_situation,
                });
                let view = CandidateView {
                    entity,
                    number: patient.number,
                    name: patient.name.clone(),
                    owner: status.assigned_to,
                    countdown: status.countdown,
                    planned: status.planned_decision,
                };
                (view, triage.score, triage.influences)
            })
            .collect();
        views.sort_by_key(|(view, _, _)| view.number);
        views
    }

    /// Run one pass over the current world.
    pub fn decide(&mut self, world: &World, bus: &mut MessageBus, tick: u64) -> AllocationRound {
        let candidates = self.candidates(world);
        let capacity = FreeCapacity {
            icu: query::unreserved_beds(world, bus, CareTier::Icu),
            ward: query::unreserved_beds(world, bus, CareTier::Ward),
        };
        let ranked: Vec<Candidate<Entity>> = candidates
            .iter()
            .map(|(view, score, _)| Candidate {
                id: view.entity,
                score: *score,
            })
            .collect();
        let allocation = allocate(&ranked, capacity, self.threshold);

        let mut explanation = EngineExplanationRecord {
            tick,
            user_elicitation_rules: *self.scorer.rules(),
            ..EngineExplanationRecord::default()
        };
        let mut updates: Vec<(u32, PlannedUpdate)> = Vec::with_capacity(candidates.len());
        let by_entity: HashMap<Entity, (&CandidateView, &Influences)> = candidates
            .iter()
            .map(|(view, _, influences)| (view.entity, (view, influences)))
            .collect();

        // Uncertainty clusters go to the operator.
        let mut deferred: HashSet<Entity> = HashSet::new();
        for cluster in &allocation.deferred {
            info!(tier = %cluster.tier, members = cluster.members.len(), "deferring cluster to operator");
            for member in &cluster.members {
                let Some((view, influences)) = by_entity.get(member) else {
                    continue;
                };
                deferred.insert(*member);
                if view.owner != Some(Owner::Person) {
                    bus.send(
                        Address::Patient(*member),
                        Address::AllocationEngine,
                        MessageContent::Reassign {
                            assigned_to: Owner::Person,
                        },
                    );
                }
                let care_contending_patients = cluster
                    .members
                    .iter()
                    .filter(|other| *other != member)
                    .filter_map(|other| by_entity.get(other).map(|(v, _)| v.name.clone()))
                    .collect();
                updates.push((
                    view.number,
                    PlannedUpdate {
                        patient: *member,
                        planned_decision: Some(cluster.tier),
                        influences: (*influences).clone(),
                        assigned_to: Owner::Person,
                        can_be_triaged_by_agent: false,
                        care_contending_patients,
                    },
                ));
            }
        }

        for (view, score, influences) in &candidates {
            let decision = allocation.decision_for(view.entity);
            explanation.triage_scores.insert(view.number, *score);
            explanation.influences.insert(view.number, influences.clone());
            if let Some(decision) = decision {
                explanation.triage_decisions.insert(view.number, decision);
            }
            if !deferred.contains(&view.entity) {
                updates.push((
                    view.number,
                    PlannedUpdate {
                        patient: view.entity,
                        planned_decision: decision,
                        influences: influences.clone(),
                        assigned_to: Owner::Robot,
                        can_be_triaged_by_agent: true,
                        care_contending_patients: Vec::new(),
                    },
                ));
            }
        }

        // A changed proposal restarts the countdown.
        let mut reset: HashSet<Entity> = HashSet::new();
        for (entity, decision) in &allocation.decisions {
            if let Some(previous) = self.previous_decisions.get(entity) {
                if previous != decision {
                    debug!(patient = ?entity, from = %previous, to = %decision, "proposal changed");
                    bus.send(
                        Address::Patient(*entity),
                        Address::AllocationEngine,
                        MessageContent::ResetCounter {
                            counter_value: self.triage_countdown,
                        },
                    );
                    reset.insert(*entity);
                }
            }
        }

        let mut finalized = 0;
        for (view, _, _) in &candidates {
            if deferred.contains(&view.entity)
                || reset.contains(&view.entity)
                || view.countdown > 0
                || bus.has_decision_for(view.entity)
            {
                continue;
            }
            let Some(decision) = allocation.decision_for(view.entity).or(view.planned) else {
                continue;
            };
            info!(patient = %view.name, %decision, "finalizing automated decision");
            bus.send(
                Address::Patient(view.entity),
                Address::AllocationEngine,
                MessageContent::TriageDecision {
                    decision,
                    triaged_by: DecisionMaker::Agent,
                },
            );
            finalized += 1;
        }

        self.previous_decisions = allocation.decisions.iter().copied().collect();

        updates.sort_by_key(|(number, _)| *number);
        let updates: Vec<PlannedUpdate> = updates.into_iter().map(|(_, update)| update).collect();

        AllocationRound {
            action: (!updates.is_empty()).then_some(Action::SetPlannedDecisions { updates }),
            explanation,
            deferred: deferred.len(),
            finalized,
        }
    }
}
