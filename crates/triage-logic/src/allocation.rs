//! Capacity-constrained care allocation with uncertainty clustering.
//!
//! Candidates are ranked by triage score and granted the tier their score
//! requires while beds last. When a tier is oversubscribed the ranked list
//! is walked looking for runs of patients whose neighbouring scores lie
//! within the uncertainty threshold. A run that fits in the remaining beds
//! is granted; a run that does not is handed to the human operator as a
//! whole and the tier is closed for the rest of the tick.
//!
//! ICU overflow falls back to the ward (ahead of everyone already waiting
//! for a ward bed) and ward overflow falls back to home.

use std::collections::HashSet;
use std::hash::Hash;

use crate::attributes::CareTier;

/// One patient competing for care this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<Id> {
    pub id: Id,
    pub score: f64,
}

/// Unreserved beds per limited tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeCapacity {
    pub icu: usize,
    pub ward: usize,
}

/// Patients too close in score to rank, all wanting the same tier.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCluster<Id> {
    pub tier: CareTier,
    /// Members in descending score order.
    pub members: Vec<Id>,
}

/// Result of one allocation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation<Id> {
    /// Decisions in descending score order. Deferred patients are absent.
    pub decisions: Vec<(Id, CareTier)>,
    pub deferred: Vec<DeferredCluster<Id>>,
}

impl<Id: Copy + PartialEq> Allocation<Id> {
    pub fn decision_for(&self, id: Id) -> Option<CareTier> {
        self.decisions
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, tier)| *tier)
    }

    pub fn is_deferred(&self, id: Id) -> bool {
        self.deferred.iter().any(|c| c.members.contains(&id))
    }

    /// Number of decisions granting `tier`.
    pub fn granted(&self, tier: CareTier) -> usize {
        self.decisions.iter().filter(|(_, t)| *t == tier).count()
    }
}

/// Rank candidates and decide a tier for each.
///
/// `threshold = None` allocates greedily by rank and never defers.
/// With `Some(t)`, neighbours whose scores differ by at most `t` form an
/// uncertainty cluster. Equal scores keep the input order.
pub fn allocate<Id>(
    candidates: &[Candidate<Id>],
    capacity: FreeCapacity,
    threshold: Option<f64>,
) -> Allocation<Id>
where
    Id: Copy + Eq + Hash,
{
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut allocation = Allocation {
        decisions: Vec::with_capacity(ranked.len()),
        deferred: Vec::new(),
    };

    let mut icu_queue = Vec::new();
    let mut ward_queue = Vec::new();
    for candidate in ranked {
        match CareTier::from_score(candidate.score) {
            CareTier::Icu if capacity.icu > 0 => icu_queue.push(candidate),
            CareTier::Icu | CareTier::Ward if capacity.ward > 0 => ward_queue.push(candidate),
            _ => allocation.decisions.push((candidate.id, CareTier::Home)),
        }
    }

    let icu_overflow = allocate_tier(CareTier::Icu, &icu_queue, capacity.icu, threshold, &mut allocation);
    let mut ward_candidates = icu_overflow;
    ward_candidates.extend(ward_queue);

    let ward_overflow = allocate_tier(CareTier::Ward, &ward_candidates, capacity.ward, threshold, &mut allocation);
    for candidate in ward_overflow {
        allocation.decisions.push((candidate.id, CareTier::Home));
    }

    allocation
}

/// Allocate one limited tier. Returns the candidates left without a bed.
fn allocate_tier<Id>(
    tier: CareTier,
    queue: &[Candidate<Id>],
    free: usize,
    threshold: Option<f64>,
    allocation: &mut Allocation<Id>,
) -> Vec<Candidate<Id>>
where
    Id: Copy + Eq + Hash,
{
    if queue.len() <= free {
        allocation.decisions.extend(queue.iter().map(|c| (c.id, tier)));
        return Vec::new();
    }

    let mut free = free;
    let mut overflow = Vec::new();
    let mut cluster = ClusterBuilder::default();

    for (i, candidate) in queue.iter().enumerate() {
        if free == 0 {
            overflow.push(*candidate);
            continue;
        }

        let next = queue.get(i + 1);
        let within_threshold = match (threshold, next) {
            (Some(t), Some(next)) => candidate.score - next.score <= t,
            _ => false,
        };

        if let (true, Some(next)) = (within_threshold, next) {
            cluster.push(candidate.id);
            cluster.push(next.id);
            continue;
        }

        if cluster.is_empty() {
            allocation.decisions.push((candidate.id, tier));
            free -= 1;
            continue;
        }

        let members = cluster.take();
        if free >= members.len() {
            free -= members.len();
            allocation.decisions.extend(members.into_iter().map(|id| (id, tier)));
        } else {
            allocation.deferred.push(DeferredCluster { tier, members });
            free = 0;
        }
    }

    overflow
}

/// Uncertainty cluster under construction: ids in rank order, no repeats.
struct ClusterBuilder<Id> {
    members: Vec<Id>,
    seen: HashSet<Id>,
}

impl<Id> Default for ClusterBuilder<Id> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<Id: Copy + Eq + Hash> ClusterBuilder<Id> {
    fn push(&mut self, id: Id) {
        if self.seen.insert(id) {
            self.members.push(id);
        }
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn take(&mut self) -> Vec<Id> {
        self.seen.clear();
        std::mem::take(&mut self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: u32, score: f64) -> Candidate<u32> {
        Candidate { id, score }
    }

    fn cap(icu: usize, ward: usize) -> FreeCapacity {
        FreeCapacity { icu, ward }
    }

    #[test]
    fn test_all_fit() {
        let out = allocate(&[c(1, 3.0), c(2, 2.0), c(3, 1.0)], cap(1, 1), Some(0.5));
        assert_eq!(out.decision_for(1), Some(CareTier::Icu));
        assert_eq!(out.decision_for(2), Some(CareTier::Ward));
        assert_eq!(out.decision_for(3), Some(CareTier::Home));
        assert!(out.deferred.is_empty());
    }

    #[test]
    fn test_close_scores_for_last_bed_deferred() {
        let out = allocate(&[c(1, 2.9), c(2, 2.95)], cap(1, 0), Some(0.5));
        assert_eq!(out.deferred.len(), 1);
        assert_eq!(out.deferred[0].tier, CareTier::Icu);
        assert_eq!(out.deferred[0].members, vec![2, 1]);
        assert!(out.decisions.is_empty());
        assert_eq!(out.granted(CareTier::Icu), 0);
    }

    #[test]
    fn test_deferral_closes_tier_for_rest_of_tick() {
        let out = allocate(&[c(1, 3.4), c(2, 3.3), c(3, 3.2), c(4, 3.0)], cap(2, 1), Some(0.5));
        assert_eq!(out.deferred.len(), 1);
        assert_eq!(out.deferred[0].members, vec![1, 2, 3, 4]);

        // 4 trails the cluster by more than the threshold: after the
        // cluster is deferred no ICU bed is left, so it falls to the ward.
        let out = allocate(&[c(1, 3.9), c(2, 3.8), c(3, 3.7), c(4, 2.6)], cap(2, 1), Some(0.3));
        assert_eq!(out.deferred[0].members, vec![1, 2, 3]);
        assert_eq!(out.decision_for(4), Some(CareTier::Ward));
    }

    #[test]
    fn test_cluster_is_transitive() {
        // endpoints differ by 0.8 but each neighbour gap is 0.4
        let out = allocate(&[c(1, 3.9), c(2, 3.5), c(3, 3.1), c(4, 1.0)], cap(2, 0), Some(0.5));
        assert_eq!(out.deferred.len(), 1);
        assert_eq!(out.deferred[0].members, vec![1, 2, 3]);
        assert_eq!(out.decision_for(4), Some(CareTier::Home));
    }

    #[test]
    fn test_gap_above_threshold_never_clusters() {
        let out = allocate(&[c(1, 3.9), c(2, 3.2), c(3, 2.6)], cap(1, 0), Some(0.5));
        assert!(out.deferred.is_empty());
        assert_eq!(out.decision_for(1), Some(CareTier::Icu));
        assert_eq!(out.decision_for(2), Some(CareTier::Home));
        assert_eq!(out.decision_for(3), Some(CareTier::Home));
    }

    #[test]
    fn test_cluster_that_fits_is_granted() {
        let out = allocate(&[c(1, 3.9), c(2, 3.8), c(3, 3.1)], cap(2, 1), Some(0.5));
        assert!(out.deferred.is_empty());
        assert_eq!(out.decision_for(1), Some(CareTier::Icu));
        assert_eq!(out.decision_for(2), Some(CareTier::Icu));
        assert_eq!(out.decision_for(3), Some(CareTier::Ward));
    }

    #[test]
    fn test_icu_overflow_goes_ahead_of_ward_queue() {
        let out = allocate(&[c(1, 3.9), c(2, 3.0), c(3, 2.0)], cap(1, 1), None);
        assert_eq!(out.decision_for(1), Some(CareTier::Icu));
        assert_eq!(out.decision_for(2), Some(CareTier::Ward));
        assert_eq!(out.decision_for(3), Some(CareTier::Home));
    }

    #[test]
    fn test_no_free_beds_falls_back() {
        let out = allocate(&[c(1, 3.0), c(2, 2.0)], cap(0, 1), Some(0.5));
        assert_eq!(out.decision_for(1), Some(CareTier::Ward));
        assert_eq!(out.decision_for(2), Some(CareTier::Home));

        let out = allocate(&[c(1, 3.0), c(2, 2.0)], cap(0, 0), Some(0.5));
        assert_eq!(out.decision_for(1), Some(CareTier::Home));
        assert_eq!(out.decision_for(2), Some(CareTier::Home));
    }

    #[test]
    fn test_greedy_never_defers() {
        let out = allocate(&[c(1, 2.9), c(2, 2.95), c(3, 2.9)], cap(1, 1), None);
        assert!(out.deferred.is_empty());
        assert_eq!(out.decision_for(2), Some(CareTier::Icu));
        assert_eq!(out.decision_for(1), Some(CareTier::Ward));
        assert_eq!(out.decision_for(3), Some(CareTier::Home));
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let out = allocate(&[c(7, 3.0), c(3, 3.0), c(5, 3.0)], cap(1, 1), None);
        assert_eq!(out.decision_for(7), Some(CareTier::Icu));
        assert_eq!(out.decision_for(3), Some(CareTier::Ward));
        assert_eq!(out.decision_for(5), Some(CareTier::Home));
    }

    #[test]
    fn test_never_oversubscribed() {
        let scores = [3.9, 3.85, 3.4, 3.0, 2.9, 2.7, 2.2, 2.1, 1.9, 1.2];
        let candidates: Vec<_> = scores.iter().enumerate().map(|(i, s)| c(i as u32, *s)).collect();
        for threshold in [None, Some(0.05), Some(0.2), Some(0.5), Some(2.0)] {
            for icu in 0..4 {
                for ward in 0..4 {
                    let out = allocate(&candidates, cap(icu, ward), threshold);
                    assert!(out.granted(CareTier::Icu) <= icu);
                    assert!(out.granted(CareTier::Ward) <= ward);
                    let deferred: usize = out.deferred.iter().map(|d| d.members.len()).sum();
                    assert_eq!(out.decisions.len() + deferred, candidates.len());
                }
            }
        }
    }
}
