//! Triage scoring algorithm.
//!
//! A triage score lies roughly in `[0, 4]`. Its nearest integer selects the
//! care a patient needs (1 home, 2 ward, 3 ICU); the remainder ranks patients
//! needing the same care. The score is the symptom base plus a priority
//! modifier in `[-1, 1]`:
//!
//! 1. Base from symptom severity: 1, 2 or 3.
//! 2. Fitness always applies, contributing `[-1, 1]`. The normalizer starts
//!    at fitness's own maximum (1).
//! 3. Each active elicited rule contributes `{-1, 0, +1}` (age also `±0.5`)
//!    and raises the normalizer by 1.
//! 4. The summed modifier and each non-symptom influence are divided by the
//!    normalizer and rounded to two decimals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attributes::{Fitness, Gender, HomeSituation, Profession, Symptoms};
use crate::elicitation::{AgePriority, ElicitedRules, GenderPriority, HomePriority, ProfessionPriority};

/// A factor that can move a triage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Symptoms,
    Fitness,
    Age,
    Gender,
    HomeSituation,
    Profession,
}

/// Signed contribution of one rule and why it applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Influence {
    pub influence: f64,
    pub reason: String,
}

/// Rule contributions for one patient, keyed by rule.
pub type Influences = BTreeMap<Rule, Influence>;

/// Output of scoring one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageScore {
    pub score: f64,
    pub influences: Influences,
}

impl TriageScore {
    /// Sum of the normalized non-symptom influences.
    pub fn priority_modifier(&self) -> f64 {
        self.influences
            .iter()
            .filter(|(rule, _)| **rule != Rule::Symptoms)
            .map(|(_, infl)| infl.influence)
            .sum()
    }
}

/// Patient attributes the score depends on.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub symptoms: Symptoms,
    pub fitness: Fitness,
    pub age: u32,
    pub profession: &'a Profession,
    pub gender: Gender,
    pub home_situation: &'a HomeSituation,
}

/// Symptom severity to base score.
pub fn symptom_base(symptoms: Symptoms) -> f64 {
    match symptoms {
        Symptoms::VeryMild | Symptoms::Mild | Symptoms::VeryLow | Symptoms::Low => 1.0,
        Symptoms::Medium => 2.0,
        Symptoms::High | Symptoms::VeryHigh => 3.0,
    }
}

/// Fitness to priority modifier.
pub fn fitness_modifier(fitness: Fitness) -> f64 {
    match fitness {
        Fitness::VeryLow => -1.0,
        Fitness::Low => -0.5,
        Fitness::Medium => 0.0,
        Fitness::High => 0.5,
        Fitness::VeryHigh => 1.0,
    }
}

/// Largest magnitude the fitness modifier can take.
const FITNESS_MODIFIER_MAX: f64 = 1.0;

/// Age bracket score in the favor-low-age polarity, with its description.
fn age_bracket(age: u32) -> (f64, &'static str) {
    match age {
        0..=20 => (1.0, "This patient is young."),
        21..=40 => (0.5, "This patient is fairly young."),
        41..=60 => (0.0, "This patient is middle-aged."),
        61..=80 => (-0.5, "This patient is fairly old."),
        _ => (-1.0, "This patient is old."),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn signed(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        -1.0
    }
}

/// Scores patients under a fixed set of elicited rules.
#[derive(Debug, Clone, Default)]
pub struct TriageScorer {
    rules: ElicitedRules,
}

impl TriageScorer {
    pub fn new(rules: ElicitedRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ElicitedRules {
        &self.rules
    }

    /// Compute the score and influence map for one patient.
    ///
    /// Pure: identical inputs always give identical output.
    pub fn score(&self, input: &ScoreInput<'_>) -> TriageScore {
        let mut influences = Influences::new();

        let base = symptom_base(input.symptoms);
        let symptom_influence = if base <= 1.0 { -1.0 } else { (base - 1.0) / 2.0 };
        influences.insert(
            Rule::Symptoms,
            Influence {
                influence: symptom_influence,
                reason: format!(
                    "Patients with severe symptoms take precedence over patients with milder symptoms. \
                     This patient's symptom severity is {}.",
                    input.symptoms.label()
                ),
            },
        );

        let fitness = fitness_modifier(input.fitness);
        let mut priority_score = fitness;
        let mut normalizer = FITNESS_MODIFIER_MAX;
        influences.insert(
            Rule::Fitness,
            Influence {
                influence: fitness,
                reason: format!(
                    "Patients with high fitness take precedence over patients with low fitness. \
                     This patient's fitness is {}.",
                    input.fitness.label()
                ),
            },
        );

        if let Some(rule) = self.rules.age.filter(|r| r.is_active()) {
            let (raw, description) = age_bracket(input.age);
            let (value, preface) = match rule {
                AgePriority::FavorHighAge => (
                    -raw,
                    "Older patients take precedence over younger patients.",
                ),
                _ => (raw, "Younger patients take precedence over older patients."),
            };
            priority_score += value;
            normalizer += 1.0;
            influences.insert(
                Rule::Age,
                Influence {
                    influence: value,
                    reason: format!("{} {}", preface, description),
                },
            );
        }

        if let Some(rule) = self.rules.gender.filter(|r| r.is_active()) {
            let (value, preface) = match rule {
                GenderPriority::FavorWomen => (
                    signed(input.gender == Gender::Female),
                    "Women take precedence over men.",
                ),
                _ => (
                    signed(input.gender == Gender::Male),
                    "Men take precedence over women.",
                ),
            };
            priority_score += value;
            normalizer += 1.0;
            influences.insert(
                Rule::Gender,
                Influence {
                    influence: value,
                    reason: format!("{} The patient is a {}.", preface, input.gender.label()),
                },
            );
        }

        if let Some(rule) = self.rules.home_situation.filter(|r| r.is_active()) {
            let has_children = input.home_situation.has_children();
            let (value, preface) = match rule {
                HomePriority::FavorWithChildren => (
                    signed(has_children),
                    "Families with children take precedence over families without children.",
                ),
                _ => (
                    signed(!has_children),
                    "Families without children take precedence over families with children.",
                ),
            };
            priority_score += value;
            normalizer += 1.0;
            influences.insert(
                Rule::HomeSituation,
                Influence {
                    influence: value,
                    reason: format!(
                        "{} The patient has a family with {}children.",
                        preface,
                        if has_children { "" } else { "no " }
                    ),
                },
            );
        }

        if let Some(rule) = self.rules.profession.filter(|r| r.is_active()) {
            let healthcare = input.profession.is_healthcare();
            let (value, preface) = match rule {
                ProfessionPriority::FavorHealthcare => (
                    signed(healthcare),
                    "Healthcare workers take precedence over patients with other professions.",
                ),
                _ => (
                    signed(!healthcare),
                    "Patients with other professions take precedence over healthcare workers.",
                ),
            };
            priority_score += value;
            normalizer += 1.0;
            influences.insert(
                Rule::Profession,
                Influence {
                    influence: value,
                    reason: format!(
                        "{} The patient {} work in healthcare.",
                        preface,
                        if healthcare { "does" } else { "does not" }
                    ),
                },
            );
        }

        let modifier = round2(priority_score / normalizer);
        for (rule, infl) in influences.iter_mut() {
            if *rule != Rule::Symptoms {
                infl.influence = round2(infl.influence / normalizer);
            }
        }

        TriageScore {
            score: base + modifier,
            influences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        symptoms: Symptoms,
        fitness: Fitness,
        age: u32,
        profession: &'a Profession,
        gender: Gender,
        home: &'a HomeSituation,
    ) -> ScoreInput<'a> {
        ScoreInput {
            symptoms,
            fitness,
            age,
            profession,
            gender,
            home_situation: home,
        }
    }

    #[test]
    fn test_symptom_base_and_influence() {
        let p = Profession::new("Leraar");
        let h = HomeSituation::new("Alleenstaand");
        let scorer = TriageScorer::default();

        let low = scorer.score(&input(Symptoms::Low, Fitness::Medium, 50, &p, Gender::Male, &h));
        assert!((low.score - 1.0).abs() < 1e-9);
        assert!((low.influences[&Rule::Symptoms].influence + 1.0).abs() < 1e-9);

        let medium = scorer.score(&input(Symptoms::Medium, Fitness::Medium, 50, &p, Gender::Male, &h));
        assert!((medium.score - 2.0).abs() < 1e-9);
        assert!((medium.influences[&Rule::Symptoms].influence - 0.5).abs() < 1e-9);

        let high = scorer.score(&input(Symptoms::High, Fitness::Medium, 50, &p, Gender::Male, &h));
        assert!((high.influences[&Rule::Symptoms].influence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fitness_only() {
        let p = Profession::new("Leraar");
        let h = HomeSituation::new("Alleenstaand");
        let scorer = TriageScorer::default();
        let s = scorer.score(&input(Symptoms::Medium, Fitness::Low, 50, &p, Gender::Male, &h));
        assert!((s.score - 1.5).abs() < 1e-9);
        assert_eq!(s.influences.len(), 2);
    }

    #[test]
    fn test_age_high_flips_sign() {
        let p = Profession::new("Leraar");
        let h = HomeSituation::new("Alleenstaand");
        let scorer = TriageScorer::new(ElicitedRules {
            age: Some(AgePriority::FavorHighAge),
            ..ElicitedRules::none()
        });
        let s = scorer.score(&input(Symptoms::Medium, Fitness::Medium, 85, &p, Gender::Male, &h));
        // age -1 flipped to +1, normalizer 2
        assert!((s.influences[&Rule::Age].influence - 0.5).abs() < 1e-9);
        assert!((s.score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_effect_rules_skipped() {
        let p = Profession::new("Arts");
        let h = HomeSituation::new("Getrouwd, 1 kind");
        let scorer = TriageScorer::new(ElicitedRules {
            age: Some(AgePriority::NoEffect),
            gender: Some(GenderPriority::NoEffect),
            profession: Some(ProfessionPriority::NoEffect),
            home_situation: Some(HomePriority::NoEffect),
        });
        let s = scorer.score(&input(Symptoms::Medium, Fitness::VeryHigh, 10, &p, Gender::Female, &h));
        // only fitness applies, normalizer 1
        assert!((s.score - 3.0).abs() < 1e-9);
        assert_eq!(s.influences.len(), 2);
    }

    #[test]
    fn test_profession_rule_uses_own_setting() {
        let doctor = Profession::new("Arts");
        let leraar = Profession::new("Leraar");
        let h = HomeSituation::new("Alleenstaand");
        let scorer = TriageScorer::new(ElicitedRules {
            profession: Some(ProfessionPriority::FavorOtherProfessions),
            ..ElicitedRules::none()
        });
        let d = scorer.score(&input(Symptoms::Medium, Fitness::Medium, 50, &doctor, Gender::Male, &h));
        let t = scorer.score(&input(Symptoms::Medium, Fitness::Medium, 50, &leraar, Gender::Male, &h));
        assert!((d.influences[&Rule::Profession].influence + 0.5).abs() < 1e-9);
        assert!((t.influences[&Rule::Profession].influence - 0.5).abs() < 1e-9);
        assert!(!d.influences.contains_key(&Rule::HomeSituation));
    }

    #[test]
    fn test_all_rules_normalized() {
        let p = Profession::new("Arts");
        let h = HomeSituation::new("Getrouwd, 2 kinderen");
        let scorer = TriageScorer::new(ElicitedRules {
            age: Some(AgePriority::FavorLowAge),
            gender: Some(GenderPriority::FavorWomen),
            profession: Some(ProfessionPriority::FavorHealthcare),
            home_situation: Some(HomePriority::FavorWithChildren),
        });
        let s = scorer.score(&input(Symptoms::High, Fitness::VeryHigh, 18, &p, Gender::Female, &h));
        // every modifier at +1, normalizer 5
        assert!((s.score - 4.0).abs() < 1e-9);
        for rule in [Rule::Fitness, Rule::Age, Rule::Gender, Rule::Profession, Rule::HomeSituation] {
            assert!((s.influences[&rule].influence - 0.2).abs() < 1e-9);
        }
        assert!((s.priority_modifier() - 1.0).abs() < 1e-9);
    }
}
