//! Clinical and demographic attributes of a patient, and the care tiers.
//!
//! Labels deserialize from the vocabulary used in the patient roster data
//! (`"Zeer hoog"`, `"Gemiddeld"`, ...), so scenario files can be fed in
//! unchanged.

use serde::{Deserialize, Serialize};

/// Severity of a patient's symptoms.
///
/// Seven labels exist in the admission data. The sickness model only ever
/// produces the five `VeryLow..=VeryHigh` buckets; `VeryMild` and `Mild`
/// appear only on freshly admitted patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symptoms {
    #[serde(rename = "Zeer mild")]
    VeryMild,
    #[serde(rename = "Mild")]
    Mild,
    #[serde(rename = "Zeer laag")]
    VeryLow,
    #[serde(rename = "Laag")]
    Low,
    #[serde(rename = "Gemiddeld")]
    Medium,
    #[serde(rename = "Hoog")]
    High,
    #[serde(rename = "Zeer hoog")]
    VeryHigh,
}

impl Symptoms {
    /// Severity ordinal on the 1..=9 scale used to derive initial health.
    pub fn severity_ordinal(self) -> u8 {
        match self {
            Symptoms::VeryMild | Symptoms::VeryLow => 1,
            Symptoms::Mild | Symptoms::Low => 3,
            Symptoms::Medium => 5,
            Symptoms::High => 7,
            Symptoms::VeryHigh => 9,
        }
    }

    /// The label as it appears in roster data.
    pub fn label(self) -> &'static str {
        match self {
            Symptoms::VeryMild => "Zeer mild",
            Symptoms::Mild => "Mild",
            Symptoms::VeryLow => "Zeer laag",
            Symptoms::Low => "Laag",
            Symptoms::Medium => "Gemiddeld",
            Symptoms::High => "Hoog",
            Symptoms::VeryHigh => "Zeer hoog",
        }
    }
}

/// Physical fitness of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Fitness {
    #[serde(rename = "Zeer laag")]
    VeryLow,
    #[serde(rename = "Laag")]
    Low,
    #[serde(rename = "Gemiddeld")]
    Medium,
    #[serde(rename = "Hoog")]
    High,
    #[serde(rename = "Zeer hoog")]
    VeryHigh,
}

impl Fitness {
    pub fn label(self) -> &'static str {
        match self {
            Fitness::VeryLow => "Zeer laag",
            Fitness::Low => "Laag",
            Fitness::Medium => "Gemiddeld",
            Fitness::High => "Hoog",
            Fitness::VeryHigh => "Zeer hoog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "man", alias = "Man", alias = "MAN")]
    Male,
    #[serde(rename = "vrouw", alias = "Vrouw", alias = "VROUW")]
    Female,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "man",
            Gender::Female => "woman",
        }
    }
}

/// Job titles that count as working in healthcare.
pub const HEALTHCARE_PROFESSIONS: [&str; 4] = ["Medisch specialist", "Apotheker", "Tandarts", "Arts"];

/// Free-form profession label from the roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profession(pub String);

impl Profession {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn is_healthcare(&self) -> bool {
        HEALTHCARE_PROFESSIONS.contains(&self.0.as_str())
    }
}

/// Free-form home situation label from the roster (e.g. "Getrouwd, 2 kinderen").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeSituation(pub String);

impl HomeSituation {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Whether the household includes children. Matches "kind"/"kinderen".
    pub fn has_children(&self) -> bool {
        self.0.to_lowercase().contains("kind")
    }
}

/// Level of care a patient can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CareTier {
    /// Sent home. Unlimited capacity.
    #[serde(rename = "home")]
    Home,
    /// Intake chairs where patients wait for a decision.
    #[serde(rename = "waiting-room")]
    WaitingRoom,
    #[serde(rename = "ward")]
    Ward,
    /// Intensive care, the most acute tier.
    #[serde(rename = "ICU")]
    Icu,
}

impl CareTier {
    /// Tiers a triage decision can select, most acute first.
    pub const DECISIONS: [CareTier; 3] = [CareTier::Icu, CareTier::Ward, CareTier::Home];

    /// Whether beds of this tier are finite.
    pub fn is_limited(self) -> bool {
        !matches!(self, CareTier::Home)
    }

    /// One step less acute, used when a tier is full.
    pub fn fallback(self) -> CareTier {
        match self {
            CareTier::Icu => CareTier::Ward,
            _ => CareTier::Home,
        }
    }

    /// Tier required by a triage score: nearest integer, ties to even.
    pub fn from_score(score: f64) -> CareTier {
        let rounded = score.round_ties_even();
        if rounded >= 3.0 {
            CareTier::Icu
        } else if rounded >= 2.0 {
            CareTier::Ward
        } else {
            CareTier::Home
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CareTier::Home => "home",
            CareTier::WaitingRoom => "waiting-room",
            CareTier::Ward => "ward",
            CareTier::Icu => "ICU",
        }
    }
}

impl std::fmt::Display for CareTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static roster entry describing one admitted patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub name: String,
    pub gender: Gender,
    pub age: u32,
    pub profession: Profession,
    pub fitness: Fitness,
    pub symptoms: Symptoms,
    pub home_situation: HomeSituation,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordinals() {
        assert_eq!(Symptoms::VeryLow.severity_ordinal(), 1);
        assert_eq!(Symptoms::VeryMild.severity_ordinal(), 1);
        assert_eq!(Symptoms::Mild.severity_ordinal(), 3);
        assert_eq!(Symptoms::Medium.severity_ordinal(), 5);
        assert_eq!(Symptoms::High.severity_ordinal(), 7);
        assert_eq!(Symptoms::VeryHigh.severity_ordinal(), 9);
    }

    #[test]
    fn test_tier_from_score_rounds_to_nearest() {
        assert_eq!(CareTier::from_score(3.0), CareTier::Icu);
        assert_eq!(CareTier::from_score(2.9), CareTier::Icu);
        assert_eq!(CareTier::from_score(2.95), CareTier::Icu);
        assert_eq!(CareTier::from_score(2.4), CareTier::Ward);
        assert_eq!(CareTier::from_score(1.6), CareTier::Ward);
        assert_eq!(CareTier::from_score(1.2), CareTier::Home);
        assert_eq!(CareTier::from_score(0.0), CareTier::Home);
    }

    #[test]
    fn test_tier_from_score_ties_to_even() {
        assert_eq!(CareTier::from_score(2.5), CareTier::Ward);
        assert_eq!(CareTier::from_score(3.5), CareTier::Icu);
        assert_eq!(CareTier::from_score(1.5), CareTier::Ward);
        assert_eq!(CareTier::from_score(0.5), CareTier::Home);
    }

    #[test]
    fn test_fallback_chain() {
        assert_eq!(CareTier::Icu.fallback(), CareTier::Ward);
        assert_eq!(CareTier::Ward.fallback(), CareTier::Home);
        assert_eq!(CareTier::Home.fallback(), CareTier::Home);
        assert!(!CareTier::Home.is_limited());
        assert!(CareTier::Icu.is_limited());
    }

    #[test]
    fn test_predicates() {
        assert!(Profession::new("Arts").is_healthcare());
        assert!(!Profession::new("Leraar").is_healthcare());
        assert!(HomeSituation::new("Getrouwd, 2 kinderen").has_children());
        assert!(HomeSituation::new("Alleenstaand met kind").has_children());
        assert!(!HomeSituation::new("Alleenstaand").has_children());
    }

    #[test]
    fn test_gender_accepts_capitalized_labels() {
        let g: Gender = serde_json::from_str("\"Vrouw\"").unwrap();
        assert_eq!(g, Gender::Female);
        let g: Gender = serde_json::from_str("\"man\"").unwrap();
        assert_eq!(g, Gender::Male);
    }
}
