//! Operator-elicited priority rules.
//!
//! Before a run the operator answers four questions, one per demographic
//! axis. Each answer is an integer code: `1` and `2` pick a direction,
//! `3` means the axis has no effect. A missing answer behaves like `3`.

use serde::{Deserialize, Serialize};

/// Direction of the age rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AgePriority {
    /// Code 1.
    FavorHighAge,
    /// Code 2. The age table is written in this polarity.
    FavorLowAge,
    /// Code 3.
    NoEffect,
}

/// Direction of the gender rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GenderPriority {
    FavorWomen,
    FavorMen,
    NoEffect,
}

/// Direction of the profession rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProfessionPriority {
    FavorHealthcare,
    FavorOtherProfessions,
    NoEffect,
}

/// Direction of the home-situation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HomePriority {
    FavorWithChildren,
    FavorWithoutChildren,
    NoEffect,
}

macro_rules! rule_codes {
    ($ty:ident, $one:ident, $two:ident) => {
        impl TryFrom<u8> for $ty {
            type Error = String;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                match code {
                    1 => Ok($ty::$one),
                    2 => Ok($ty::$two),
                    3 => Ok($ty::NoEffect),
                    other => Err(format!(
                        "invalid {} code {}, expected 1, 2 or 3",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }

        impl From<$ty> for u8 {
            fn from(rule: $ty) -> u8 {
                match rule {
                    $ty::$one => 1,
                    $ty::$two => 2,
                    $ty::NoEffect => 3,
                }
            }
        }

        impl $ty {
            pub fn is_active(self) -> bool {
                self != $ty::NoEffect
            }
        }
    };
}

rule_codes!(AgePriority, FavorHighAge, FavorLowAge);
rule_codes!(GenderPriority, FavorWomen, FavorMen);
rule_codes!(ProfessionPriority, FavorHealthcare, FavorOtherProfessions);
rule_codes!(HomePriority, FavorWithChildren, FavorWithoutChildren);

/// The four elicited knobs. Fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElicitedRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<AgePriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<GenderPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profession: Option<ProfessionPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_situation: Option<HomePriority>,
}

impl ElicitedRules {
    /// No rules elicited: only symptoms and fitness count.
    pub fn none() -> Self {
        Self::default()
    }

    /// Number of rules that will contribute to a score.
    pub fn active_count(&self) -> usize {
        [
            self.age.is_some_and(AgePriority::is_active),
            self.gender.is_some_and(GenderPriority::is_active),
            self.profession.is_some_and(ProfessionPriority::is_active),
            self.home_situation.is_some_and(HomePriority::is_active),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }
}
