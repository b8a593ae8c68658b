//! Ability scores and the methods used to derive them.
//!
//! Scores are stored pre-racial-modifier. Racial bonuses and anything derived
//! from scores (modifiers on the sheet, AC, HP) are computed by the rules
//! backend and consumed as fetched stats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Standard array, in descending order.
pub const STANDARD_ARRAY: [u8; 6] = [15, 14, 13, 12, 10, 8];

/// Point-buy budget.
pub const POINT_BUY_BUDGET: u8 = 27;

/// Lowest score purchasable with point buy.
pub const POINT_BUY_MIN: u8 = 8;

/// Highest score purchasable with point buy.
pub const POINT_BUY_MAX: u8 = 15;

/// Bounds for manually entered scores.
pub const MANUAL_MIN: u8 = 1;
pub const MANUAL_MAX: u8 = 20;

/// The six abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Wisdom,
        Ability::Charisma,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::Strength => "strength",
            Ability::Dexterity => "dexterity",
            Ability::Constitution => "constitution",
            Ability::Intelligence => "intelligence",
            Ability::Wisdom => "wisdom",
            Ability::Charisma => "charisma",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ability {
    type Err = DomainError;

    /// Accepts full names and the three-letter abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strength" | "str" => Ok(Ability::Strength),
            "dexterity" | "dex" => Ok(Ability::Dexterity),
            "constitution" | "con" => Ok(Ability::Constitution),
            "intelligence" | "int" => Ok(Ability::Intelligence),
            "wisdom" | "wis" => Ok(Ability::Wisdom),
            "charisma" | "cha" => Ok(Ability::Charisma),
            other => Err(DomainError::parse(format!("Unknown ability: {}", other))),
        }
    }
}

/// How the six scores were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbilityScoreMethod {
    #[default]
    StandardArray,
    PointBuy,
    Manual,
}

impl AbilityScoreMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbilityScoreMethod::StandardArray => "standard_array",
            AbilityScoreMethod::PointBuy => "point_buy",
            AbilityScoreMethod::Manual => "manual",
        }
    }
}

impl fmt::Display for AbilityScoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbilityScoreMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "standard_array" => Ok(AbilityScoreMethod::StandardArray),
            "point_buy" => Ok(AbilityScoreMethod::PointBuy),
            "manual" => Ok(AbilityScoreMethod::Manual),
            other => Err(DomainError::parse(format!(
                "Unknown ability score method: {}",
                other
            ))),
        }
    }
}

/// The six base scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::uniform(10)
    }
}

impl AbilityScores {
    pub fn uniform(score: u8) -> Self {
        Self {
            strength: score,
            dexterity: score,
            constitution: score,
            intelligence: score,
            wisdom: score,
            charisma: score,
        }
    }

    /// Scores in `Ability::ALL` order.
    pub fn from_array(scores: [u8; 6]) -> Self {
        let [strength, dexterity, constitution, intelligence, wisdom, charisma] = scores;
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    pub fn to_array(&self) -> [u8; 6] {
        [
            self.strength,
            self.dexterity,
            self.constitution,
            self.intelligence,
            self.wisdom,
            self.charisma,
        ]
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, score: u8) {
        match ability {
            Ability::Strength => self.strength = score,
            Ability::Dexterity => self.dexterity = score,
            Ability::Constitution => self.constitution = score,
            Ability::Intelligence => self.intelligence = score,
            Ability::Wisdom => self.wisdom = score,
            Ability::Charisma => self.charisma = score,
        }
    }

    /// Modifier for one ability: floor((score - 10) / 2).
    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }

    /// Check the scores against the rules of `method`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first violated rule.
    pub fn validate(&self, method: AbilityScoreMethod) -> Result<(), DomainError> {
        match method {
            AbilityScoreMethod::StandardArray => {
                let mut assigned = self.to_array();
                assigned.sort_unstable_by(|a, b| b.cmp(a));
                if assigned != STANDARD_ARRAY {
                    return Err(DomainError::validation(
                        "Standard array scores must be 15, 14, 13, 12, 10 and 8, each used once",
                    ));
                }
                Ok(())
            }
            AbilityScoreMethod::PointBuy => {
                let spent = point_buy_total(self)?;
                if spent > POINT_BUY_BUDGET {
                    return Err(DomainError::validation(format!(
                        "Point buy spends {} points, budget is {}",
                        spent, POINT_BUY_BUDGET
                    )));
                }
                Ok(())
            }
            AbilityScoreMethod::Manual => {
                for ability in Ability::ALL {
                    let score = self.get(ability);
                    if !(MANUAL_MIN..=MANUAL_MAX).contains(&score) {
                        return Err(DomainError::validation(format!(
                            "{} must be between {} and {}, got {}",
                            ability, MANUAL_MIN, MANUAL_MAX, score
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

/// floor((score - 10) / 2)
pub fn ability_modifier(score: u8) -> i32 {
    (i32::from(score) - 10).div_euclid(2)
}

/// Cost of a single score under point buy.
pub fn point_buy_cost(score: u8) -> Option<u8> {
    match score {
        8 => Some(0),
        9 => Some(1),
        10 => Some(2),
        11 => Some(3),
        12 => Some(4),
        13 => Some(5),
        14 => Some(7),
        15 => Some(9),
        _ => None,
    }
}

/// Total points spent by `scores`, or a validation error if any score is
/// outside the purchasable range.
pub fn point_buy_total(scores: &AbilityScores) -> Result<u8, DomainError> {
    let mut total = 0u8;
    for ability in Ability::ALL {
        let score = scores.get(ability);
        let cost = point_buy_cost(score).ok_or_else(|| {
            DomainError::validation(format!(
                "{} must be between {} and {} for point buy, got {}",
                ability, POINT_BUY_MIN, POINT_BUY_MAX, score
            ))
        })?;
        total += cost;
    }
    Ok(total)
}
