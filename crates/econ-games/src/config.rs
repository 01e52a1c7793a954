//! Configuration types for the games.

use serde::{Deserialize, Serialize};

/// Top-level game configuration.
///
/// Holds the parameters of every game so a single file can tune a whole
/// study. Loaded from JSON at runtime; missing sections keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Dictator game parameters
    pub dictator: DictatorConfig,

    /// Ultimatum game parameters
    pub ultimatum: UltimatumConfig,

    /// Prisoner's dilemma payoff matrix
    pub prisoner: PrisonerConfig,

    /// Public goods game parameters
    pub public_good: PublicGoodConfig,

    /// Trust game parameters
    pub trust: TrustConfig,

    /// Volunteer's dilemma parameters
    pub volunteer: VolunteerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictatorConfig {
    /// Amount the dictator splits
    pub endowment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltimatumConfig {
    /// Amount the proposer splits
    pub endowment: f64,
}

/// Payoff matrix for the prisoner's dilemma.
///
/// Standard labels: R (reward, both cooperate), S (sucker), T (temptation),
/// P (punishment, both defect). A dilemma requires T > R > P > S.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrisonerConfig {
    pub reward: f64,
    pub sucker: f64,
    pub temptation: f64,
    pub punishment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicGoodConfig {
    /// Number of players sharing the pool
    pub players: usize,

    /// Each player's endowment
    pub endowment: f64,

    /// Factor applied to the pooled contributions before the equal split
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Investor's endowment
    pub endowment: f64,

    /// Factor applied to the amount sent before the trustee receives it
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolunteerConfig {
    /// Number of players in the group
    pub players: usize,

    /// Cost paid by each volunteer
    pub cost: f64,

    /// Benefit received by everyone if at least one player volunteers
    pub benefit: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            dictator: DictatorConfig::default(),
            ultimatum: UltimatumConfig::default(),
            prisoner: PrisonerConfig::default(),
            public_good: PublicGoodConfig::default(),
            trust: TrustConfig::default(),
            volunteer: VolunteerConfig::default(),
        }
    }
}

impl Default for DictatorConfig {
    fn default() -> Self {
        Self { endowment: 100.0 }
    }
}

impl Default for UltimatumConfig {
    fn default() -> Self {
        Self { endowment: 100.0 }
    }
}

impl Default for PrisonerConfig {
    fn default() -> Self {
        Self {
            reward: 3.0,
            sucker: 0.0,
            temptation: 5.0,
            punishment: 1.0,
        }
    }
}

impl Default for PublicGoodConfig {
    fn default() -> Self {
        Self {
            players: 4,
            endowment: 100.0,
            multiplier: 1.5,
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            endowment: 100.0,
            multiplier: 3.0,
        }
    }
}

impl Default for VolunteerConfig {
    fn default() -> Self {
        Self {
            players: 3,
            cost: 20.0,
            benefit: 100.0,
        }
    }
}
