//! Actions and action spaces: what a player may legally choose.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cooperate or defect, for binary social dilemmas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Cooperate,
    Defect,
}

impl Choice {
    /// Single-letter code used in payoff matrices and CSV output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cooperate => "C",
            Self::Defect => "D",
        }
    }
}

/// A single player's decision in one round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Action {
    /// Absolute amount of money (given, offered, sent, contributed, or demanded)
    Amount(f64),
    /// Share of some quantity in [0, 1]
    Fraction(f64),
    /// Cooperate/defect choice
    Choice(Choice),
    /// Whether the player volunteers
    Volunteer(bool),
}

impl Action {
    /// Numeric view of the action for aggregate statistics.
    ///
    /// Cooperation and volunteering map to 1.0, their opposites to 0.0,
    /// so the mean of a series is the cooperation/volunteer rate.
    pub fn value(&self) -> f64 {
        match self {
            Self::Amount(v) | Self::Fraction(v) => *v,
            Self::Choice(Choice::Cooperate) | Self::Volunteer(true) => 1.0,
            Self::Choice(Choice::Defect) | Self::Volunteer(false) => 0.0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(v) | Self::Fraction(v) => write!(f, "{}", v),
            Self::Choice(c) => write!(f, "{}", c.code()),
            Self::Volunteer(v) => write!(f, "{}", v),
        }
    }
}

/// The set of legal actions for one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpace {
    /// Any amount in the closed interval [0, max]
    Amount { max: f64 },
    /// Any share in the closed interval [0, 1]
    Fraction,
    /// Cooperate or defect
    Binary,
    /// Volunteer or not
    Boolean,
}

impl ActionSpace {
    /// Whether `action` is a legal member of this space.
    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (Self::Amount { max }, Action::Amount(v)) => v.is_finite() && *v >= 0.0 && v <= max,
            (Self::Fraction, Action::Fraction(v)) => v.is_finite() && (0.0..=1.0).contains(v),
            (Self::Binary, Action::Choice(_)) => true,
            (Self::Boolean, Action::Volunteer(_)) => true,
            _ => false,
        }
    }

    /// Whether actions in this space are continuous amounts or shares.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Amount { .. } | Self::Fraction)
    }

    /// Human-readable description of the legal choices.
    pub fn describe(&self) -> String {
        match self {
            Self::Amount { max } => format!("a number between 0 and {}", max),
            Self::Fraction => "a fraction between 0 and 1".to_string(),
            Self::Binary => "C (cooperate) or D (defect)".to_string(),
            Self::Boolean => "true (volunteer) or false (do not volunteer)".to_string(),
        }
    }

    /// JSON shape the model is asked to answer with.
    pub fn answer_format(&self) -> &'static str {
        match self {
            Self::Amount { .. } | Self::Fraction => r#"{"value": <number>}"#,
            Self::Binary => r#"{"choice": "C" or "D"}"#,
            Self::Boolean => r#"{"decision": true or false}"#,
        }
    }

    /// Draw a uniformly random legal action.
    pub fn sample(&self, rng: &mut impl Rng) -> Action {
        match self {
            Self::Amount { max } => Action::Amount(rng.random_range(0.0..=*max)),
            Self::Fraction => Action::Fraction(rng.random_range(0.0..=1.0)),
            Self::Binary => Action::Choice(if rng.random_bool(0.5) {
                Choice::Cooperate
            } else {
                Choice::Defect
            }),
            Self::Boolean => Action::Volunteer(rng.random_bool(0.5)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_bounds() {
        let space = ActionSpace::Amount { max: 10.0 };
        assert!(space.contains(&Action::Amount(0.0)));
        assert!(space.contains(&Action::Amount(10.0)));
        assert!(!space.contains(&Action::Amount(10.5)));
        assert!(!space.contains(&Action::Amount(-1.0)));
        assert!(!space.contains(&Action::Amount(f64::NAN)));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        assert!(!ActionSpace::Fraction.contains(&Action::Amount(0.5)));
        assert!(!ActionSpace::Binary.contains(&Action::Volunteer(true)));
        assert!(!ActionSpace::Boolean.contains(&Action::Choice(Choice::Defect)));
    }

    #[test]
    fn test_sample_stays_in_space() {
        let mut rng = rand::rng();
        let spaces = [
            ActionSpace::Amount { max: 100.0 },
            ActionSpace::Fraction,
            ActionSpace::Binary,
            ActionSpace::Boolean,
        ];
        for space in spaces {
            for _ in 0..50 {
                assert!(space.contains(&space.sample(&mut rng)));
            }
        }
    }

    #[test]
    fn test_display_matches_csv_cells() {
        assert_eq!(Action::Amount(40.0).to_string(), "40");
        assert_eq!(Action::Fraction(0.3).to_string(), "0.3");
        assert_eq!(Action::Choice(Choice::Cooperate).to_string(), "C");
        assert_eq!(Action::Volunteer(false).to_string(), "false");
    }

    #[test]
    fn test_action_serde_shape() {
        let json = serde_json::to_string(&Action::Choice(Choice::Defect)).unwrap();
        assert_eq!(json, r#"{"kind":"choice","value":"defect"}"#);
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Action::Choice(Choice::Defect));
    }
}
