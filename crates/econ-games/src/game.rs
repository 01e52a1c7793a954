//! Game definitions: a closed set of games dispatched by name.
//!
//! Each game carries its own roster, action spaces, payoff function, and
//! rules text. A [`GameSpec`] is immutable once built; every round of a
//! simulation reads from the same spec.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionSpace, Choice};
use crate::config::GameConfig;
use crate::error::GameError;

/// The games available for study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// One player splits an endowment with a passive recipient
    Dictator,
    /// Proposer offers a split, responder accepts or rejects
    Ultimatum,
    /// Two-player cooperate/defect dilemma
    Prisoner,
    /// N-player contribution game with a multiplied shared pool
    PublicGood,
    /// Investor sends money, trustee decides how much to return
    Trust,
    /// Group benefits if at least one player pays to volunteer
    Volunteer,
}

impl GameKind {
    /// Get all games.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Dictator,
            Self::Ultimatum,
            Self::Prisoner,
            Self::PublicGood,
            Self::Trust,
            Self::Volunteer,
        ]
    }

    /// Canonical key used on the command line and in file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dictator => "dictator",
            Self::Ultimatum => "ultimatum",
            Self::Prisoner => "prisoner",
            Self::PublicGood => "public_good",
            Self::Trust => "trust",
            Self::Volunteer => "volunteer",
        }
    }

    /// Human-readable title.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dictator => "Dictator Game",
            Self::Ultimatum => "Ultimatum Game",
            Self::Prisoner => "Prisoner's Dilemma",
            Self::PublicGood => "Public Goods Game",
            Self::Trust => "Trust Game",
            Self::Volunteer => "Volunteer's Dilemma",
        }
    }

    fn valid_names() -> String {
        Self::all()
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GameKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "dictator" => Ok(Self::Dictator),
            "ultimatum" => Ok(Self::Ultimatum),
            "prisoner" | "prisoners_dilemma" | "pd" => Ok(Self::Prisoner),
            "public_good" | "public_goods" | "pgg" => Ok(Self::PublicGood),
            "trust" => Ok(Self::Trust),
            "volunteer" | "volunteers_dilemma" => Ok(Self::Volunteer),
            _ => Err(GameError::InvalidGameName {
                name: s.to_string(),
                valid: Self::valid_names(),
            }),
        }
    }
}

/// An immutable, fully parameterized game.
///
/// Deserialization goes through [`GameSpec::new`], so a loaded spec is as
/// valid as a constructed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSpec")]
pub struct GameSpec {
    kind: GameKind,
    config: GameConfig,
}

/// Serialized form of a [`GameSpec`] before validation.
#[derive(Deserialize)]
struct UncheckedSpec {
    kind: GameKind,
    config: GameConfig,
}

impl TryFrom<UncheckedSpec> for GameSpec {
    type Error = GameError;

    fn try_from(raw: UncheckedSpec) -> Result<Self, Self::Error> {
        Self::new(raw.kind, raw.config)
    }
}

impl GameSpec {
    /// Build a game from its kind and parameters.
    ///
    /// Rejects parameters that cannot produce a playable game
    /// (non-positive endowments, fewer than two players, negative multipliers).
    pub fn new(kind: GameKind, config: GameConfig) -> Result<Self, GameError> {
        let spec = Self { kind, config };
        spec.validate()?;
        Ok(spec)
    }

    /// Build a game with the default parameters.
    pub fn with_defaults(kind: GameKind) -> Self {
        Self {
            kind,
            config: GameConfig::default(),
        }
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    fn validate(&self) -> Result<(), GameError> {
        let c = &self.config;
        let invalid = |message: String| Err(GameError::InvalidConfig { message });

        let endowment = match self.kind {
            GameKind::Dictator => c.dictator.endowment,
            GameKind::Ultimatum => c.ultimatum.endowment,
            GameKind::PublicGood => c.public_good.endowment,
            GameKind::Trust => c.trust.endowment,
            GameKind::Prisoner | GameKind::Volunteer => 1.0,
        };
        if !endowment.is_finite() || endowment <= 0.0 {
            return invalid(format!(
                "{} endowment must be positive, got {}",
                self.kind, endowment
            ));
        }

        match self.kind {
            GameKind::PublicGood => {
                if c.public_good.players < 2 {
                    return invalid("public_good needs at least 2 players".to_string());
                }
                if !c.public_good.multiplier.is_finite() || c.public_good.multiplier < 0.0 {
                    return invalid("public_good multiplier must be non-negative".to_string());
                }
            }
            GameKind::Trust => {
                if !c.trust.multiplier.is_finite() || c.trust.multiplier < 0.0 {
                    return invalid("trust multiplier must be non-negative".to_string());
                }
            }
            GameKind::Volunteer => {
                if c.volunteer.players < 2 {
                    return invalid("volunteer needs at least 2 players".to_string());
                }
                if !c.volunteer.cost.is_finite() || !c.volunteer.benefit.is_finite() {
                    return invalid("volunteer cost and benefit must be finite".to_string());
                }
            }
            GameKind::Prisoner => {
                let pm = &c.prisoner;
                if ![pm.reward, pm.sucker, pm.temptation, pm.punishment]
                    .iter()
                    .all(|v| v.is_finite())
                {
                    return invalid("prisoner payoffs must be finite".to_string());
                }
            }
            GameKind::Dictator | GameKind::Ultimatum => {}
        }
        Ok(())
    }

    /// Total number of players, including passive ones.
    pub fn num_players(&self) -> usize {
        match self.kind {
            GameKind::PublicGood => self.config.public_good.players,
            GameKind::Volunteer => self.config.volunteer.players,
            _ => 2,
        }
    }

    /// Role label for each player, in player order.
    pub fn roles(&self) -> Vec<String> {
        match self.kind {
            GameKind::Dictator => vec!["Dictator".to_string(), "Recipient".to_string()],
            GameKind::Ultimatum => vec!["Proposer".to_string(), "Responder".to_string()],
            GameKind::Trust => vec!["Investor".to_string(), "Trustee".to_string()],
            GameKind::Prisoner | GameKind::PublicGood | GameKind::Volunteer => (1..=self
                .num_players())
                .map(|i| format!("Player {}", i))
                .collect(),
        }
    }

    /// Role label for one player.
    pub fn role(&self, player: usize) -> Result<String, GameError> {
        self.check_player(player)?;
        Ok(self.roles().swap_remove(player))
    }

    /// Players who submit an action each round, in the order payoffs expect.
    ///
    /// The dictator's recipient is passive; every other player decides.
    pub fn deciding_players(&self) -> Vec<usize> {
        match self.kind {
            GameKind::Dictator => vec![0],
            _ => (0..self.num_players()).collect(),
        }
    }

    /// Legal actions for a deciding player.
    pub fn action_space(&self, player: usize) -> Result<ActionSpace, GameError> {
        self.check_deciding(player)?;
        let c = &self.config;
        Ok(match self.kind {
            GameKind::Dictator => ActionSpace::Amount { max: c.dictator.endowment },
            GameKind::Ultimatum => ActionSpace::Amount { max: c.ultimatum.endowment },
            GameKind::Prisoner => ActionSpace::Binary,
            GameKind::PublicGood => ActionSpace::Amount { max: c.public_good.endowment },
            GameKind::Trust if player == 0 => ActionSpace::Amount { max: c.trust.endowment },
            GameKind::Trust => ActionSpace::Fraction,
            GameKind::Volunteer => ActionSpace::Boolean,
        })
    }

    /// Action substituted when a player's answer cannot be parsed.
    ///
    /// Always the least committal legal choice: give, offer, send, contribute,
    /// or return nothing; demand nothing; defect; do not volunteer.
    pub fn fallback_action(&self, player: usize) -> Result<Action, GameError> {
        Ok(match self.action_space(player)? {
            ActionSpace::Amount { .. } => Action::Amount(0.0),
            ActionSpace::Fraction => Action::Fraction(0.0),
            ActionSpace::Binary => Action::Choice(Choice::Defect),
            ActionSpace::Boolean => Action::Volunteer(false),
        })
    }

    /// Rules paragraph shown to a deciding player.
    pub fn rules(&self, player: usize) -> Result<String, GameError> {
        self.check_deciding(player)?;
        let c = &self.config;
        Ok(match self.kind {
            GameKind::Dictator => format!(
                "You have ${}. Decide how much to give to the other player, who has no say. \
                 You keep whatever you do not give.",
                c.dictator.endowment
            ),
            GameKind::Ultimatum if player == 0 => format!(
                "You have ${}. Propose how much to offer the other player. They can accept or \
                 reject. If they reject, both of you get 0.",
                c.ultimatum.endowment
            ),
            GameKind::Ultimatum => format!(
                "The proposer will offer you part of ${}. You accept any offer at or above your \
                 minimum and reject anything below it. If you reject, both of you get 0. \
                 State your minimum acceptable offer.",
                c.ultimatum.endowment
            ),
            GameKind::Prisoner => format!(
                "Choose: Cooperate (C) or Defect (D). Payoffs: both C = {r} each, both D = {p} \
                 each. If one defects, the defector gets {t} and the cooperator gets {s}.",
                r = c.prisoner.reward,
                p = c.prisoner.punishment,
                t = c.prisoner.temptation,
                s = c.prisoner.sucker,
            ),
            GameKind::PublicGood => format!(
                "You have ${e}. Decide how much to contribute to a public pool. Total \
                 contributions are multiplied by {m} and split equally among {n} players. You \
                 keep what you don't contribute plus your share.",
                e = c.public_good.endowment,
                m = c.public_good.multiplier,
                n = c.public_good.players,
            ),
            GameKind::Trust if player == 0 => format!(
                "You have ${e}. Decide how much to send to the trustee. It will be multiplied \
                 by {m}. The trustee then decides what fraction to return to you.",
                e = c.trust.endowment,
                m = c.trust.multiplier,
            ),
            GameKind::Trust => format!(
                "The investor will send you part of ${e}, which gets multiplied by {m}. Decide \
                 what fraction of the amount you receive to return to the investor.",
                e = c.trust.endowment,
                m = c.trust.multiplier,
            ),
            GameKind::Volunteer => format!(
                "There are {n} players. If at least one volunteers, everyone gets ${b}. \
                 Volunteers pay ${cost}. If no one volunteers, everyone gets 0.",
                n = c.volunteer.players,
                b = c.volunteer.benefit,
                cost = c.volunteer.cost,
            ),
        })
    }

    /// Compute one payoff per player from one action per deciding player.
    ///
    /// `actions` follows [`GameSpec::deciding_players`] order. Every action
    /// must be a member of its player's action space.
    pub fn payoffs(&self, actions: &[Action]) -> Result<Vec<f64>, GameError> {
        let deciding = self.deciding_players();
        if actions.len() != deciding.len() {
            return Err(GameError::ArityMismatch {
                expected: deciding.len(),
                actual: actions.len(),
            });
        }
        for (&player, action) in deciding.iter().zip(actions) {
            if !self.action_space(player)?.contains(action) {
                return Err(GameError::ActionOutOfSpace {
                    player,
                    action: *action,
                });
            }
        }

        let c = &self.config;
        let payoffs = match self.kind {
            GameKind::Dictator => {
                let given = actions[0].value();
                vec![c.dictator.endowment - given, given]
            }
            GameKind::Ultimatum => {
                let offer = actions[0].value();
                let threshold = actions[1].value();
                if offer >= threshold {
                    vec![c.ultimatum.endowment - offer, offer]
                } else {
                    vec![0.0, 0.0]
                }
            }
            GameKind::Prisoner => {
                let pm = &c.prisoner;
                let (a, b) = match (actions[0], actions[1]) {
                    (Action::Choice(a), Action::Choice(b)) => (a, b),
                    // unreachable after the membership check above
                    _ => (Choice::Defect, Choice::Defect),
                };
                let (p0, p1) = match (a, b) {
                    (Choice::Cooperate, Choice::Cooperate) => (pm.reward, pm.reward),
                    (Choice::Cooperate, Choice::Defect) => (pm.sucker, pm.temptation),
                    (Choice::Defect, Choice::Cooperate) => (pm.temptation, pm.sucker),
                    (Choice::Defect, Choice::Defect) => (pm.punishment, pm.punishment),
                };
                vec![p0, p1]
            }
            GameKind::PublicGood => {
                let pg = &c.public_good;
                let total: f64 = actions.iter().map(Action::value).sum();
                let share = total * pg.multiplier / pg.players as f64;
                actions
                    .iter()
                    .map(|a| pg.endowment - a.value() + share)
                    .collect()
            }
            GameKind::Trust => {
                let sent = actions[0].value();
                let received = sent * c.trust.multiplier;
                let returned = actions[1].value() * received;
                vec![c.trust.endowment - sent + returned, received - returned]
            }
            GameKind::Volunteer => {
                let v = &c.volunteer;
                let volunteers: Vec<bool> = actions.iter().map(|a| a.value() > 0.5).collect();
                if volunteers.iter().any(|&vol| vol) {
                    volunteers
                        .iter()
                        .map(|&vol| if vol { v.benefit - v.cost } else { v.benefit })
                        .collect()
                } else {
                    vec![0.0; v.players]
                }
            }
        };
        Ok(payoffs)
    }

    fn check_player(&self, player: usize) -> Result<(), GameError> {
        if player >= self.num_players() {
            return Err(GameError::PlayerOutOfRange {
                player,
                players: self.num_players(),
            });
        }
        Ok(())
    }

    fn check_deciding(&self, player: usize) -> Result<(), GameError> {
        self.check_player(player)?;
        if !self.deciding_players().contains(&player) {
            return Err(GameError::PlayerOutOfRange {
                player,
                players: self.deciding_players().len(),
            });
        }
        Ok(())
    }
}
