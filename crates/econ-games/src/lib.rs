//! Econ Games: behavioral-economics games as plain data and payoff arithmetic.
//!
//! This crate defines the closed set of games studied by the harness
//! (dictator, ultimatum, prisoner's dilemma, public goods, trust, volunteer's
//! dilemma). Each game exposes its roster, per-player action spaces, rules
//! text, a fallback action, and a payoff function that is total over the
//! declared action space. It knows nothing about language models.

pub mod action;
pub mod baseline;
pub mod config;
pub mod error;
pub mod game;

pub use action::{Action, ActionSpace, Choice};
pub use baseline::{monte_carlo, BaselineResult};
pub use config::GameConfig;
pub use error::GameError;
pub use game::{GameKind, GameSpec};
