//! Error types for game operations.

use thiserror::Error;

use crate::action::Action;

/// Errors that can occur when defining or playing a game.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// The requested game name is not one of the known games.
    #[error("Unknown game: {name}. Valid: {valid}")]
    InvalidGameName { name: String, valid: String },

    /// Wrong number of actions for the game's deciding players.
    #[error("Expected {expected} actions, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// An action is not a member of the player's action space.
    #[error("Action {action} is not valid for player {player}")]
    ActionOutOfSpace { player: usize, action: Action },

    /// Player index past the end of the roster.
    #[error("Player {player} out of range for a {players}-player game")]
    PlayerOutOfRange { player: usize, players: usize },

    /// Game parameters that cannot produce a playable game.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}
