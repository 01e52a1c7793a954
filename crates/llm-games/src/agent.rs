//! LLM agent: turns a prompt into a validated action.
//!
//! Sends the prompt to the inference backend, parses the reply against the
//! player's action space, and re-prompts with a clarification when the
//! reply is unusable. After the retry budget is spent the configured
//! [`FallbackPolicy`] decides between substituting a default action and
//! surfacing a parse failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use econ_games::{Action, ActionSpace, GameError, GameSpec};

use crate::inference::{GenerationRequest, InferenceBackend, InferenceError};
use crate::parse::parse_action;
use crate::prompt::{self, SYSTEM_PROMPT};
use crate::results::RoundResult;

/// What to do when no valid action is parsed after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Substitute the game's fallback action and mark the decision
    DefaultAction,
    /// Record the round as skipped, with no payoffs
    SkipRound,
}

impl FallbackPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DefaultAction => "default",
            Self::SkipRound => "skip",
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "default_action" | "fallback" => Ok(Self::DefaultAction),
            "skip" | "skip_round" => Ok(Self::SkipRound),
            _ => Err(format!("Unknown fallback policy: {}. Valid: default, skip", s)),
        }
    }
}

/// Errors from a single decision.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No valid action after every attempt, under [`FallbackPolicy::SkipRound`].
    #[error("No valid action after {attempts} attempts; last response: {last_response:?}")]
    ParseFailure {
        attempts: usize,
        last_response: String,
    },

    /// The inference backend failed; retrying will not help.
    #[error(transparent)]
    Backend(#[from] InferenceError),

    /// The player has no action space in this game.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model name passed to the backend
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Re-prompts after the first attempt
    pub max_retries: usize,
    /// Resolution when every attempt fails to parse
    pub fallback: FallbackPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "mistral".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            max_retries: 3,
            fallback: FallbackPolicy::DefaultAction,
        }
    }
}

/// A validated decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Always a member of the requested action space
    pub action: Action,
    /// Last raw response received
    pub raw_text: String,
    /// Generation attempts used
    pub attempts: usize,
    /// Whether `action` was substituted after parsing failed
    pub fallback: bool,
}

/// Agent wrapping an inference backend.
pub struct Agent<B> {
    backend: B,
    config: AgentConfig,
}

impl<B: InferenceBackend> Agent<B> {
    /// Create a new agent.
    pub fn new(backend: B, config: AgentConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Render the prompt for `player` and decide.
    pub async fn decide_for(
        &self,
        spec: &GameSpec,
        player: usize,
        history: &[RoundResult],
        window: usize,
    ) -> Result<Decision, AgentError> {
        let prompt = prompt::render(spec, player, history, window)?;
        let space = spec.action_space(player)?;
        let fallback = spec.fallback_action(player)?;
        self.decide(&prompt, space, fallback).await
    }

    /// Obtain an action in `space` for an already rendered prompt.
    ///
    /// `fallback` must be a member of `space`; it is returned (marked) when
    /// the policy is [`FallbackPolicy::DefaultAction`] and no attempt parses.
    pub async fn decide(
        &self,
        prompt: &str,
        space: ActionSpace,
        fallback: Action,
    ) -> Result<Decision, AgentError> {
        let max_attempts = self.config.max_retries + 1;
        let mut last_response = String::new();

        for attempt in 1..=max_attempts {
            let user_prompt = if attempt == 1 {
                prompt.to_string()
            } else {
                format!("{}{}", prompt, prompt::clarification(&space, attempt - 1))
            };

            let request = GenerationRequest {
                model: self.config.model.clone(),
                system_prompt: SYSTEM_PROMPT.to_string(),
                user_prompt,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };

            let response = self.backend.generate(&request).await?;
            debug!(attempt, response = %response.trim(), "LLM response");

            if let Some(action) = parse_action(&response, &space) {
                return Ok(Decision {
                    action,
                    raw_text: response,
                    attempts: attempt,
                    fallback: false,
                });
            }

            debug!(attempt, max_attempts, "Could not parse a valid action");
            last_response = response;
        }

        match self.config.fallback {
            FallbackPolicy::DefaultAction => {
                warn!(
                    attempts = max_attempts,
                    fallback = %fallback,
                    "No valid action parsed, using fallback"
                );
                Ok(Decision {
                    action: fallback,
                    raw_text: last_response,
                    attempts: max_attempts,
                    fallback: true,
                })
            }
            FallbackPolicy::SkipRound => {
                warn!(attempts = max_attempts, "No valid action parsed");
                Err(AgentError::ParseFailure {
                    attempts: max_attempts,
                    last_response,
                })
            }
        }
    }
}
