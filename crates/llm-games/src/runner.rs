//! Simulation runner: drives repeated rounds of one game.
//!
//! The runner is a small state machine:
//!
//! ```text
//! Idle -> RunningRound(i) -> RoundComplete(i) -> RunningRound(i+1) | Finished
//! ```
//!
//! Rounds run strictly in order because a round's prompt may include the
//! history of earlier rounds. The results log is append-only and owned by
//! the runner until it is handed over as a [`SimulationRun`].

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use econ_games::{GameError, GameSpec};

use crate::agent::{Agent, AgentError};
use crate::inference::{InferenceBackend, InferenceError};
use crate::results::{PlayerDecision, RoundResult, RoundStatus, RunConfig, SimulationRun};

/// Runner lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Configured, nothing played yet
    Idle,
    /// Collecting actions for round `i` (1-based)
    RunningRound(usize),
    /// Round `i` has been appended to the log
    RoundComplete(usize),
    /// All configured rounds are recorded
    Finished,
}

/// Errors that abort a simulation.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Round count must be at least 1")]
    NoRounds,

    /// The inference backend failed; the run cannot continue.
    #[error("Inference backend failed in round {round}: {source}")]
    Backend {
        round: usize,
        #[source]
        source: InferenceError,
    },

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Configuration for the simulation runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Number of rounds to play
    pub rounds: usize,
    /// Previous rounds shown in each prompt (0 = independent one-shot rounds)
    pub history_window: usize,
    /// Log progress every this many rounds
    pub progress_every: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            rounds: 50,
            history_window: 0,
            progress_every: 10,
        }
    }
}

/// Drives an [`Agent`] through repeated rounds of one game.
pub struct SimulationRunner<B> {
    spec: GameSpec,
    agent: Agent<B>,
    config: RunnerConfig,
    state: RunnerState,
    rounds: Vec<RoundResult>,
    started_at: DateTime<Utc>,
}

impl<B: InferenceBackend> SimulationRunner<B> {
    /// Create a runner in the `Idle` state.
    pub fn new(spec: GameSpec, agent: Agent<B>, config: RunnerConfig) -> Result<Self, RunnerError> {
        if config.rounds == 0 {
            return Err(RunnerError::NoRounds);
        }
        Ok(Self {
            spec,
            agent,
            config,
            state: RunnerState::Idle,
            rounds: Vec::new(),
            started_at: Utc::now(),
        })
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Rounds recorded so far.
    pub fn rounds(&self) -> &[RoundResult] {
        &self.rounds
    }

    /// Advance one transition and return the new state.
    ///
    /// Stepping a finished runner is a no-op. On a backend error the state
    /// stays at `RunningRound(i)` and the error is returned.
    pub async fn step(&mut self) -> Result<RunnerState, RunnerError> {
        self.state = match self.state {
            RunnerState::Idle => {
                self.started_at = Utc::now();
                info!(
                    game = self.spec.name(),
                    rounds = self.config.rounds,
                    model = %self.agent.config().model,
                    "Starting simulation"
                );
                RunnerState::RunningRound(1)
            }
            RunnerState::RunningRound(round) => {
                let result = self.play_round(round).await?;
                self.rounds.push(result);
                RunnerState::RoundComplete(round)
            }
            RunnerState::RoundComplete(round) => {
                let every = self.config.progress_every.max(1);
                if round % every == 0 || round == self.config.rounds {
                    info!(
                        progress = format!("{}/{}", round, self.config.rounds),
                        game = self.spec.name(),
                        "Completed round"
                    );
                }
                if round >= self.config.rounds {
                    RunnerState::Finished
                } else {
                    RunnerState::RunningRound(round + 1)
                }
            }
            RunnerState::Finished => RunnerState::Finished,
        };
        Ok(self.state)
    }

    /// Play every configured round and hand over the results.
    pub async fn run(mut self) -> Result<SimulationRun, RunnerError> {
        while self.state != RunnerState::Finished {
            self.step().await?;
        }
        Ok(self.into_run())
    }

    fn into_run(self) -> SimulationRun {
        let agent = self.agent.config();
        SimulationRun {
            config: RunConfig {
                rounds: self.config.rounds,
                model: agent.model.clone(),
                temperature: agent.temperature,
                max_retries: agent.max_retries,
                fallback: agent.fallback,
                history_window: self.config.history_window,
            },
            game: self.spec,
            started_at: self.started_at,
            ended_at: Utc::now(),
            rounds: self.rounds,
        }
    }

    /// Collect one action per deciding player and compute payoffs.
    async fn play_round(&self, round: usize) -> Result<RoundResult, RunnerError> {
        let mut decisions = Vec::new();
        let mut skipped = false;

        for player in self.spec.deciding_players() {
            let role = self.spec.role(player)?;
            let outcome = self
                .agent
                .decide_for(&self.spec, player, &self.rounds, self.config.history_window)
                .await;

            match outcome {
                Ok(decision) => decisions.push(PlayerDecision {
                    player,
                    role,
                    raw_text: decision.raw_text,
                    action: Some(decision.action),
                    attempts: decision.attempts,
                    fallback: decision.fallback,
                }),
                Err(AgentError::ParseFailure {
                    attempts,
                    last_response,
                }) => {
                    warn!(round, player, role = %role, "Skipping round after parse failure");
                    decisions.push(PlayerDecision {
                        player,
                        role,
                        raw_text: last_response,
                        action: None,
                        attempts,
                        fallback: false,
                    });
                    skipped = true;
                    break;
                }
                Err(AgentError::Backend(source)) => {
                    return Err(RunnerError::Backend { round, source });
                }
                Err(AgentError::Game(e)) => return Err(e.into()),
            }
        }

        let payoffs = if skipped {
            None
        } else {
            let actions: Vec<_> = decisions.iter().filter_map(|d| d.action).collect();
            let payoffs = self.spec.payoffs(&actions)?;
            debug!(round, ?actions, ?payoffs, "Round played");
            Some(payoffs)
        };

        Ok(RoundResult {
            round,
            status: if skipped {
                RoundStatus::Skipped
            } else {
                RoundStatus::Played
            },
            decisions,
            payoffs,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use econ_games::GameKind;

    use crate::agent::AgentConfig;
    use crate::inference::GenerationRequest;

    /// Backend that always answers the same text.
    struct Constant(&'static str, AtomicUsize);

    impl InferenceBackend for Constant {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, InferenceError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn runner(text: &'static str, kind: GameKind, rounds: usize) -> SimulationRunner<Constant> {
        let agent = Agent::new(Constant(text, AtomicUsize::new(0)), AgentConfig::default());
        let config = RunnerConfig {
            rounds,
            ..Default::default()
        };
        SimulationRunner::new(GameSpec::with_defaults(kind), agent, config).unwrap()
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let mut runner = runner("cooperate", GameKind::Prisoner, 2);
        assert_eq!(runner.state(), RunnerState::Idle);
        assert_eq!(runner.step().await.unwrap(), RunnerState::RunningRound(1));
        assert_eq!(runner.step().await.unwrap(), RunnerState::RoundComplete(1));
        assert_eq!(runner.rounds().len(), 1);
        assert_eq!(runner.step().await.unwrap(), RunnerState::RunningRound(2));
        assert_eq!(runner.step().await.unwrap(), RunnerState::RoundComplete(2));
        assert_eq!(runner.step().await.unwrap(), RunnerState::Finished);
        assert_eq!(runner.step().await.unwrap(), RunnerState::Finished);
    }

    #[tokio::test]
    async fn test_mutual_cooperation_payoffs() {
        let run = runner("cooperate", GameKind::Prisoner, 3).run().await.unwrap();
        assert_eq!(run.rounds.len(), 3);
        for round in &run.rounds {
            assert_eq!(round.payoffs, Some(vec![3.0, 3.0]));
        }
        assert_eq!(run.config.rounds, 3);
    }

    #[tokio::test]
    async fn test_dictator_asks_only_the_dictator() {
        let runner = runner("I give 30", GameKind::Dictator, 4);
        let run = runner.run().await.unwrap();
        assert!(run.rounds.iter().all(|r| r.decisions.len() == 1));
        assert_eq!(run.rounds[0].payoffs, Some(vec![70.0, 30.0]));
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let agent = Agent::new(Constant("x", AtomicUsize::new(0)), AgentConfig::default());
        let config = RunnerConfig {
            rounds: 0,
            ..Default::default()
        };
        let result = SimulationRunner::new(GameSpec::with_defaults(GameKind::Trust), agent, config);
        assert!(matches!(result, Err(RunnerError::NoRounds)));
    }
}
