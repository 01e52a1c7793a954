//! Results collection and persistence for game simulations.
//!
//! A [`SimulationRun`] is built round by round by the runner, then saved as
//! pretty JSON (the analyzer's input) and exported as CSV with one row per
//! player per round for spreadsheet tooling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use econ_games::{Action, GameError, GameKind, GameSpec};

use crate::agent::FallbackPolicy;

/// Whether a round produced payoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Every deciding player acted and payoffs were computed
    Played,
    /// A player's answer could not be parsed and the round was skipped
    Skipped,
}

/// One player's decision within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDecision {
    pub player: usize,
    pub role: String,
    /// Last raw model response for this decision
    pub raw_text: String,
    /// Parsed action; `None` only when the round was skipped
    pub action: Option<Action>,
    /// Number of generation attempts used
    pub attempts: usize,
    /// Whether `action` is the game's fallback rather than the model's answer
    pub fallback: bool,
}

/// Outcome of a single round. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based round index
    pub round: usize,
    pub status: RoundStatus,
    /// Decisions of the deciding players, in player order
    pub decisions: Vec<PlayerDecision>,
    /// One payoff per player; `None` for skipped rounds
    pub payoffs: Option<Vec<f64>>,
    pub timestamp: DateTime<Utc>,
}

/// Configuration recorded alongside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub rounds: usize,
    pub model: String,
    pub temperature: f32,
    pub max_retries: usize,
    pub fallback: FallbackPolicy,
    pub history_window: usize,
}

/// A complete simulation of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    /// Game definition the rounds were played under
    pub game: GameSpec,
    pub config: RunConfig,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub rounds: Vec<RoundResult>,
}

/// A flattened CSV row.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    round: usize,
    game: &'a str,
    player: usize,
    role: &'a str,
    decision: String,
    payoff: Option<f64>,
    fallback: bool,
    attempts: usize,
    raw_text: &'a str,
    timestamp: String,
}

impl SimulationRun {
    pub fn kind(&self) -> GameKind {
        self.game.kind()
    }

    /// Rounds that produced payoffs.
    pub fn played(&self) -> impl Iterator<Item = &RoundResult> {
        self.rounds.iter().filter(|r| r.status == RoundStatus::Played)
    }

    /// Number of decisions that used the fallback action.
    pub fn fallback_count(&self) -> usize {
        self.rounds
            .iter()
            .flat_map(|r| &r.decisions)
            .filter(|d| d.fallback)
            .count()
    }

    /// Number of skipped rounds.
    pub fn skipped_count(&self) -> usize {
        self.rounds
            .iter()
            .filter(|r| r.status == RoundStatus::Skipped)
            .count()
    }

    /// Check that every recorded action is legal for its player.
    pub fn validate(&self) -> Result<(), GameError> {
        for round in &self.rounds {
            for decision in &round.decisions {
                let Some(action) = decision.action else {
                    continue;
                };
                if !self.game.action_space(decision.player)?.contains(&action) {
                    return Err(GameError::ActionOutOfSpace {
                        player: decision.player,
                        action,
                    });
                }
            }
        }
        Ok(())
    }

    /// Save the run to a JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load a run from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let run = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(run)
    }

    /// Export one row per player per round.
    ///
    /// Passive players (the dictator's recipient) get a row with an empty
    /// decision so every payoff is visible.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let roles = self.game.roles();
        let game = self.game.name();
        let mut rows = 0;

        for round in &self.rounds {
            let timestamp = round.timestamp.to_rfc3339();
            for (player, role) in roles.iter().enumerate() {
                let decision = round.decisions.iter().find(|d| d.player == player);
                writer.serialize(CsvRow {
                    round: round.round,
                    game,
                    player,
                    role,
                    decision: decision
                        .and_then(|d| d.action)
                        .map(|a| a.to_string())
                        .unwrap_or_default(),
                    payoff: round.payoffs.as_ref().and_then(|p| p.get(player).copied()),
                    fallback: decision.is_some_and(|d| d.fallback),
                    attempts: decision.map_or(0, |d| d.attempts),
                    raw_text: decision.map_or("", |d| d.raw_text.as_str()),
                    timestamp: timestamp.clone(),
                })?;
                rows += 1;
            }
        }
        writer.flush()?;
        Ok(rows)
    }
}

/// Path of a persisted simulation: `<dir>/<game>_simulation.<ext>`.
pub fn simulation_path(dir: &Path, game: GameKind, ext: &str) -> PathBuf {
    dir.join(format!("{}_simulation.{}", game.name(), ext))
}

/// Generate a timestamped output path from the given path.
/// e.g., "dictator_simulation.json" -> "dictator_simulation-20260108-010530.json"
pub fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_games::Choice;

    fn sample_run() -> SimulationRun {
        let spec = GameSpec::with_defaults(GameKind::Dictator);
        let rounds = (1..=3)
            .map(|round| RoundResult {
                round,
                status: RoundStatus::Played,
                decisions: vec![PlayerDecision {
                    player: 0,
                    role: "Dictator".to_string(),
                    raw_text: format!("I give {}", round * 10),
                    action: Some(Action::Amount((round * 10) as f64)),
                    attempts: 1,
                    fallback: false,
                }],
                payoffs: Some(vec![100.0 - (round * 10) as f64, (round * 10) as f64]),
                timestamp: Utc::now(),
            })
            .collect();
        SimulationRun {
            game: spec,
            config: RunConfig {
                rounds: 3,
                model: "test-model".to_string(),
                temperature: 0.7,
                max_retries: 2,
                fallback: FallbackPolicy::DefaultAction,
                history_window: 0,
            },
            started_at: Utc::now(),
            ended_at: Utc::now(),
            rounds,
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("llm-games-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_json_save_and_load() {
        let dir = temp_dir();
        let run = sample_run();
        let path = simulation_path(&dir, run.kind(), "json");
        run.save_json(&path).unwrap();

        let loaded = SimulationRun::load_json(&path).unwrap();
        assert_eq!(loaded, run);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_load_rejects_invalid_game_parameters() {
        let dir = temp_dir();
        let path = simulation_path(&dir, GameKind::Dictator, "json");
        sample_run().save_json(&path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let edited = json.replace(r#""endowment": 100.0"#, r#""endowment": 0.0"#);
        assert_ne!(edited, json);
        std::fs::write(&path, edited).unwrap();

        let err = SimulationRun::load_json(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("endowment must be positive"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_csv_has_row_per_player() {
        let dir = temp_dir();
        let run = sample_run();
        let path = simulation_path(&dir, run.kind(), "csv");
        let rows = run.export_csv(&path).unwrap();
        assert_eq!(rows, 6);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "round,game,player,role,decision,payoff,fallback,attempts,raw_text,timestamp"
        );
        assert!(lines
            .next()
            .unwrap()
            .starts_with("1,dictator,0,Dictator,10,90.0,false,1,I give 10,"));
        assert!(lines.next().unwrap().starts_with("1,dictator,1,Recipient,,10.0,false,0,,"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_validate_catches_illegal_action() {
        let mut run = sample_run();
        assert!(run.validate().is_ok());

        run.rounds[1].decisions[0].action = Some(Action::Choice(Choice::Cooperate));
        assert!(matches!(
            run.validate(),
            Err(GameError::ActionOutOfSpace { player: 0, .. })
        ));
    }

    #[test]
    fn test_counts() {
        let mut run = sample_run();
        run.rounds[0].decisions[0].fallback = true;
        run.rounds[2].status = RoundStatus::Skipped;
        run.rounds[2].payoffs = None;
        assert_eq!(run.fallback_count(), 1);
        assert_eq!(run.skipped_count(), 1);
        assert_eq!(run.played().count(), 2);
    }

    #[test]
    fn test_timestamped_path_keeps_extension() {
        let path = timestamped_path(Path::new("output/dictator_simulation.csv"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("dictator_simulation-"));
        assert!(name.ends_with(".csv"));
        assert_eq!(path.parent().unwrap(), Path::new("output"));
    }
}
