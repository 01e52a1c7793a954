//! LLM Games CLI.
//!
//! Usage:
//! - `llm-games <GAME>`: play one round and print it in detail
//! - `llm-games --simulate <GAME> <ROUNDS>`: batch run, saved as JSON and CSV
//! - `llm-games analyze [GAME...]`: summarize saved runs, per game and side by side
//! - `llm-games baseline <GAME>`: random-play payoff baseline
//! - `llm-games list`: show the available games

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use econ_games::{monte_carlo, GameConfig, GameKind, GameSpec};
use llm_games::agent::{Agent, AgentConfig, FallbackPolicy};
use llm_games::analysis::{
    analyze_many, overview, render_overview, render_report, write_artifacts, write_overview,
};
use llm_games::inference::{HttpInference, InferenceBackend, InferenceConfig};
use llm_games::prompt;
use llm_games::results::{simulation_path, timestamped_path, SimulationRun};
use llm_games::runner::{RunnerConfig, SimulationRunner};

#[derive(Parser)]
#[command(name = "llm-games")]
#[command(version)]
#[command(about = "Behavioral economics games played by a local LLM")]
struct Cli {
    /// Inference server URL (OpenAI-compatible)
    #[arg(long, env = "INFERENCE_URL", default_value = "http://localhost:11434", global = true)]
    url: String,

    /// Model name
    #[arg(long, env = "INFERENCE_MODEL", default_value = "mistral", global = true)]
    model: String,

    /// Sampling temperature
    #[arg(long, env = "INFERENCE_TEMPERATURE", default_value = "0.7", global = true)]
    temperature: f32,

    /// Per-request timeout in seconds
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value = "60", global = true)]
    timeout_secs: u64,

    /// Re-prompts when an answer cannot be parsed
    #[arg(long, default_value = "3", global = true)]
    max_retries: usize,

    /// What to do after the retries are spent: default (fallback action) or skip (skip round)
    #[arg(long, default_value = "default", global = true)]
    fallback: FallbackPolicy,

    /// Previous rounds shown in each prompt (0 = independent rounds)
    #[arg(long, default_value = "0", global = true)]
    history: usize,

    /// JSON file overriding game parameters
    #[arg(long, global = true)]
    game_config: Option<PathBuf>,

    /// Directory for simulation files and analysis artifacts
    #[arg(long, env = "LLM_GAMES_OUTPUT", default_value = "output", global = true)]
    output: PathBuf,

    /// Append a timestamp to simulation file names
    #[arg(long, global = true)]
    timestamp: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Play a single round of GAME and print every step
    game: Option<String>,

    /// Run ROUNDS rounds of GAME and save the results
    #[arg(long, num_args = 2, value_names = ["GAME", "ROUNDS"], conflicts_with = "game")]
    simulate: Option<Vec<String>>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze saved simulations (all games if none given)
    Analyze {
        /// Games to analyze
        games: Vec<String>,
    },

    /// Average payoffs under uniformly random play
    Baseline {
        /// Game to sample
        game: String,

        /// Number of random rounds
        #[arg(long, default_value = "10000")]
        samples: usize,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the available games
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match &cli.command {
        Some(Commands::Analyze { games }) => analyze(&cli, games),
        Some(Commands::Baseline { game, samples, seed }) => {
            let spec = load_spec(game.parse()?, cli.game_config.as_deref())?;
            let result = monte_carlo(&spec, *samples, *seed)?;

            println!("\n=== Random Baseline: {} ===", spec.kind().display_name());
            println!("Samples: {}", result.samples);
            if let Some(seed) = result.seed {
                println!("Seed: {}", seed);
            }
            for (role, payoff) in spec.roles().iter().zip(&result.avg_payoffs) {
                println!("  {:<12} {:>8.2}", role, payoff);
            }
            Ok(())
        }
        Some(Commands::List) => {
            list_games();
            Ok(())
        }
        None => {
            if let Some(args) = &cli.simulate {
                let (game, rounds) = match args.as_slice() {
                    [game, rounds] => (game, rounds),
                    _ => bail!("--simulate expects GAME and ROUNDS"),
                };
                let kind: GameKind = game.parse()?;
                let rounds: usize = rounds
                    .parse()
                    .with_context(|| format!("Invalid round count: {}", rounds))?;
                simulate(&cli, kind, rounds).await
            } else if let Some(game) = &cli.game {
                single_round(&cli, game.parse()?).await
            } else {
                bail!(
                    "Nothing to do. Pass a GAME, --simulate GAME ROUNDS, or a subcommand (see --help)"
                )
            }
        }
    }
}

/// Build the game definition, applying the optional parameter file.
fn load_spec(kind: GameKind, config_path: Option<&Path>) -> Result<GameSpec> {
    let Some(path) = config_path else {
        return Ok(GameSpec::with_defaults(kind));
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: GameConfig = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(GameSpec::new(kind, config)?)
}

/// Connect to the inference server and build the agent.
async fn connect(cli: &Cli) -> Result<Agent<HttpInference>> {
    let backend = HttpInference::new(&InferenceConfig {
        base_url: cli.url.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
    })?;

    if !backend.health_check().await {
        bail!(
            "Inference server not reachable at {}. Is it running with model {}?",
            backend.base_url(),
            cli.model
        );
    }

    let config = AgentConfig {
        model: cli.model.clone(),
        temperature: cli.temperature,
        max_retries: cli.max_retries,
        fallback: cli.fallback,
        ..Default::default()
    };
    Ok(Agent::new(backend, config))
}

async fn single_round(cli: &Cli, kind: GameKind) -> Result<()> {
    let spec = load_spec(kind, cli.game_config.as_deref())?;
    let agent = connect(cli).await?;

    let config = RunnerConfig {
        rounds: 1,
        history_window: 0,
        ..Default::default()
    };
    let run = SimulationRunner::new(spec.clone(), agent, config)?.run().await?;

    println!("\n=== {} ===", spec.kind().display_name());
    println!("Model: {}", run.config.model);
    for round in &run.rounds {
        for decision in &round.decisions {
            println!("\n--- {} ---", decision.role);
            println!("Prompt:\n{}", prompt::render(&spec, decision.player, &[], 0)?);
            println!("Response: {}", decision.raw_text.trim());
            match decision.action {
                Some(action) => println!("Parsed action: {}", action),
                None => println!("Parsed action: none"),
            }
            println!("Attempts: {}", decision.attempts);
            if decision.fallback {
                println!("(fallback action substituted)");
            }
        }

        println!("\nPayoffs:");
        match &round.payoffs {
            Some(payoffs) => {
                for (role, payoff) in spec.roles().iter().zip(payoffs) {
                    println!("  {:<12} {:>8.2}", role, payoff);
                }
            }
            None => println!("  Round skipped, no valid action"),
        }
    }
    Ok(())
}

async fn simulate(cli: &Cli, kind: GameKind, rounds: usize) -> Result<()> {
    let spec = load_spec(kind, cli.game_config.as_deref())?;
    let agent = connect(cli).await?;

    let config = RunnerConfig {
        rounds,
        history_window: cli.history,
        ..Default::default()
    };
    let run = SimulationRunner::new(spec, agent, config)?.run().await?;

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let mut json_path = simulation_path(&cli.output, kind, "json");
    let mut csv_path = simulation_path(&cli.output, kind, "csv");
    if cli.timestamp {
        json_path = timestamped_path(&json_path);
        csv_path = timestamped_path(&csv_path);
    }
    run.save_json(&json_path)?;
    let rows = run.export_csv(&csv_path)?;
    info!(path = %json_path.display(), "Saved simulation");
    info!(path = %csv_path.display(), rows, "Exported CSV");

    println!("\n=== Simulation Complete ===");
    println!("Game: {}", kind.display_name());
    println!("Rounds: {} ({} skipped)", run.rounds.len(), run.skipped_count());
    println!("Fallback actions: {}", run.fallback_count());
    println!("Results saved to: {}", json_path.display());
    println!("CSV saved to: {}", csv_path.display());
    Ok(())
}

fn analyze(cli: &Cli, games: &[String]) -> Result<()> {
    let kinds: Vec<GameKind> = if games.is_empty() {
        GameKind::all()
    } else {
        games.iter().map(|g| g.parse()).collect::<Result<_, _>>()?
    };

    let mut summaries = Vec::new();
    for kind in kinds {
        let paths = saved_runs(&cli.output, kind)?;
        if paths.is_empty() {
            if !games.is_empty() {
                warn!(game = kind.name(), dir = %cli.output.display(), "No saved simulations");
            }
            continue;
        }

        let runs = paths
            .iter()
            .map(SimulationRun::load_json)
            .collect::<Result<Vec<_>>>()?;
        let summary = analyze_many(&runs)?;
        let written = write_artifacts(&summary, &cli.output)?;

        println!("{}", render_report(&summary));
        for path in written {
            println!("Wrote {}", path.display());
        }
        summaries.push(summary);
    }

    if summaries.is_empty() {
        bail!("No simulations found in {}", cli.output.display());
    }

    let overview = overview(&summaries);
    let written = write_overview(&overview, &cli.output)?;
    println!("{}", render_overview(&overview));
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Saved simulation files for a game, plain and timestamped, sorted by name.
fn saved_runs(dir: &Path, kind: GameKind) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}_simulation", kind.name());
    let mut paths = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let matches = name.strip_prefix(&prefix).is_some_and(|rest| {
            rest == ".json" || (rest.starts_with('-') && rest.ends_with(".json"))
        });
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn list_games() {
    println!("Available games:");
    for kind in GameKind::all() {
        let spec = GameSpec::with_defaults(kind);
        println!("\n  {:<12} {}", kind.name(), kind.display_name());
        for (player, role) in spec.roles().iter().enumerate() {
            match spec.action_space(player) {
                Ok(space) => println!("    {:<12} {}", role, space.describe()),
                Err(_) => println!("    {:<12} passive", role),
            }
        }
    }
}
