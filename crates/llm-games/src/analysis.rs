//! Analysis of recorded simulations.
//!
//! Computes descriptive statistics per role, per-round trends, and
//! game-specific indicators with their theoretical and experimental
//! reference points, then renders a plain-text report with ASCII charts.
//!
//! Everything here is a pure function of the recorded runs. Maps are
//! `BTreeMap`s so that analyzing the same input twice serializes
//! byte-for-byte identically.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use econ_games::{Action, ActionSpace, Choice, GameKind, GameSpec};

use crate::results::SimulationRun;

/// Number of histogram bins for numeric decisions.
const HISTOGRAM_BINS: usize = 10;

/// Width of the longest bar in rendered charts.
const BAR_WIDTH: usize = 40;

/// Maximum rows in the rendered per-round trend.
const TREND_ROWS: usize = 10;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No runs to analyze")]
    NoRuns,

    #[error("Cannot combine runs of different games: {first} and {other}")]
    MixedGames { first: GameKind, other: GameKind },

    #[error("Cannot combine {game} runs played under different parameters")]
    MixedParameters { game: GameKind },
}

/// Descriptive statistics of a numeric series.
///
/// `std` and `variance` are population statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub variance: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericStats {
    /// Statistics of `values`, or `None` when empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        Some(Self {
            n,
            mean,
            median,
            variance,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[n - 1],
        })
    }
}

/// Equal-width histogram over a fixed range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub low: f64,
    pub high: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    fn new(values: &[f64], low: f64, high: f64, bins: usize) -> Self {
        let mut counts = vec![0; bins.max(1)];
        let width = (high - low) / counts.len() as f64;
        for v in values {
            let idx = if width > 0.0 {
                (((v - low) / width) as usize).min(counts.len() - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }
        Self { low, high, counts }
    }

    fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.counts.len() as f64
    }
}

/// Distribution of one role's decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionSummary {
    /// Amounts or fractions
    Numeric {
        /// `None` when every round was skipped
        stats: Option<NumericStats>,
        histogram: Histogram,
    },
    /// Cooperate/defect or volunteer/abstain
    Categorical {
        n: usize,
        counts: BTreeMap<String, usize>,
        /// Share of cooperate/volunteer decisions
        positive_rate: f64,
    },
    /// Role never decides (the dictator's recipient)
    Passive,
}

/// Statistics for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub player: usize,
    pub role: String,
    pub decisions: DecisionSummary,
    pub payoff: Option<NumericStats>,
    /// Least-squares slope of the per-round mean decision value
    pub decision_trend: f64,
    pub fallbacks: usize,
}

/// Per-round means across all recorded runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// (round, mean payoff over all players and runs)
    pub mean_payoff_by_round: Vec<(usize, f64)>,
    /// Least-squares slope of `mean_payoff_by_round`
    pub payoff_slope: f64,
}

/// A game-specific behavioral indicator with reference points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: f64,
    /// Prediction for selfish rational players
    pub nash: Option<f64>,
    /// Typical value in human experiments
    pub experimental: Option<f64>,
}

impl Indicator {
    fn new(name: &str, value: f64, nash: Option<f64>, experimental: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            value,
            nash,
            experimental,
        }
    }
}

/// Summary of every recorded round of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game: GameKind,
    pub title: String,
    pub models: Vec<String>,
    pub runs: usize,
    pub rounds: usize,
    pub played: usize,
    pub skipped: usize,
    pub fallbacks: usize,
    pub roles: Vec<RoleSummary>,
    pub trend: Trend,
    pub indicators: Vec<Indicator>,
}

/// Analyze a single run.
pub fn analyze(run: &SimulationRun) -> GameSummary {
    summarize(&run.game, std::slice::from_ref(run))
}

/// Analyze several runs of the same game as one sample.
pub fn analyze_many(runs: &[SimulationRun]) -> Result<GameSummary, AnalysisError> {
    let first = runs.first().ok_or(AnalysisError::NoRuns)?;
    for run in &runs[1..] {
        if run.kind() != first.kind() {
            return Err(AnalysisError::MixedGames {
                first: first.kind(),
                other: run.kind(),
            });
        }
        if run.game != first.game {
            return Err(AnalysisError::MixedParameters { game: first.kind() });
        }
    }
    Ok(summarize(&first.game, runs))
}

fn summarize(spec: &GameSpec, runs: &[SimulationRun]) -> GameSummary {
    let mut models: Vec<String> = runs.iter().map(|r| r.config.model.clone()).collect();
    models.sort();
    models.dedup();

    let roles = spec
        .roles()
        .into_iter()
        .enumerate()
        .map(|(player, role)| summarize_role(spec, runs, player, role))
        .collect();

    GameSummary {
        game: spec.kind(),
        title: spec.kind().display_name().to_string(),
        models,
        runs: runs.len(),
        rounds: runs.iter().map(|r| r.rounds.len()).sum(),
        played: runs.iter().map(|r| r.played().count()).sum(),
        skipped: runs.iter().map(|r| r.skipped_count()).sum(),
        fallbacks: runs.iter().map(|r| r.fallback_count()).sum(),
        roles,
        trend: payoff_trend(runs),
        indicators: indicators(spec, runs),
    }
}

/// Actions recorded for `player` in played rounds, in round order.
fn actions_of(runs: &[SimulationRun], player: usize) -> Vec<(usize, Action)> {
    runs.iter()
        .flat_map(|r| r.played())
        .flat_map(|round| {
            round
                .decisions
                .iter()
                .filter(move |d| d.player == player)
                .filter_map(move |d| d.action.map(|a| (round.round, a)))
        })
        .collect()
}

fn payoffs_of(runs: &[SimulationRun], player: usize) -> Vec<f64> {
    runs.iter()
        .flat_map(|r| r.played())
        .filter_map(|round| round.payoffs.as_ref()?.get(player).copied())
        .collect()
}

fn summarize_role(
    spec: &GameSpec,
    runs: &[SimulationRun],
    player: usize,
    role: String,
) -> RoleSummary {
    let actions = actions_of(runs, player);
    let values: Vec<f64> = actions.iter().map(|(_, a)| a.value()).collect();

    let decisions = match spec.action_space(player) {
        Err(_) => DecisionSummary::Passive,
        Ok(space) if space.is_numeric() => {
            let high = match space {
                ActionSpace::Amount { max } => max,
                _ => 1.0,
            };
            DecisionSummary::Numeric {
                stats: NumericStats::from_values(&values),
                histogram: Histogram::new(&values, 0.0, high, HISTOGRAM_BINS),
            }
        }
        Ok(_) => {
            let mut counts = BTreeMap::new();
            for (_, action) in &actions {
                *counts.entry(category_label(action)).or_insert(0) += 1;
            }
            DecisionSummary::Categorical {
                n: values.len(),
                counts,
                positive_rate: rate(&values, |v| v > 0.5),
            }
        }
    };

    let fallbacks = runs
        .iter()
        .flat_map(|r| &r.rounds)
        .flat_map(|round| &round.decisions)
        .filter(|d| d.player == player && d.fallback)
        .count();

    RoleSummary {
        player,
        role,
        decisions,
        payoff: NumericStats::from_values(&payoffs_of(runs, player)),
        decision_trend: slope(&per_round_means(actions.iter().map(|(r, a)| (*r, a.value())))),
        fallbacks,
    }
}

fn category_label(action: &Action) -> String {
    match action {
        Action::Choice(Choice::Cooperate) => "cooperate".to_string(),
        Action::Choice(Choice::Defect) => "defect".to_string(),
        Action::Volunteer(true) => "volunteer".to_string(),
        Action::Volunteer(false) => "abstain".to_string(),
        other => other.to_string(),
    }
}

fn payoff_trend(runs: &[SimulationRun]) -> Trend {
    let points = runs
        .iter()
        .flat_map(|r| r.played())
        .filter_map(|round| {
            let payoffs = round.payoffs.as_ref()?;
            let mean = payoffs.iter().sum::<f64>() / payoffs.len().max(1) as f64;
            Some((round.round, mean))
        });
    let mean_payoff_by_round = per_round_means(points);
    Trend {
        payoff_slope: slope(&mean_payoff_by_round),
        mean_payoff_by_round,
    }
}

/// Average values sharing a round index, ordered by round.
fn per_round_means(points: impl Iterator<Item = (usize, f64)>) -> Vec<(usize, f64)> {
    let mut sums: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for (round, value) in points {
        let entry = sums.entry(round).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(round, (sum, n))| (round, sum / n as f64))
        .collect()
}

/// Least-squares slope of y over x; 0 for fewer than two distinct x.
fn slope(points: &[(usize, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| *x as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|(x, _)| (*x as f64 - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return 0.0;
    }
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (*x as f64 - mean_x) * (y - mean_y))
        .sum();
    sxy / sxx
}

fn rate(values: &[f64], pred: impl Fn(f64) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| pred(**v)).count() as f64 / values.len() as f64
}

fn mean(values: &[f64]) -> f64 {
    NumericStats::from_values(values).map_or(0.0, |s| s.mean)
}

fn values_of(runs: &[SimulationRun], player: usize) -> Vec<f64> {
    actions_of(runs, player).iter().map(|(_, a)| a.value()).collect()
}

/// Game-specific indicators with reference points from the behavioral
/// economics literature.
fn indicators(spec: &GameSpec, runs: &[SimulationRun]) -> Vec<Indicator> {
    let c = spec.config();
    match spec.kind() {
        GameKind::Dictator => {
            let e = c.dictator.endowment;
            let given = values_of(runs, 0);
            vec![
                Indicator::new("mean_given", mean(&given), Some(0.0), Some(0.3 * e)),
                Indicator::new(
                    "share_giving_at_least_half",
                    rate(&given, |v| v >= e / 2.0),
                    Some(0.0),
                    None,
                ),
                Indicator::new(
                    "share_giving_exactly_half",
                    rate(&given, |v| v == e / 2.0),
                    Some(0.0),
                    None,
                ),
            ]
        }
        GameKind::Ultimatum => {
            let e = c.ultimatum.endowment;
            let offers = values_of(runs, 0);
            let thresholds = values_of(runs, 1);
            let rejected: Vec<f64> = runs
                .iter()
                .flat_map(|r| r.played())
                .filter_map(|round| {
                    let offer = round.decisions.iter().find(|d| d.player == 0)?.action?;
                    let threshold = round.decisions.iter().find(|d| d.player == 1)?.action?;
                    Some(if offer.value() < threshold.value() { 1.0 } else { 0.0 })
                })
                .collect();
            vec![
                Indicator::new("mean_offer", mean(&offers), Some(0.01 * e), Some(0.4 * e)),
                Indicator::new(
                    "share_offering_at_least_half",
                    rate(&offers, |v| v >= e / 2.0),
                    Some(0.0),
                    None,
                ),
                Indicator::new("rejection_rate", mean(&rejected), Some(0.0), None),
                Indicator::new("mean_threshold", mean(&thresholds), Some(0.0), Some(0.3 * e)),
            ]
        }
        GameKind::Prisoner => {
            let choices = deciding_values(spec, runs);
            let payoffs: Vec<f64> = (0..spec.num_players())
                .flat_map(|p| payoffs_of(runs, p))
                .collect();
            let pm = &c.prisoner;
            vec![
                Indicator::new("cooperation_rate", mean(&choices), Some(0.0), None),
                Indicator::new(
                    "mean_payoff",
                    mean(&payoffs),
                    Some(pm.punishment),
                    Some(pm.reward),
                ),
            ]
        }
        GameKind::PublicGood => {
            let e = c.public_good.endowment;
            let contributions = deciding_values(spec, runs);
            vec![
                Indicator::new(
                    "mean_contribution",
                    mean(&contributions),
                    Some(0.0),
                    Some(0.5 * e),
                ),
                Indicator::new(
                    "share_contributing_all",
                    rate(&contributions, |v| v >= e),
                    Some(0.0),
                    None,
                ),
            ]
        }
        GameKind::Trust => {
            let e = c.trust.endowment;
            let sent = values_of(runs, 0);
            let returned = values_of(runs, 1);
            vec![
                Indicator::new("mean_sent", mean(&sent), Some(0.0), Some(0.5 * e)),
                Indicator::new("share_sending_any", rate(&sent, |v| v > 0.0), Some(0.0), None),
                Indicator::new("mean_return_fraction", mean(&returned), Some(0.0), Some(0.3)),
            ]
        }
        GameKind::Volunteer => {
            let decisions = deciding_values(spec, runs);
            let any_volunteer: Vec<f64> = runs
                .iter()
                .flat_map(|r| r.played())
                .map(|round| {
                    let any = round
                        .decisions
                        .iter()
                        .any(|d| d.action == Some(Action::Volunteer(true)));
                    if any { 1.0 } else { 0.0 }
                })
                .collect();
            vec![
                Indicator::new("volunteer_rate", mean(&decisions), Some(0.5), None),
                Indicator::new("share_rounds_with_volunteer", mean(&any_volunteer), None, None),
            ]
        }
    }
}

/// Decision values of every deciding player, pooled.
fn deciding_values(spec: &GameSpec, runs: &[SimulationRun]) -> Vec<f64> {
    spec.deciding_players()
        .into_iter()
        .flat_map(|p| values_of(runs, p))
        .collect()
}

/// Render the summary as a plain-text report with ASCII charts.
pub fn render_report(summary: &GameSummary) -> String {
    let mut out = String::new();
    let rule = "=".repeat(72);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{} ({})", summary.title.to_uppercase(), summary.game);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Models:    {}", summary.models.join(", "));
    let _ = writeln!(
        out,
        "Rounds:    {} in {} run(s); {} played, {} skipped",
        summary.rounds, summary.runs, summary.played, summary.skipped
    );
    let _ = writeln!(out, "Fallbacks: {}", summary.fallbacks);

    for role in &summary.roles {
        let _ = writeln!(out, "\n{} (player {})", role.role.to_uppercase(), role.player);
        let _ = writeln!(out, "{}", "-".repeat(40));
        match &role.decisions {
            DecisionSummary::Numeric {
                stats: Some(stats),
                histogram,
            } => {
                let _ = writeln!(out, "  Decisions (n={}):", stats.n);
                let _ = writeln!(
                    out,
                    "    mean {:.2}  median {:.2}  std {:.2}",
                    stats.mean, stats.median, stats.std
                );
                let _ = writeln!(out, "    min {:.2}  max {:.2}", stats.min, stats.max);
                out.push_str(&render_histogram(histogram));
            }
            DecisionSummary::Numeric { stats: None, .. } => {
                let _ = writeln!(out, "  No decisions recorded");
            }
            DecisionSummary::Categorical {
                n,
                counts,
                positive_rate,
            } => {
                let _ = writeln!(
                    out,
                    "  Decisions (n={}), positive rate {:.1}%:",
                    n,
                    positive_rate * 100.0
                );
                let bars: Vec<(String, usize)> =
                    counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
                out.push_str(&render_bars(&bars));
            }
            DecisionSummary::Passive => {
                let _ = writeln!(out, "  Passive role (no decisions)");
            }
        }
        if let Some(payoff) = &role.payoff {
            let _ = writeln!(
                out,
                "  Payoff: mean {:.2}  variance {:.2}  std {:.2}",
                payoff.mean, payoff.variance, payoff.std
            );
        }
        if !matches!(role.decisions, DecisionSummary::Passive) {
            let _ = writeln!(out, "  Decision trend: {:+.4} per round", role.decision_trend);
        }
        if role.fallbacks > 0 {
            let _ = writeln!(out, "  Fallbacks: {}", role.fallbacks);
        }
    }

    let _ = writeln!(out, "\nINDICATORS");
    let _ = writeln!(out, "{}", "-".repeat(40));
    for ind in &summary.indicators {
        let nash = ind.nash.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
        let exp = ind.experimental.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<30} {:>10.3}  (Nash: {}, Experimental: {})",
            ind.name, ind.value, nash, exp
        );
    }

    let _ = writeln!(out, "\nPER-ROUND MEAN PAYOFF (slope {:+.4})", summary.trend.payoff_slope);
    let _ = writeln!(out, "{}", "-".repeat(40));
    let bucketed = bucket_trend(&summary.trend.mean_payoff_by_round, TREND_ROWS);
    let max = bucketed.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    for (label, value) in &bucketed {
        let _ = writeln!(out, "  {:>9} {:>8.2} {}", label, value, bar(*value, max));
    }

    out
}

fn render_histogram(histogram: &Histogram) -> String {
    let width = histogram.bin_width();
    let bars: Vec<(String, usize)> = histogram
        .counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let lo = histogram.low + width * i as f64;
            let close = if i + 1 == histogram.counts.len() { "]" } else { ")" };
            (format!("[{:.2}, {:.2}{}", lo, lo + width, close), count)
        })
        .collect();
    render_bars(&bars)
}

fn render_bars(bars: &[(String, usize)]) -> String {
    let max = bars.iter().map(|(_, c)| *c).max().unwrap_or(0) as f64;
    let label_width = bars.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    bars.iter()
        .map(|(label, count)| {
            format!(
                "    {:<w$} {:>5} {}\n",
                label,
                count,
                bar(*count as f64, max),
                w = label_width
            )
        })
        .collect()
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(len.max(1))
}

/// Collapse a long per-round series into at most `rows` averaged buckets.
fn bucket_trend(points: &[(usize, f64)], rows: usize) -> Vec<(String, f64)> {
    if points.is_empty() {
        return Vec::new();
    }
    let chunk = points.len().div_ceil(rows.max(1));
    points
        .chunks(chunk)
        .map(|c| {
            let first = c[0].0;
            let last = c[c.len() - 1].0;
            let label = if first == last {
                format!("r{}", first)
            } else {
                format!("r{}-{}", first, last)
            };
            let avg = c.iter().map(|(_, v)| v).sum::<f64>() / c.len() as f64;
            (label, avg)
        })
        .collect()
}

/// Write `<game>_summary.json` and `<game>_report.txt` into `dir`.
pub fn write_artifacts(summary: &GameSummary, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let json_path = dir.join(format!("{}_summary.json", summary.game.name()));
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    let report_path = dir.join(format!("{}_report.txt", summary.game.name()));
    std::fs::write(&report_path, render_report(summary))
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    Ok(vec![json_path, report_path])
}

/// Where a headline result sits relative to its reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leaning {
    NearerNash,
    NearerHuman,
    AtNash,
    OffNash,
    Unknown,
}

impl Leaning {
    fn of(indicator: &Indicator) -> Self {
        let v = indicator.value;
        match (indicator.nash, indicator.experimental) {
            (Some(nash), Some(human)) => {
                let (to_nash, to_human) = ((v - nash).abs(), (v - human).abs());
                if to_nash < to_human {
                    Self::NearerNash
                } else if to_human < to_nash {
                    Self::NearerHuman
                } else {
                    Self::Unknown
                }
            }
            (Some(nash), None) if (v - nash).abs() < 1e-9 => Self::AtNash,
            (Some(_), None) => Self::OffNash,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NearerNash => "nearer Nash",
            Self::NearerHuman => "nearer human play",
            Self::AtNash => "at Nash",
            Self::OffNash => "away from Nash",
            Self::Unknown => "-",
        }
    }
}

/// One game's headline result in the cross-game overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewEntry {
    pub game: GameKind,
    pub title: String,
    pub played: usize,
    pub fallbacks: usize,
    /// First indicator of the game's summary
    pub headline: Option<Indicator>,
    pub leaning: Leaning,
}

/// Headline results of every analyzed game side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub models: Vec<String>,
    pub games: Vec<OverviewEntry>,
}

/// Collect the headline indicator of each game, in game order.
pub fn overview(summaries: &[GameSummary]) -> Overview {
    let mut models: Vec<String> = summaries
        .iter()
        .flat_map(|s| s.models.iter().cloned())
        .collect();
    models.sort();
    models.dedup();

    let mut games: Vec<OverviewEntry> = summaries
        .iter()
        .map(|s| {
            let headline = s.indicators.first().cloned();
            OverviewEntry {
                game: s.game,
                title: s.title.clone(),
                played: s.played,
                fallbacks: s.fallbacks,
                leaning: headline.as_ref().map_or(Leaning::Unknown, Leaning::of),
                headline,
            }
        })
        .collect();
    games.sort_by_key(|entry| entry.game);

    Overview { models, games }
}

/// Render the overview as a plain-text table with key findings.
pub fn render_overview(overview: &Overview) -> String {
    let mut out = String::new();
    let rule = "=".repeat(96);
    let fmt_ref = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "CROSS-GAME OVERVIEW");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Models: {}\n", overview.models.join(", "));
    let _ = writeln!(
        out,
        "  {:<22} {:<20} {:>9} {:>8} {:>12}  {:>7}  Leaning",
        "Game", "Indicator", "Value", "Nash", "Experimental", "Played"
    );
    for entry in &overview.games {
        let (name, value, nash, human) = match &entry.headline {
            Some(ind) => (
                ind.name.as_str(),
                format!("{:.3}", ind.value),
                fmt_ref(ind.nash),
                fmt_ref(ind.experimental),
            ),
            None => ("-", "-".to_string(), "-".to_string(), "-".to_string()),
        };
        let _ = writeln!(
            out,
            "  {:<22} {:<20} {:>9} {:>8} {:>12}  {:>7}  {}",
            entry.title,
            name,
            value,
            nash,
            human,
            entry.played,
            entry.leaning.label()
        );
    }

    let count = |leaning: Leaning| overview.games.iter().filter(|e| e.leaning == leaning).count();
    let off_nash = count(Leaning::NearerHuman) + count(Leaning::OffNash);
    let _ = writeln!(out, "\nKEY FINDINGS");
    let _ = writeln!(out, "{}", "-".repeat(40));
    let _ = writeln!(
        out,
        "  {} of {} games played away from the selfish Nash prediction",
        off_nash,
        overview.games.len()
    );
    let _ = writeln!(
        out,
        "  {} of {} games nearer typical human play than Nash",
        count(Leaning::NearerHuman),
        overview.games.len()
    );
    let fallbacks: usize = overview.games.iter().map(|e| e.fallbacks).sum();
    if fallbacks > 0 {
        let _ = writeln!(out, "  {} fallback actions across all games", fallbacks);
    }
    out
}

/// Write `summary.json` and `summary_report.txt` into `dir`.
pub fn write_overview(overview: &Overview, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let json_path = dir.join("summary.json");
    let json = serde_json::to_string_pretty(overview)?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    let report_path = dir.join("summary_report.txt");
    std::fs::write(&report_path, render_overview(overview))
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    Ok(vec![json_path, report_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::agent::FallbackPolicy;
    use crate::results::{PlayerDecision, RoundResult, RoundStatus, RunConfig};

    fn run_from(spec: GameSpec, rounds: Vec<Vec<Action>>) -> SimulationRun {
        let roles = spec.roles();
        let rounds = rounds
            .into_iter()
            .enumerate()
            .map(|(i, actions)| {
                let payoffs = spec.payoffs(&actions).unwrap();
                RoundResult {
                    round: i + 1,
                    status: RoundStatus::Played,
                    decisions: spec
                        .deciding_players()
                        .into_iter()
                        .zip(actions)
                        .map(|(player, action)| PlayerDecision {
                            player,
                            role: roles[player].clone(),
                            raw_text: action.to_string(),
                            action: Some(action),
                            attempts: 1,
                            fallback: false,
                        })
                        .collect(),
                    payoffs: Some(payoffs),
                    timestamp: Utc::now(),
                }
            })
            .collect();
        SimulationRun {
            game: spec,
            config: RunConfig {
                rounds: 0,
                model: "test-model".to_string(),
                temperature: 0.7,
                max_retries: 3,
                fallback: FallbackPolicy::DefaultAction,
                history_window: 0,
            },
            started_at: Utc::now(),
            ended_at: Utc::now(),
            rounds,
        }
    }

    fn dictator_run(gifts: &[f64]) -> SimulationRun {
        run_from(
            GameSpec::with_defaults(GameKind::Dictator),
            gifts.iter().map(|g| vec![Action::Amount(*g)]).collect(),
        )
    }

    #[test]
    fn test_numeric_stats() {
        let stats = NumericStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.std, 2.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert!(NumericStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_slope() {
        assert_eq!(slope(&[(1, 1.0), (2, 3.0), (3, 5.0)]), 2.0);
        assert_eq!(slope(&[(1, 4.0)]), 0.0);
    }

    #[test]
    fn test_dictator_indicators() {
        let summary = analyze(&dictator_run(&[50.0, 50.0, 20.0, 0.0]));
        let get = |name: &str| summary.indicators.iter().find(|i| i.name == name).unwrap().value;
        assert_eq!(get("mean_given"), 30.0);
        assert_eq!(get("share_giving_at_least_half"), 0.5);
        assert_eq!(get("share_giving_exactly_half"), 0.5);

        assert_eq!(summary.roles.len(), 2);
        assert_eq!(summary.roles[1].decisions, DecisionSummary::Passive);
        assert_eq!(summary.roles[1].payoff.as_ref().unwrap().mean, 30.0);
        assert!(summary.trend.payoff_slope.abs() < 1e-12);
    }

    #[test]
    fn test_histogram_bins_cover_range() {
        let summary = analyze(&dictator_run(&[0.0, 9.9, 50.0, 100.0]));
        let DecisionSummary::Numeric { histogram, .. } = &summary.roles[0].decisions else {
            panic!("expected numeric decisions");
        };
        assert_eq!(histogram.counts.len(), HISTOGRAM_BINS);
        assert_eq!(histogram.counts[0], 2);
        assert_eq!(histogram.counts[5], 1);
        assert_eq!(histogram.counts[9], 1);
    }

    #[test]
    fn test_prisoner_cooperation_rate() {
        let c = Action::Choice(Choice::Cooperate);
        let d = Action::Choice(Choice::Defect);
        let run = run_from(
            GameSpec::with_defaults(GameKind::Prisoner),
            vec![vec![c, c], vec![c, d]],
        );
        let summary = analyze(&run);
        assert_eq!(summary.indicators[0].name, "cooperation_rate");
        assert_eq!(summary.indicators[0].value, 0.75);
        let DecisionSummary::Categorical { counts, .. } = &summary.roles[1].decisions else {
            panic!("expected categorical decisions");
        };
        assert_eq!(counts.get("cooperate"), Some(&1));
        assert_eq!(counts.get("defect"), Some(&1));
    }

    #[test]
    fn test_ultimatum_rejection_rate() {
        let run = run_from(
            GameSpec::with_defaults(GameKind::Ultimatum),
            vec![
                vec![Action::Amount(40.0), Action::Amount(30.0)],
                vec![Action::Amount(10.0), Action::Amount(30.0)],
            ],
        );
        let summary = analyze(&run);
        let rejection = summary.indicators.iter().find(|i| i.name == "rejection_rate").unwrap();
        assert_eq!(rejection.value, 0.5);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let run = dictator_run(&[10.0, 20.0, 35.0, 50.0, 50.0]);
        let first = serde_json::to_string(&analyze(&run)).unwrap();
        let second = serde_json::to_string(&analyze(&run)).unwrap();
        assert_eq!(first, second);
        assert_eq!(render_report(&analyze(&run)), render_report(&analyze(&run)));
    }

    #[test]
    fn test_analyze_many_merges_rounds() {
        let runs = vec![dictator_run(&[10.0, 20.0]), dictator_run(&[30.0, 40.0])];
        let summary = analyze_many(&runs).unwrap();
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.rounds, 4);
        // Round 1 averages 10 and 30 for the recipient, 90 and 70 for the dictator
        assert_eq!(summary.trend.mean_payoff_by_round, vec![(1, 50.0), (2, 50.0)]);
    }

    #[test]
    fn test_analyze_many_rejects_mixed_games() {
        let prisoner = run_from(
            GameSpec::with_defaults(GameKind::Prisoner),
            vec![vec![Action::Choice(Choice::Defect), Action::Choice(Choice::Defect)]],
        );
        let err = analyze_many(&[dictator_run(&[1.0]), prisoner]).unwrap_err();
        assert!(matches!(err, AnalysisError::MixedGames { .. }));
        assert!(matches!(analyze_many(&[]), Err(AnalysisError::NoRuns)));
    }

    #[test]
    fn test_report_mentions_indicators() {
        let report = render_report(&analyze(&dictator_run(&[50.0, 30.0])));
        assert!(report.contains("DICTATOR GAME"));
        assert!(report.contains("mean_given"));
        assert!(report.contains("Passive role"));
        assert!(report.contains('#'));
    }

    #[test]
    fn test_overview_lists_headlines_across_games() {
        let c = Action::Choice(Choice::Cooperate);
        let prisoner = run_from(GameSpec::with_defaults(GameKind::Prisoner), vec![vec![c, c]]);
        let summaries = vec![analyze(&prisoner), analyze(&dictator_run(&[50.0, 30.0]))];
        let overview = overview(&summaries);

        assert_eq!(overview.models, vec!["test-model".to_string()]);
        assert_eq!(overview.games.len(), 2);
        assert_eq!(overview.games[0].game, GameKind::Dictator);

        let dictator = overview.games[0].headline.as_ref().unwrap();
        assert_eq!(dictator.name, "mean_given");
        assert_eq!(dictator.value, 40.0);
        assert_eq!(overview.games[0].leaning, Leaning::NearerHuman);

        let prisoner = overview.games[1].headline.as_ref().unwrap();
        assert_eq!(prisoner.name, "cooperation_rate");
        assert_eq!(overview.games[1].leaning, Leaning::OffNash);

        let report = render_overview(&overview);
        assert!(report.contains("CROSS-GAME OVERVIEW"));
        assert!(report.contains("mean_given"));
        assert!(report.contains("2 of 2 games played away from the selfish Nash prediction"));
    }

    #[test]
    fn test_write_overview() {
        let dir = std::env::temp_dir().join(format!("llm-games-overview-{}", uuid::Uuid::new_v4()));
        let overview = overview(&[analyze(&dictator_run(&[0.0, 0.0]))]);
        assert_eq!(overview.games[0].leaning, Leaning::NearerNash);

        let written = write_overview(&overview, &dir).unwrap();
        assert!(written[0].ends_with("summary.json"));
        assert!(written[1].ends_with("summary_report.txt"));
        let loaded: Overview =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(loaded, overview);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
