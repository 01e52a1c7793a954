//! Prompt templating.
//!
//! Prompts are pure functions of the game, the player, and the round
//! history; nothing here holds state between calls.

use econ_games::{ActionSpace, GameError, GameSpec};

use crate::results::{RoundResult, RoundStatus};

/// System prompt sent with every request.
pub const SYSTEM_PROMPT: &str = "You are a participant in an economic decision-making \
    experiment. Read the rules carefully and make your own decision. Answer with the JSON \
    object requested, optionally followed by one short sentence of reasoning.";

/// Render the user prompt for one player's decision.
///
/// `window` limits how many of the most recent rounds are shown; 0 hides
/// history entirely so every round is played as a one-shot game.
pub fn render(
    spec: &GameSpec,
    player: usize,
    history: &[RoundResult],
    window: usize,
) -> Result<String, GameError> {
    let role = spec.role(player)?;
    let rules = spec.rules(player)?;
    let space = spec.action_space(player)?;

    let mut prompt = format!(
        "You are playing the {title} as {role}.\n\n{rules}\n\nYour answer must be {hint}.\n",
        title = spec.kind().display_name(),
        role = role,
        rules = rules,
        hint = space.describe(),
    );

    let history_text = render_history(spec, player, history, window);
    if !history_text.is_empty() {
        prompt.push_str("\nPrevious rounds:\n");
        prompt.push_str(&history_text);
    }

    prompt.push_str(&format!(
        "\nRespond with a JSON object of the form {}.",
        space.answer_format()
    ));
    Ok(prompt)
}

/// Describe the last `window` rounds from `player`'s point of view.
fn render_history(
    spec: &GameSpec,
    player: usize,
    history: &[RoundResult],
    window: usize,
) -> String {
    if window == 0 || history.is_empty() {
        return String::new();
    }
    let roles = spec.roles();
    let start = history.len().saturating_sub(window);

    history[start..]
        .iter()
        .map(|round| {
            if round.status == RoundStatus::Skipped {
                return format!("  Round {}: no result\n", round.round);
            }
            let choices = round
                .decisions
                .iter()
                .filter_map(|d| {
                    let action = d.action?;
                    let who = if d.player == player {
                        "you".to_string()
                    } else {
                        roles.get(d.player).cloned().unwrap_or_default()
                    };
                    Some(format!("{} chose {}", who, action))
                })
                .collect::<Vec<_>>()
                .join(", ");
            let payoff = round
                .payoffs
                .as_ref()
                .and_then(|p| p.get(player))
                .map(|p| format!("; your payoff was {:.2}", p))
                .unwrap_or_default();
            format!("  Round {}: {}{}\n", round.round, choices, payoff)
        })
        .collect()
}

/// Suffix appended to the prompt when the previous answer was unusable.
pub fn clarification(space: &ActionSpace, attempt: usize) -> String {
    format!(
        "\n\nYour previous answer (attempt {}) could not be read as a valid choice. \
         Reply with ONLY {}, where the answer is {}.",
        attempt,
        space.answer_format(),
        space.describe()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use econ_games::{Action, Choice, GameKind};

    use crate::results::PlayerDecision;

    fn played_round(round: usize, a: Choice, b: Choice, payoffs: Vec<f64>) -> RoundResult {
        RoundResult {
            round,
            status: RoundStatus::Played,
            decisions: vec![
                PlayerDecision {
                    player: 0,
                    role: "Player 1".to_string(),
                    raw_text: String::new(),
                    action: Some(Action::Choice(a)),
                    attempts: 1,
                    fallback: false,
                },
                PlayerDecision {
                    player: 1,
                    role: "Player 2".to_string(),
                    raw_text: String::new(),
                    action: Some(Action::Choice(b)),
                    attempts: 1,
                    fallback: false,
                },
            ],
            payoffs: Some(payoffs),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_contains_role_rules_and_format() {
        let spec = GameSpec::with_defaults(GameKind::Ultimatum);
        let prompt = render(&spec, 1, &[], 0).unwrap();
        assert!(prompt.contains("Ultimatum Game as Responder"));
        assert!(prompt.contains("minimum acceptable offer"));
        assert!(prompt.contains(r#"{"value": <number>}"#));
        assert!(!prompt.contains("Previous rounds"));
    }

    #[test]
    fn test_history_window_limits_rounds() {
        let spec = GameSpec::with_defaults(GameKind::Prisoner);
        let history = vec![
            played_round(1, Choice::Cooperate, Choice::Defect, vec![0.0, 5.0]),
            played_round(2, Choice::Defect, Choice::Defect, vec![1.0, 1.0]),
        ];
        let prompt = render(&spec, 0, &history, 1).unwrap();
        assert!(prompt.contains("Round 2: you chose D, Player 2 chose D; your payoff was 1.00"));
        assert!(!prompt.contains("Round 1"));
    }

    #[test]
    fn test_history_hidden_when_window_zero() {
        let spec = GameSpec::with_defaults(GameKind::Prisoner);
        let history = vec![played_round(1, Choice::Cooperate, Choice::Cooperate, vec![3.0, 3.0])];
        let prompt = render(&spec, 0, &history, 0).unwrap();
        assert!(!prompt.contains("Round 1"));
    }

    #[test]
    fn test_passive_player_has_no_prompt() {
        let spec = GameSpec::with_defaults(GameKind::Dictator);
        assert!(render(&spec, 1, &[], 0).is_err());
    }

    #[test]
    fn test_clarification_mentions_format() {
        let text = clarification(&ActionSpace::Boolean, 2);
        assert!(text.contains("attempt 2"));
        assert!(text.contains(r#"{"decision": true or false}"#));
    }
}
