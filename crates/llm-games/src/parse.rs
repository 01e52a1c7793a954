//! Action extraction from free-form model output.
//!
//! Tries, in order:
//! 1. A JSON object with a `value`, `choice`, or `decision` key
//! 2. A keyword followed by an answer ("I give 4", "Choice: C")
//! 3. An unkeyed answer (first number, or a single unambiguous choice word)
//!
//! When several keyed answers appear, the last one wins; models tend to
//! restate the setup before committing. The candidate is returned only if
//! it is a member of the action space. Out-of-range answers are rejected,
//! never clamped, so the agent can re-prompt.

use econ_games::{Action, ActionSpace, Choice};
use regex::{Captures, Regex};
use serde_json::Value;

/// A number, optionally written as a ratio ("1/3") or a percentage.
const NUMBER: &str = r"(-?\d+(?:\.\d+)?)(?:\s*/\s*(\d+(?:\.\d+)?))?\s*(%)?";

/// Decision keywords with their inflections, matched as whole words.
const NUMERIC_KEYWORDS: &str = concat!(
    r"answer|decision|choice|offer(?:s|ed|ing)?|gives?|gave|giving|send(?:s|ing)?|sent|",
    r"contribut(?:e|es|ed|ing)|return(?:s|ed|ing)?|threshold|value|amount|minimum",
);

/// How a number was written.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Plain,
    Percent,
    /// Already divided out: a share of the whole
    Ratio,
}

/// Map model text to a legal action, or `None` if no valid answer is found.
pub fn parse_action(text: &str, space: &ActionSpace) -> Option<Action> {
    let candidate = parse_structured(text, space)
        .or_else(|| parse_keyed(text, space))
        .or_else(|| parse_loose(text, space))?;
    space.contains(&candidate).then_some(candidate)
}

/// Look for a JSON object carrying the answer.
fn parse_structured(text: &str, space: &ActionSpace) -> Option<Action> {
    let re = Regex::new(r"\{[^{}]*\}").ok()?;
    for m in re.find_iter(text) {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(m.as_str()) else {
            continue;
        };
        let field = ["value", "choice", "decision", "answer"]
            .iter()
            .find_map(|key| map.get(*key));
        let Some(field) = field else {
            continue;
        };

        let action = match (space, field) {
            (ActionSpace::Amount { .. } | ActionSpace::Fraction, Value::Number(n)) => {
                n.as_f64().map(|v| numeric_action(space, v, Unit::Plain))
            }
            (ActionSpace::Amount { .. } | ActionSpace::Fraction, Value::String(s)) => {
                first_number(s).map(|(v, unit)| numeric_action(space, v, unit))
            }
            (ActionSpace::Binary, Value::String(s)) => choice_from_word(s).map(Action::Choice),
            (ActionSpace::Boolean, Value::Bool(b)) => Some(Action::Volunteer(*b)),
            (ActionSpace::Boolean, Value::String(s)) => bool_from_word(s).map(Action::Volunteer),
            _ => None,
        };
        if action.is_some() {
            return action;
        }
    }
    None
}

/// Look for an answer introduced by a decision keyword.
fn parse_keyed(text: &str, space: &ActionSpace) -> Option<Action> {
    match space {
        ActionSpace::Amount { .. } | ActionSpace::Fraction => {
            let re = Regex::new(&format!(
                r"(?i)\b(?:{})\b[^0-9\-\n]{{0,20}}?{}",
                NUMERIC_KEYWORDS, NUMBER
            ))
            .ok()?;
            let caps = re.captures_iter(text).last()?;
            let (v, unit) = read_number(&caps)?;
            Some(numeric_action(space, v, unit))
        }
        ActionSpace::Binary => {
            let re = Regex::new(
                r#"(?i)\b(?:answer|decision|choice|choose|action)\b\s*(?:is|:|=|to)?\s*["']?(cooperate|defect|c|d)\b"#,
            )
            .ok()?;
            let caps = re.captures(text)?;
            choice_from_word(caps.get(1)?.as_str()).map(Action::Choice)
        }
        ActionSpace::Boolean => {
            let re = Regex::new(
                r#"(?i)\b(?:answer|decision|volunteer)\b\s*(?:is|:|=)?\s*["']?(true|false|yes|no)\b"#,
            )
            .ok()?;
            let caps = re.captures(text)?;
            bool_from_word(caps.get(1)?.as_str()).map(Action::Volunteer)
        }
    }
}

/// Fall back to an unkeyed reading of the whole response.
fn parse_loose(text: &str, space: &ActionSpace) -> Option<Action> {
    match space {
        ActionSpace::Amount { .. } | ActionSpace::Fraction => {
            first_number(text).map(|(v, unit)| numeric_action(space, v, unit))
        }
        ActionSpace::Binary => {
            if let Some(choice) = choice_from_word(text.trim().trim_end_matches('.')) {
                return Some(Action::Choice(choice));
            }
            let cooperate = Regex::new(r"(?i)\bcooperat\w*").ok()?.is_match(text)
                || Regex::new(r"\bC\b").ok()?.is_match(text);
            let defect = Regex::new(r"(?i)\bdefect\w*").ok()?.is_match(text)
                || Regex::new(r"\bD\b").ok()?.is_match(text);
            match (cooperate, defect) {
                (true, false) => Some(Action::Choice(Choice::Cooperate)),
                (false, true) => Some(Action::Choice(Choice::Defect)),
                _ => None,
            }
        }
        ActionSpace::Boolean => {
            if let Some(b) = bool_from_word(text.trim().trim_end_matches('.')) {
                return Some(Action::Volunteer(b));
            }
            let negated = Regex::new(concat!(
                r"(?i)\b(?:not|don't|do not|won't|will not|wouldn't|would not|never|",
                r"refuse to|decline to)\s+(?:to\s+)?volunteer",
            ))
            .ok()?
            .is_match(text);
            let affirmed = Regex::new(
                r"(?i)\bI(?:['’](?:ll|d)| will| would| choose to| decide to)?\s+volunteer\b",
            )
            .ok()?
            .is_match(text);
            match (affirmed, negated) {
                (true, false) => return Some(Action::Volunteer(true)),
                (false, true) => return Some(Action::Volunteer(false)),
                (true, true) => return None,
                (false, false) => {}
            }
            let yes = Regex::new(r"(?i)\btrue\b").ok()?.is_match(text);
            let no = Regex::new(r"(?i)\bfalse\b").ok()?.is_match(text);
            match (yes, no) {
                (true, false) => Some(Action::Volunteer(true)),
                (false, true) => Some(Action::Volunteer(false)),
                _ => None,
            }
        }
    }
}

/// First number in the text and how it was written.
fn first_number(text: &str) -> Option<(f64, Unit)> {
    let re = Regex::new(NUMBER).ok()?;
    read_number(&re.captures(text)?)
}

/// Read the [`NUMBER`] groups at the end of a match.
///
/// "50/50" is an even split. Other improper ratios ("60/40") do not say
/// whose share is whose, and a zero denominator is meaningless; both yield
/// `None` so the agent re-prompts.
fn read_number(caps: &Captures) -> Option<(f64, Unit)> {
    let n = caps.len();
    let v: f64 = caps.get(n - 3)?.as_str().parse().ok()?;
    if let Some(den) = caps.get(n - 2) {
        let den: f64 = den.as_str().parse().ok()?;
        return match v {
            _ if den == 0.0 => None,
            v if v == den && den > 1.0 => Some((0.5, Unit::Ratio)),
            v if v > den => None,
            v => Some((v / den, Unit::Ratio)),
        };
    }
    let unit = if caps.get(n - 1).is_some() {
        Unit::Percent
    } else {
        Unit::Plain
    };
    Some((v, unit))
}

/// Interpret a number against a numeric space.
///
/// Percentages and ratios scale the space's maximum. For amount spaces a
/// plain decimal strictly between 0 and 1 is also read as a share.
fn numeric_action(space: &ActionSpace, v: f64, unit: Unit) -> Action {
    let share = match unit {
        Unit::Percent => Some(v / 100.0),
        Unit::Ratio => Some(v),
        Unit::Plain => None,
    };
    match space {
        ActionSpace::Amount { max } => {
            let amount = match share {
                Some(share) => share * max,
                None if v > 0.0 && v < 1.0 => v * max,
                None => v,
            };
            Action::Amount(amount)
        }
        _ => Action::Fraction(share.unwrap_or(v)),
    }
}

fn choice_from_word(word: &str) -> Option<Choice> {
    match word.trim().trim_matches('"').to_lowercase().as_str() {
        "c" | "cooperate" | "cooperation" => Some(Choice::Cooperate),
        "d" | "defect" | "defection" => Some(Choice::Defect),
        _ => None,
    }
}

fn bool_from_word(word: &str) -> Option<bool> {
    match word.trim().trim_matches('"').to_lowercase().as_str() {
        "true" | "yes" | "y" | "volunteer" => Some(true),
        "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN: ActionSpace = ActionSpace::Amount { max: 10.0 };
    const HUNDRED: ActionSpace = ActionSpace::Amount { max: 100.0 };

    #[test]
    fn test_keyed_amount() {
        assert_eq!(parse_action("I give 4", &TEN), Some(Action::Amount(4.0)));
        assert_eq!(
            parse_action("Of my $100, I will offer $35 to them.", &HUNDRED),
            Some(Action::Amount(35.0))
        );
        assert_eq!(
            parse_action("My minimum acceptable offer is 30.", &HUNDRED),
            Some(Action::Amount(30.0))
        );
    }

    #[test]
    fn test_structured_answers() {
        assert_eq!(
            parse_action(r#"{"value": 40} because fairness matters"#, &HUNDRED),
            Some(Action::Amount(40.0))
        );
        assert_eq!(
            parse_action("```json\n{\"choice\": \"C\"}\n```", &ActionSpace::Binary),
            Some(Action::Choice(Choice::Cooperate))
        );
        assert_eq!(
            parse_action(r#"{"decision": false}"#, &ActionSpace::Boolean),
            Some(Action::Volunteer(false))
        );
    }

    #[test]
    fn test_fraction_and_percent() {
        assert_eq!(parse_action("0.25", &HUNDRED), Some(Action::Amount(25.0)));
        assert_eq!(parse_action("I send 25%", &HUNDRED), Some(Action::Amount(25.0)));
        assert_eq!(
            parse_action("return 40%", &ActionSpace::Fraction),
            Some(Action::Fraction(0.4))
        );
        assert_eq!(
            parse_action(r#"{"value": 0.5}"#, &ActionSpace::Fraction),
            Some(Action::Fraction(0.5))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(parse_action("I give 150", &HUNDRED), None);
        assert_eq!(parse_action("I give -5", &HUNDRED), None);
        assert_eq!(parse_action(r#"{"value": 3}"#, &ActionSpace::Fraction), None);
    }

    #[test]
    fn test_binary_words() {
        assert_eq!(
            parse_action("cooperate", &ActionSpace::Binary),
            Some(Action::Choice(Choice::Cooperate))
        );
        assert_eq!(
            parse_action("I choose to defect.", &ActionSpace::Binary),
            Some(Action::Choice(Choice::Defect))
        );
        assert_eq!(
            parse_action("D", &ActionSpace::Binary),
            Some(Action::Choice(Choice::Defect))
        );
        assert_eq!(
            parse_action("Cooperating builds trust between us.", &ActionSpace::Binary),
            Some(Action::Choice(Choice::Cooperate))
        );
    }

    #[test]
    fn test_binary_ambiguous_rejected() {
        assert_eq!(
            parse_action("I could cooperate or defect, hard to say", &ActionSpace::Binary),
            None
        );
    }

    #[test]
    fn test_boolean_phrases() {
        assert_eq!(
            parse_action("volunteer", &ActionSpace::Boolean),
            Some(Action::Volunteer(true))
        );
        assert_eq!(
            parse_action("I will volunteer so the group benefits.", &ActionSpace::Boolean),
            Some(Action::Volunteer(true))
        );
        assert_eq!(
            parse_action("I will not volunteer this time.", &ActionSpace::Boolean),
            Some(Action::Volunteer(false))
        );
        assert_eq!(
            parse_action("Decision: yes", &ActionSpace::Boolean),
            Some(Action::Volunteer(true))
        );
    }

    #[test]
    fn test_keywords_are_whole_words() {
        assert_eq!(
            parse_action("Given the $100 endowment, I will offer 40.", &HUNDRED),
            Some(Action::Amount(40.0))
        );
        assert_eq!(parse_action("Given $10, I give $4.", &TEN), Some(Action::Amount(4.0)));
        assert_eq!(
            parse_action("Valued at 100 overall, the amount I send is 30", &HUNDRED),
            Some(Action::Amount(30.0))
        );
    }

    #[test]
    fn test_last_keyed_answer_wins() {
        assert_eq!(
            parse_action("I could give 50, but on reflection I give 20.", &HUNDRED),
            Some(Action::Amount(20.0))
        );
        assert_eq!(
            parse_action("They offered 10 last time. I offered 35.", &HUNDRED),
            Some(Action::Amount(35.0))
        );
    }

    #[test]
    fn test_ratios() {
        let third = parse_action("I return 1/3 of it", &ActionSpace::Fraction);
        assert!(matches!(third, Some(Action::Fraction(v)) if (v - 1.0 / 3.0).abs() < 1e-12));
        assert_eq!(parse_action("I give 1/4", &HUNDRED), Some(Action::Amount(25.0)));
        assert_eq!(parse_action("I offer a 50/50 split", &HUNDRED), Some(Action::Amount(50.0)));
        assert_eq!(parse_action("I offer a 60/40 split", &HUNDRED), None);
        assert_eq!(parse_action("I return 1/0", &ActionSpace::Fraction), None);
    }

    #[test]
    fn test_contracted_volunteer() {
        assert_eq!(
            parse_action("Yes, I'd volunteer.", &ActionSpace::Boolean),
            Some(Action::Volunteer(true))
        );
        assert_eq!(
            parse_action("I’ll volunteer this round", &ActionSpace::Boolean),
            Some(Action::Volunteer(true))
        );
        assert_eq!(
            parse_action("Honestly I wouldn't volunteer.", &ActionSpace::Boolean),
            Some(Action::Volunteer(false))
        );
    }

    #[test]
    fn test_unparseable_text() {
        assert_eq!(parse_action("I am not sure what to do.", &HUNDRED), None);
        assert_eq!(parse_action("Let me think about it.", &ActionSpace::Binary), None);
        assert_eq!(parse_action("Hmm.", &ActionSpace::Boolean), None);
    }
}
