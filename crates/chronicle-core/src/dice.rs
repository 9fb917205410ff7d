//! Dice notation (`2d6+3, 1d20`) expansion and scoring.

use std::{fmt, sync::OnceLock};

use rand::Rng;
use regex::Regex;

use crate::{errors::Error, expr, Result};

/// Upper bound on dice in a single `NdS` group.
pub const MAX_DICE: u32 = 100;
/// Upper bound on faces of a single die.
pub const MAX_SIDES: u32 = 1_000_000;
/// Upper bound on dice across every term of one request.
pub const MAX_TOTAL_DICE: u32 = 200;

/// One scored term of a roll request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollOutcome {
    /// The term as typed (whitespace removed).
    pub original: String,
    /// The term with every `NdS` replaced by the rolled `[v1,v2,...]`.
    pub expanded: String,
    pub total: i64,
}

impl fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Roll: {} ({}) ==> {}",
            pad_operators(&self.original),
            pad_operators(&self.expanded),
            self.total
        )
    }
}

fn dice_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]*)d([0-9]*)").expect("valid dice regex"))
}

/// Roll every comma-separated term of `spec` with the thread-local RNG.
pub fn roll(spec: &str) -> Result<Vec<RollOutcome>> {
    roll_with(spec, &mut rand::thread_rng())
}

/// Roll every comma-separated term of `spec` using `rng`.
pub fn roll_with<R: Rng + ?Sized>(spec: &str, rng: &mut R) -> Result<Vec<RollOutcome>> {
    let compact: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to roll, expected dice such as 2d6+3".to_string(),
        ));
    }

    let mut budget = MAX_TOTAL_DICE;
    let mut outcomes = Vec::new();
    for term in compact.split(',').filter(|term| !term.is_empty()) {
        let expanded = expand_term(term, &mut budget, rng)?;
        let total = expr::solve(&expanded)?;
        outcomes.push(RollOutcome {
            original: term.to_string(),
            expanded,
            total,
        });
    }
    Ok(outcomes)
}

/// Render outcomes as the reply text, one line per term.
pub fn format_outcomes(outcomes: &[RollOutcome]) -> String {
    outcomes
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace each `NdS` group in `term`, drawing its dice from `budget`.
fn expand_term<R: Rng + ?Sized>(term: &str, budget: &mut u32, rng: &mut R) -> Result<String> {
    let mut out = String::with_capacity(term.len() * 2);
    let mut last = 0;

    for caps in dice_re().captures_iter(term) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let count = parse_count(caps.get(1).map_or("", |m| m.as_str()), whole.as_str())?;
        let sides = parse_sides(caps.get(2).map_or("", |m| m.as_str()), whole.as_str())?;
        *budget = budget.checked_sub(count).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "too many dice in one roll (at most {MAX_TOTAL_DICE} in total)"
            ))
        })?;

        let rolls = (0..count)
            .map(|_| rng.gen_range(1..=sides).to_string())
            .collect::<Vec<_>>();

        out.push_str(&term[last..whole.start()]);
        out.push('[');
        out.push_str(&rolls.join(","));
        out.push(']');
        last = whole.end();
    }

    out.push_str(&term[last..]);
    Ok(out)
}

fn parse_count(raw: &str, group: &str) -> Result<u32> {
    if raw.is_empty() {
        return Ok(1);
    }
    match raw.parse::<u32>() {
        Ok(n) if n <= MAX_DICE => Ok(n),
        _ => Err(Error::InvalidArgument(format!(
            "too many dice in `{group}` (at most {MAX_DICE})"
        ))),
    }
}

fn parse_sides(raw: &str, group: &str) -> Result<u32> {
    if raw.is_empty() {
        return Err(invalid_sides(group));
    }
    // The regex only captures ASCII digits, so a parse failure means overflow.
    match raw.parse::<u32>() {
        Ok(0) => Err(invalid_sides(group)),
        Ok(n) if n <= MAX_SIDES => Ok(n),
        _ => Err(Error::InvalidArgument(format!(
            "dice in `{group}` have too many sides (at most {MAX_SIDES})"
        ))),
    }
}

fn invalid_sides(group: &str) -> Error {
    Error::InvalidArgument(format!(
        "invalid dice notation `{group}`, dice need a number of sides"
    ))
}

/// `2d6+3` -> `2d6 + 3`.
fn pad_operators(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if matches!(c, '+' | '-' | '*' | '/') {
            out.push(' ');
            out.push(c);
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn single_sided_die_always_rolls_one() {
        let mut rng = rng();
        for _ in 0..50 {
            let out = roll_with("1d1", &mut rng).unwrap();
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].total, 1);
            assert_eq!(out[0].expanded, "[1]");
        }
    }

    #[test]
    fn two_d_six_stays_in_range() {
        let mut rng = rng();
        for _ in 0..500 {
            let total = roll_with("2d6", &mut rng).unwrap()[0].total;
            assert!((2..=12).contains(&total), "out of range: {total}");
        }
    }

    #[test]
    fn count_defaults_to_one() {
        let out = roll_with("d1+2", &mut rng()).unwrap();
        assert_eq!(out[0].expanded, "[1]+2");
        assert_eq!(out[0].total, 3);
    }

    #[test]
    fn formats_one_line_per_term() {
        let out = roll_with("1d1 + 2, 3d1*2", &mut rng()).unwrap();
        assert_eq!(
            format_outcomes(&out),
            "Roll: 1d1 + 2 ([1] + 2) ==> 3\nRoll: 3d1 * 2 ([1,1,1] * 2) ==> 6"
        );
    }

    #[test]
    fn zero_dice_sum_to_zero() {
        let out = roll_with("0d6+4", &mut rng()).unwrap();
        assert_eq!(out[0].expanded, "[]+4");
        assert_eq!(out[0].total, 4);
    }

    #[test]
    fn plain_arithmetic_passes_through() {
        let out = roll_with("(1+2)*3", &mut rng()).unwrap();
        assert_eq!(out[0].total, 9);
    }

    #[test]
    fn rejects_missing_or_zero_sides() {
        assert!(matches!(
            roll_with("2d", &mut rng()).unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(roll_with("2d0", &mut rng()).is_err());
    }

    #[test]
    fn rejects_oversized_groups() {
        assert!(roll_with("101d6", &mut rng()).is_err());
        assert!(roll_with("1d1000001", &mut rng()).is_err());
    }

    #[test]
    fn empty_spec_is_invalid() {
        assert!(matches!(
            roll_with("   ", &mut rng()).unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert!(roll_with("1d6/0", &mut rng()).is_err());
    }

    #[test]
    fn total_dice_per_request_are_capped() {
        let many = vec!["100d6"; 2].join(",");
        assert_eq!(roll_with(&many, &mut rng()).unwrap().len(), 2);

        let too_many = vec!["100d6"; 3].join(",");
        assert!(matches!(
            roll_with(&too_many, &mut rng()).unwrap_err(),
            Error::InvalidArgument(ref m) if m.contains("in total")
        ));
    }

    #[test]
    fn only_ascii_digits_count_as_dice_numbers() {
        // Arabic-Indic digits are not a count; the group is a plain `d6`.
        let out = roll_with("\u{0661}d6", &mut rng()).unwrap();
        assert!(out[0].expanded.starts_with('\u{0661}'));
        assert!(out[0].expanded.contains('['));
        assert!(roll_with("\u{0661}\u{0660}\u{0660}d6", &mut rng()).is_ok());
    }
}
