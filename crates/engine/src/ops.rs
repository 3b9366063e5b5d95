//! Genetic operators over [`Rule`].
//!
//! All operators are pure apart from the draws they take from the caller's
//! [`Prng`]; inputs are never modified.

use bitrule_core::{EngineError, Result, Rule};

use crate::prng::Prng;

/// Flip each bit independently with probability `rate`.
///
/// Draws exactly one uniform variate per bit. `rate` is expected to be in
/// [0, 1] already; it is not clamped here.
pub fn mutate(rule: &Rule, rate: f64, prng: &mut Prng) -> Rule {
    rule.flipped_where(|_| prng.uniform() < rate)
}

/// One-point crossover at a point drawn uniformly from `[0, len)`.
pub fn crossover(a: &Rule, b: &Rule, prng: &mut Prng) -> Result<Rule> {
    check_lengths(a, b)?;
    let point = prng.below(a.len());
    crossover_at(a, b, point)
}

/// One-point crossover at an explicit point: `[0, point)` from `a`,
/// `[point, len)` from `b`.
pub fn crossover_at(a: &Rule, b: &Rule, point: usize) -> Result<Rule> {
    check_lengths(a, b)?;
    a.splice(b, point)
}

/// Per-bit flip probability used after crossover under stress.
pub fn exploration_rate(stress_level: f64) -> f64 {
    (0.5 * stress_level).clamp(0.0, 1.0)
}

/// Crossover followed by an exploration flip of each child bit with
/// probability `min(0.5 * stress, 1)`. With zero stress this is a plain
/// crossover that still consumes one draw per bit.
pub fn crossover_with_exploration(
    a: &Rule,
    b: &Rule,
    stress_level: f64,
    prng: &mut Prng,
) -> Result<Rule> {
    let child = crossover(a, b, prng)?;
    Ok(mutate(&child, exploration_rate(stress_level), prng))
}

/// A fresh rule with every bit drawn from a fair coin.
pub fn random_rule(len: usize, prng: &mut Prng) -> Result<Rule> {
    Rule::from_fn(len, |_| prng.bit())
}

fn check_lengths(a: &Rule, b: &Rule) -> Result<()> {
    if a.len() != b.len() {
        return Err(EngineError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}
