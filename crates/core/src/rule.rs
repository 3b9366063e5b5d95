use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A fixed-length bit vector.
///
/// Rules have no mutating methods: every operator builds a new `Rule`, so a
/// rule handed to the result pool can never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rule {
    bits: Vec<u8>,
}

impl Rule {
    /// Build a rule from explicit bits. Every element must be 0 or 1 and the
    /// rule must not be empty.
    pub fn new(bits: Vec<u8>) -> Result<Self> {
        if bits.is_empty() {
            return Err(EngineError::InvalidRule("rule must not be empty".into()));
        }
        if let Some(pos) = bits.iter().position(|&b| b > 1) {
            return Err(EngineError::InvalidRule(format!(
                "bit {} has value {}, expected 0 or 1",
                pos, bits[pos]
            )));
        }
        Ok(Self { bits })
    }

    /// Build a rule from a generator of booleans.
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Result<Self> {
        Self::new((0..len).map(|i| u8::from(f(i))).collect())
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn bit(&self, index: usize) -> Option<u8> {
        self.bits.get(index).copied()
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b == 1).count()
    }

    /// Number of positions where `self` and `other` differ.
    pub fn hamming(&self, other: &Rule) -> Result<usize> {
        if self.len() != other.len() {
            return Err(EngineError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        Ok(self
            .bits
            .iter()
            .zip(&other.bits)
            .filter(|(a, b)| a != b)
            .count())
    }

    /// Copy of this rule with every bit for which `flip` returns true
    /// inverted. `flip` is called once per bit, in index order.
    pub fn flipped_where(&self, mut flip: impl FnMut(usize) -> bool) -> Rule {
        let bits = self
            .bits
            .iter()
            .enumerate()
            .map(|(i, &b)| if flip(i) { 1 - b } else { b })
            .collect();
        Rule { bits }
    }

    /// One-point splice: bits `[0, point)` from `self`, `[point, len)` from
    /// `other`. Both rules must have the same length and `point <= len`.
    pub fn splice(&self, other: &Rule, point: usize) -> Result<Rule> {
        if self.len() != other.len() {
            return Err(EngineError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        if point > self.len() {
            return Err(EngineError::InvalidRule(format!(
                "splice point {} beyond rule length {}",
                point,
                self.len()
            )));
        }
        let mut bits = Vec::with_capacity(self.len());
        bits.extend_from_slice(&self.bits[..point]);
        bits.extend_from_slice(&other.bits[point..]);
        Ok(Rule { bits })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.bits {
            f.write_str(if *b == 1 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Rule {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let bits = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(0),
                '1' => Ok(1),
                other => Err(EngineError::InvalidRule(format!(
                    "unexpected character '{other}' in bit string"
                ))),
            })
            .collect::<Result<Vec<u8>>>()?;
        Self::new(bits)
    }
}

impl TryFrom<String> for Rule {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}

/// Binary outcome of a fitness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fitness {
    Pass,
    Fail,
}

impl Fitness {
    /// Integer score: +1 for a pass, -1 for a failure.
    pub fn score(self) -> i8 {
        match self {
            Fitness::Pass => 1,
            Fitness::Fail => -1,
        }
    }

    pub fn is_pass(self) -> bool {
        self == Fitness::Pass
    }
}

impl From<bool> for Fitness {
    fn from(pass: bool) -> Self {
        if pass {
            Fitness::Pass
        } else {
            Fitness::Fail
        }
    }
}

/// A rule paired with the outcome of evaluating it.
///
/// Re-evaluating a rule produces a new record; records are never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitnessRecord {
    rule: Rule,
    fitness: Fitness,
}

impl FitnessRecord {
    pub fn new(rule: Rule, fitness: Fitness) -> Self {
        Self { rule, fitness }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn fitness(&self) -> Fitness {
        self.fitness
    }

    pub fn score(&self) -> i8 {
        self.fitness.score()
    }
}
