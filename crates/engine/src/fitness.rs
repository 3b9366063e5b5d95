use bitrule_core::{Fitness, FitnessRecord, Rule};

/// Opaque pass/fail predicate over rules.
///
/// Implementations must be pure: the same rule always yields the same
/// outcome and evaluation never touches the result pool.
pub trait FitnessOracle: Send + Sync {
    fn evaluate(&self, rule: &Rule) -> Fitness;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "oracle"
    }
}

impl<F> FitnessOracle for F
where
    F: Fn(&Rule) -> Fitness + Send + Sync,
{
    fn evaluate(&self, rule: &Rule) -> Fitness {
        self(rule)
    }
}

/// Evaluate `rule` and wrap the outcome in a fresh record.
pub fn assess(oracle: &dyn FitnessOracle, rule: &Rule) -> FitnessRecord {
    FitnessRecord::new(rule.clone(), oracle.evaluate(rule))
}

/// Passes rules with an even number of set bits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParityOracle;

impl FitnessOracle for ParityOracle {
    fn evaluate(&self, rule: &Rule) -> Fitness {
        Fitness::from(rule.count_ones() % 2 == 0)
    }

    fn name(&self) -> &str {
        "parity"
    }
}

/// Passes rules within `max_distance` bit flips of a target pattern.
/// Rules of a different length always fail.
#[derive(Debug, Clone)]
pub struct TargetOracle {
    target: Rule,
    max_distance: usize,
}

impl TargetOracle {
    pub fn new(target: Rule, max_distance: usize) -> Self {
        Self {
            target,
            max_distance,
        }
    }

    pub fn target(&self) -> &Rule {
        &self.target
    }
}

impl FitnessOracle for TargetOracle {
    fn evaluate(&self, rule: &Rule) -> Fitness {
        match rule.hamming(&self.target) {
            Ok(distance) => Fitness::from(distance <= self.max_distance),
            Err(_) => Fitness::Fail,
        }
    }

    fn name(&self) -> &str {
        "target"
    }
}
