//! Adaptive mutation rate.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the external load signal, in [0, 100].
pub trait LoadProbe: Send + Sync {
    fn load_factor(&self) -> f64;
}

/// Fixed load value. Can be changed at runtime, which makes it usable as a
/// test double as well as a "no telemetry" default.
#[derive(Debug, Default)]
pub struct ConstantLoad {
    bits: AtomicU64,
}

impl ConstantLoad {
    pub fn new(load: f64) -> Self {
        Self {
            bits: AtomicU64::new(load.to_bits()),
        }
    }

    pub fn set(&self, load: f64) {
        self.bits.store(load.to_bits(), Ordering::Relaxed);
    }
}

impl LoadProbe for ConstantLoad {
    fn load_factor(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Computes `base + load_weight * load + time_weight * (elapsed / time_scale)`,
/// capped at 1.0.
#[derive(Debug, Clone, Copy)]
pub struct RateController {
    pub load_weight: f64,
    pub time_weight: f64,
    pub time_scale_secs: f64,
}

impl Default for RateController {
    fn default() -> Self {
        Self {
            load_weight: 0.1,
            time_weight: 0.1,
            time_scale_secs: 60.0,
        }
    }
}

impl RateController {
    /// Adjusted rate for the given base rate, search time and load.
    ///
    /// Non-decreasing in both `elapsed_secs` and `load_factor`; the result is
    /// always in `[base_rate, 1.0]` for a base rate in [0, 1]. Negative or
    /// NaN inputs are treated as zero, and load is bounded to [0, 100].
    pub fn adjust(&self, base_rate: f64, elapsed_secs: f64, load_factor: f64) -> f64 {
        let load = sanitize(load_factor).min(100.0);
        let elapsed = sanitize(elapsed_secs);
        let rate = base_rate
            + self.load_weight * load
            + self.time_weight * (elapsed / self.time_scale_secs);
        rate.min(1.0).max(base_rate.max(0.0))
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else {
        v
    }
}
