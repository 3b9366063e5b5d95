//! MT19937 pseudo-random generator.
//!
//! Each concurrent unit owns its own [`Prng`]; nothing here is shared or
//! global. Two instances seeded with the same value produce bit-identical
//! streams.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;
const INIT_MULTIPLIER: u32 = 1_812_433_253;

/// Conventional MT19937 default seed.
pub const DEFAULT_SEED: u32 = 5489;

#[derive(Clone)]
pub struct Prng {
    state: Box<[u32; N]>,
    index: usize,
}

impl Prng {
    pub fn new(seed: u32) -> Self {
        let mut prng = Self {
            state: Box::new([0; N]),
            index: N,
        };
        prng.seed(seed);
        prng
    }

    /// Seed from the current wall-clock second.
    pub fn from_time() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::new(secs as u32)
    }

    /// Reset the state deterministically from `seed`.
    pub fn seed(&mut self, seed: u32) {
        self.state[0] = seed;
        for i in 1..N {
            let prev = self.state[i - 1];
            self.state[i] = INIT_MULTIPLIER
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        self.index = N;
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^= y >> 18;
        y
    }

    /// Uniform variate in [0, 1) with 53-bit resolution (two draws).
    pub fn uniform(&mut self) -> f64 {
        let a = (self.next_u32() >> 5) as f64;
        let b = (self.next_u32() >> 6) as f64;
        (a * 67_108_864.0 + b) * (1.0 / 9_007_199_254_740_992.0)
    }

    /// Uniform integer in `[0, n)`. Returns 0 when `n == 0`.
    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        if n as u64 <= u32::MAX as u64 + 1 {
            ((self.next_u32() as u64 * n as u64) >> 32) as usize
        } else {
            ((self.uniform() * n as f64) as usize).min(n - 1)
        }
    }

    /// Fair coin flip.
    pub fn bit(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }

    /// Regenerate all 624 words.
    fn twist(&mut self) {
        let mag = |y: u32| if y & 1 == 0 { 0 } else { MATRIX_A };
        let mt = &mut self.state;

        for kk in 0..N - M {
            let y = (mt[kk] & UPPER_MASK) | (mt[kk + 1] & LOWER_MASK);
            mt[kk] = mt[kk + M] ^ (y >> 1) ^ mag(y);
        }
        for kk in N - M..N - 1 {
            let y = (mt[kk] & UPPER_MASK) | (mt[kk + 1] & LOWER_MASK);
            mt[kk] = mt[kk + M - N] ^ (y >> 1) ^ mag(y);
        }
        let y = (mt[N - 1] & UPPER_MASK) | (mt[0] & LOWER_MASK);
        mt[N - 1] = mt[M - 1] ^ (y >> 1) ^ mag(y);

        self.index = 0;
    }
}

impl Default for Prng {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl fmt::Debug for Prng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prng").field("index", &self.index).finish_non_exhaustive()
    }
}
