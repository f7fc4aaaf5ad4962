//! Seeded xorshift64 generator for reproducible scenes.
//!
//! Scene layouts and per-frame churn draw from this generator only, so a
//! `(scene, seed, count)` triple always yields the same draw stream.

use serde::{Deserialize, Serialize};

/// Xorshift64 with shifts (13, 7, 17).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    /// Replaces a zero seed, which is a fixed point of xorshift.
    const ZERO_SEED_REPLACEMENT: u64 = 0x5EED_DEAD_BEEF_CAFE;

    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 {
                Self::ZERO_SEED_REPLACEMENT
            } else {
                seed
            },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in `[0, 1)` from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform index in `[0, len)`; 0 when `len` is 0.
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next_u64() % len as u64) as usize
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_42_golden_value() {
        // Replays depend on this sequence.
        let mut rng = Xorshift64::new(42);
        assert_eq!(rng.next_u64(), 45_454_805_674);
    }

    #[test]
    fn zero_seed_is_replaced() {
        let mut rng = Xorshift64::new(0);
        assert_ne!(rng.next_u64(), 0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Xorshift64::new(7);
        let mut b = Xorshift64::new(7);
        for i in 0..500 {
            assert_eq!(a.next_u64(), b.next_u64(), "diverged at {i}");
        }
    }

    #[test]
    fn index_of_empty_range_is_zero() {
        let mut rng = Xorshift64::new(3);
        assert_eq!(rng.index(0), 0);
    }

    #[test]
    fn chance_extremes() {
        let mut rng = Xorshift64::new(11);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn next_f32_in_unit_interval(seed in any::<u64>()) {
                let mut rng = Xorshift64::new(seed);
                for _ in 0..64 {
                    let v = rng.next_f32();
                    prop_assert!((0.0..1.0).contains(&v), "got {v}");
                }
            }

            #[test]
            fn index_below_len(seed in any::<u64>(), len in 1usize..1000) {
                let mut rng = Xorshift64::new(seed);
                for _ in 0..32 {
                    prop_assert!(rng.index(len) < len);
                }
            }

            #[test]
            fn range_within_bounds(seed in any::<u64>(), min in -100.0f32..0.0, span in 0.5f32..100.0) {
                let mut rng = Xorshift64::new(seed);
                let v = rng.range(min, min + span);
                prop_assert!(v >= min && v < min + span + 1e-3);
            }
        }
    }
}
