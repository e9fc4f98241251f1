//! Synthetic YES/NO price generation
//!
//! Models an approximately complementary binary market: NO tracks `1 - YES`
//! with a small bounded inefficiency noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::PricePair;

pub const YES_MIN: f64 = 0.05;
pub const YES_MAX: f64 = 0.95;
pub const NO_MIN: f64 = 0.01;
pub const NO_MAX: f64 = 0.99;
/// Half-width of the noise added to `1 - YES`
pub const NOISE: f64 = 0.03;

/// Draws price pairs from a random source
#[derive(Debug, Clone)]
pub struct PriceSynthesizer<R: Rng = StdRng> {
    rng: R,
}

impl PriceSynthesizer<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible synthesizer for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PriceSynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw one (yes, no) sample, both rounded to cents
    pub fn sample(&mut self) -> PricePair {
        let yes: f64 = self.rng.gen_range(YES_MIN..=YES_MAX);
        let noise: f64 = self.rng.gen_range(-NOISE..=NOISE);
        let no = (1.0 - yes + noise).clamp(NO_MIN, NO_MAX);

        PricePair {
            yes: to_cents(yes),
            no: to_cents(no),
        }
    }

    /// Access to the random source, shared with batch shuffling
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

fn to_cents(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_samples_stay_in_bounds() {
        let mut synth = PriceSynthesizer::seeded(7);

        for _ in 0..5_000 {
            let pair = synth.sample();
            assert!(pair.yes >= dec!(0.05) && pair.yes <= dec!(0.95), "yes {}", pair.yes);
            assert!(pair.no >= dec!(0.01) && pair.no <= dec!(0.99), "no {}", pair.no);
            assert!(pair.yes.scale() <= 2 && pair.no.scale() <= 2);
        }
    }

    #[test]
    fn test_no_tracks_complement() {
        let mut synth = PriceSynthesizer::seeded(11);

        for _ in 0..1_000 {
            let pair = synth.sample();
            // noise 0.03 plus up to a cent of rounding on each side
            let gap = (pair.yes + pair.no - Decimal::ONE).abs();
            assert!(gap <= dec!(0.04), "gap {}", gap);
        }
    }

    #[test]
    fn test_same_seed_same_prices() {
        let mut a = PriceSynthesizer::seeded(99);
        let mut b = PriceSynthesizer::seeded(99);

        for _ in 0..20 {
            assert_eq!(a.sample(), b.sample());
        }
    }
}
