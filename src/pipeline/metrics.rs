use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::{Flag, MarketConfig, PricePair};

/// Values derived from one price sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub sum_price: Decimal,
    pub difference_from_1: Decimal,
    pub below_threshold1: Flag,
    pub below_threshold2: Flag,
    pub below_threshold3: Flag,
}

/// Derive sum, deviation from 1 and threshold flags
///
/// sum_price = round(yes + no, 2)
/// difference_from_1 = round(1 - sum_price, 3)
/// below_thresholdN = sum_price < thresholdN
pub fn derive(pair: &PricePair, config: &MarketConfig) -> Metrics {
    let sum_price = round(pair.yes + pair.no, 2);
    let difference_from_1 = round(Decimal::ONE - sum_price, 3);
    let [t1, t2, t3] = config.thresholds();

    Metrics {
        sum_price,
        difference_from_1,
        below_threshold1: Flag::from_bool(sum_price < t1),
        below_threshold2: Flag::from_bool(sum_price < t2),
        below_threshold3: Flag::from_bool(sum_price < t3),
    }
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
