//! Fair interleaved batch construction
//!
//! A batch covers every configured market: samples are split evenly, ids are
//! assigned in market order then sample order, and only the finished batch is
//! shuffled so markets appear interleaved in the sheet.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::borrow::Cow;
use tracing::{debug, info};

use super::metrics;
use super::synthesizer::PriceSynthesizer;
use crate::domain::{LogRecord, MarketConfig};

/// Split `total` samples across `markets` markets.
///
/// Every market gets `total / markets`; the first `total % markets` markets
/// (in config order) get one extra.
pub fn allocate(total: usize, markets: usize) -> Vec<usize> {
    if markets == 0 {
        return Vec::new();
    }
    let base = total / markets;
    let remainder = total % markets;

    (0..markets)
        .map(|idx| base + usize::from(idx < remainder))
        .collect()
}

/// Markets a cycle will use: `configs`, or the built-in default market when empty
pub fn effective_markets(configs: &[MarketConfig]) -> Cow<'_, [MarketConfig]> {
    if configs.is_empty() {
        Cow::Owned(vec![MarketConfig::default_market()])
    } else {
        Cow::Borrowed(configs)
    }
}

/// Builds one cycle's batch of log records
pub struct BatchAssembler<R: Rng = StdRng> {
    synthesizer: PriceSynthesizer<R>,
}

impl BatchAssembler<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(PriceSynthesizer::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(PriceSynthesizer::seeded(seed))
    }
}

impl<R: Rng> BatchAssembler<R> {
    pub fn new(synthesizer: PriceSynthesizer<R>) -> Self {
        Self { synthesizer }
    }

    /// Build `total_count` records with ids `start_id + 1 ..= start_id + total_count`.
    ///
    /// An empty config list is replaced by the built-in default market.
    pub fn build(
        &mut self,
        configs: &[MarketConfig],
        total_count: usize,
        start_id: u64,
    ) -> Vec<LogRecord> {
        if configs.is_empty() {
            info!("No markets configured, using default market");
        }
        let markets = effective_markets(configs);

        let allocation = allocate(total_count, markets.len());
        let mut records = Vec::with_capacity(total_count);
        let mut log_id = start_id;

        for (market, samples) in markets.iter().zip(allocation) {
            for _ in 0..samples {
                let pair = self.synthesizer.sample();
                let m = metrics::derive(&pair, market);
                log_id += 1;

                records.push(LogRecord {
                    log_id,
                    market_id: market.market_id.clone(),
                    market_label: market.market_label.clone(),
                    yes_price: pair.yes,
                    no_price: pair.no,
                    sum_price: m.sum_price,
                    difference_from_1: m.difference_from_1,
                    below_threshold1: m.below_threshold1,
                    below_threshold2: m.below_threshold2,
                    below_threshold3: m.below_threshold3,
                    timestamp: Utc::now(),
                });
            }
        }

        records.shuffle(self.synthesizer.rng_mut());

        debug!(
            "Assembled {} records across {} markets (ids {}..={})",
            records.len(),
            markets.len(),
            start_id + 1,
            log_id
        );

        records
    }
}
