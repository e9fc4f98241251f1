//! Record synthesis pipeline
//!
//! - `synthesizer`: synthetic YES/NO prices
//! - `metrics`: sum, deviation from 1 and threshold flags
//! - `assembler`: per-cycle batch with continuing ids

pub mod assembler;
pub mod metrics;
pub mod synthesizer;

pub use assembler::{allocate, effective_markets, BatchAssembler};
pub use metrics::{derive, Metrics};
pub use synthesizer::PriceSynthesizer;
