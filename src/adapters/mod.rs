//! Concrete sources and stores
//!
//! - `market_source`: market configuration readers
//! - `memory`: in-process log store for dry runs and tests
//! - `sheets`: Google Sheets log store

pub mod market_source;
pub mod memory;
pub mod sheets;

pub use market_source::{JsonFileMarketSource, MarketSource, StaticMarketSource};
pub use memory::InMemoryLogStore;
pub use sheets::{SheetsLogStore, TokenSource};
