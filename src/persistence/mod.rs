//! Persistence layer for the append-only log
//!
//! - `store`: the tabular store boundary implemented by adapters
//! - `log_sink`: id continuation, header upkeep, bulk append and annotation

pub mod log_sink;
pub mod store;

pub use log_sink::{LogSink, SinkConfig, WriteSummary};
pub use store::LogStore;
