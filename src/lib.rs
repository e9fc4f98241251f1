pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod pipeline;

pub use adapters::{InMemoryLogStore, JsonFileMarketSource, MarketSource, SheetsLogStore};
pub use config::AppConfig;
pub use coordination::{
    CycleReport, CycleScheduler, GracefulShutdown, SchedulerConfig, ShutdownSignal, StopReason,
};
pub use domain::{LogRecord, MarketConfig};
pub use error::{LoggerError, Result};
pub use persistence::{LogSink, LogStore, SinkConfig};
pub use pipeline::{BatchAssembler, PriceSynthesizer};
